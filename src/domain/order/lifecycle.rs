use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::inventory::StockLedger;
use crate::metrics::Metrics;
use crate::repository::{OrderRepository, Page, PageRequest, RepositoryError};

use super::aggregate::Order;
use super::commands::{CreateOrder, OrderItemRequest};
use super::errors::OrderError;
use super::validation::ValidatorChain;
use super::value_objects::{OrderItem, OrderStatus};

// ============================================================================
// Order Lifecycle Manager
// ============================================================================
//
// Orchestrates: Catalog → Validator Chain → Stock Ledger → Repository
//
// Invariants held here:
// - stock reserved by a create that fails is released exactly once
// - existence is checked before ownership, ownership before any gate
// - cancellation checks the time window, then the status, then persists,
//   and only then releases stock
//
// ============================================================================

pub const DEFAULT_CANCELLATION_WINDOW_MINUTES: i64 = 5;

pub struct OrderLifecycleManager {
    catalog: Arc<dyn Catalog>,
    ledger: Arc<StockLedger>,
    validators: ValidatorChain,
    repository: Arc<dyn OrderRepository>,
    clock: Arc<dyn Clock>,
    cancellation_window: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl OrderLifecycleManager {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        ledger: Arc<StockLedger>,
        validators: ValidatorChain,
        repository: Arc<dyn OrderRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            validators,
            repository,
            clock,
            cancellation_window: Duration::minutes(DEFAULT_CANCELLATION_WINDOW_MINUTES),
            metrics: None,
        }
    }

    pub fn with_cancellation_window(mut self, window: Duration) -> Self {
        self.cancellation_window = window;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    /// Validate, reserve and persist a new PENDING order.
    pub async fn create(&self, command: CreateOrder) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = self.create_order(command).await;

        if let Some(metrics) = &self.metrics {
            metrics.create_duration.observe(started.elapsed().as_secs_f64());
            match &result {
                Ok(_) => metrics.orders_created.inc(),
                Err(err) => metrics.record_failure("create", err.code()),
            }
        }

        result
    }

    async fn create_order(&self, command: CreateOrder) -> Result<Order, OrderError> {
        command.validate()?;

        tracing::info!(
            customer_id = %command.customer_id,
            item_count = command.items.len(),
            "Creating order"
        );

        let mut reserved: Vec<OrderItem> = Vec::with_capacity(command.items.len());
        for request in &command.items {
            match self.reserve_item(request) {
                Ok(item) => reserved.push(item),
                Err(err) => {
                    tracing::warn!(
                        customer_id = %command.customer_id,
                        product_id = %request.product_id,
                        code = err.code(),
                        error = %err,
                        "Order item rejected"
                    );
                    self.compensate(&reserved);
                    return Err(err);
                }
            }
        }

        let order = Order::new_pending(command.customer_id, reserved, self.clock.now());
        let order_id = order.id;
        let items = order.items.clone();

        match self.repository.save(order).await {
            Ok(saved) => {
                tracing::info!(
                    order_id = %saved.id,
                    customer_id = %saved.customer_id,
                    item_count = saved.items.len(),
                    "Order created"
                );
                Ok(saved)
            }
            Err(err) => {
                tracing::error!(
                    order_id = %order_id,
                    error = %err,
                    "Failed to persist order, releasing reserved stock"
                );
                self.compensate(&items);
                Err(err.into())
            }
        }
    }

    /// Resolve, validate and reserve one line, capturing the current price.
    fn reserve_item(&self, request: &OrderItemRequest) -> Result<OrderItem, OrderError> {
        let product = self.catalog.get_product(&request.product_id)?;
        self.validators.validate(request, &product)?;
        self.ledger.reserve(&product.id, request.quantity)?;

        Ok(OrderItem {
            product_id: product.id,
            quantity: request.quantity,
            price: product.price,
        })
    }

    fn compensate(&self, reserved: &[OrderItem]) {
        if reserved.is_empty() {
            return;
        }

        for item in reserved {
            self.ledger.release(&item.product_id, item.quantity);
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_compensation(reserved.len());
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn get(&self, order_id: Uuid, customer_id: &str) -> Result<Order, OrderError> {
        self.load_owned(order_id, customer_id).await
    }

    /// A blank filter means "all statuses"; anything else must parse.
    pub async fn list(
        &self,
        customer_id: &str,
        status_filter: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<Page<Order>, OrderError> {
        let status = match status_filter.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(
                raw.parse::<OrderStatus>()
                    .map_err(|e| OrderError::InvalidRequest(e.to_string()))?,
            ),
            None => None,
        };

        if size == 0 {
            return Err(OrderError::InvalidRequest(
                "Page size must be at least 1".to_string(),
            ));
        }

        let page = self
            .repository
            .find_by_customer(customer_id, status, PageRequest::new(page, size))
            .await?;

        Ok(page)
    }

    async fn load_owned(&self, order_id: Uuid, customer_id: &str) -> Result<Order, OrderError> {
        let order = self
            .repository
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if let Err(err) = order.ensure_owned_by(customer_id) {
            tracing::warn!(
                order_id = %order_id,
                customer_id = %customer_id,
                "Access to order denied"
            );
            return Err(err);
        }

        Ok(order)
    }

    // ------------------------------------------------------------------------
    // Cancel
    // ------------------------------------------------------------------------

    /// Cancel a PENDING order inside its window and hand its stock back.
    pub async fn cancel(&self, order_id: Uuid, customer_id: &str) -> Result<Order, OrderError> {
        let result = self.cancel_order(order_id, customer_id).await;

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.orders_cancelled.inc(),
                Err(err) => metrics.record_failure("cancel", err.code()),
            }
        }

        result
    }

    async fn cancel_order(&self, order_id: Uuid, customer_id: &str) -> Result<Order, OrderError> {
        let mut order = self.load_owned(order_id, customer_id).await?;
        order.cancel(self.clock.now(), self.cancellation_window)?;
        let items = order.items.clone();

        // Stock goes back only once CANCELLED is stored; a lost race must not
        // expose units that the winning order still holds.
        match self.repository.save(order).await {
            Ok(saved) => {
                self.release_all(&items);
                tracing::info!(
                    order_id = %order_id,
                    customer_id = %customer_id,
                    "Order cancelled"
                );
                Ok(saved)
            }
            Err(RepositoryError::VersionConflict { actual, .. }) => {
                let current = self
                    .repository
                    .find_by_id(order_id)
                    .await?
                    .ok_or(OrderError::OrderNotFound(order_id))?;

                tracing::warn!(
                    order_id = %order_id,
                    status = %current.status,
                    version = actual,
                    "Cancellation lost a concurrent update"
                );
                Err(OrderError::InvalidOrderStatus(current.status))
            }
            Err(err) => {
                self.release_all(&items);
                tracing::error!(
                    order_id = %order_id,
                    error = %err,
                    "Stock released but cancellation not persisted; ledger needs reconciliation"
                );
                Err(err.into())
            }
        }
    }

    fn release_all(&self, items: &[OrderItem]) {
        for item in items {
            self.ledger.release(&item.product_id, item.quantity);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::clock::ManualClock;
    use crate::domain::order::Product;
    use crate::repository::InMemoryOrderRepository;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicBool, Ordering};

    const CUSTOMER_ID: &str = "user-1";

    // ------------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------------

    /// Delegates to the in-memory store, but can be told to fail saves.
    #[derive(Default)]
    struct FlakyRepository {
        inner: InMemoryOrderRepository,
        fail_saves: AtomicBool,
    }

    impl FlakyRepository {
        fn fail_saves(&self, fail: bool) {
            self.fail_saves.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl OrderRepository for FlakyRepository {
        async fn save(&self, order: Order) -> Result<Order, RepositoryError> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(RepositoryError::Storage("DB Connection Died".to_string()));
            }
            self.inner.save(order).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_customer(
            &self,
            customer_id: &str,
            status: Option<OrderStatus>,
            request: PageRequest,
        ) -> Result<Page<Order>, RepositoryError> {
            self.inner.find_by_customer(customer_id, status, request).await
        }

        async fn find_pending_older_than(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<Order>, RepositoryError> {
            self.inner.find_pending_older_than(cutoff).await
        }
    }

    /// Lets a promotion land between a cancel's read and its write.
    #[derive(Default)]
    struct PromotesBeforeCancel {
        inner: InMemoryOrderRepository,
    }

    #[async_trait]
    impl OrderRepository for PromotesBeforeCancel {
        async fn save(&self, order: Order) -> Result<Order, RepositoryError> {
            if order.status == OrderStatus::Cancelled {
                if let Some(mut stored) = self.inner.find_by_id(order.id).await? {
                    stored.status = OrderStatus::Processing;
                    self.inner.save(stored).await?;
                }
            }
            self.inner.save(order).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_customer(
            &self,
            customer_id: &str,
            status: Option<OrderStatus>,
            request: PageRequest,
        ) -> Result<Page<Order>, RepositoryError> {
            self.inner.find_by_customer(customer_id, status, request).await
        }

        async fn find_pending_older_than(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<Order>, RepositoryError> {
            self.inner.find_pending_older_than(cutoff).await
        }
    }

    /// While a cancel is in flight, another buyer grabs the product and the
    /// promoter moves the order on.
    struct BuyerAndPromoterFirst {
        inner: InMemoryOrderRepository,
        ledger: Arc<StockLedger>,
        product_id: &'static str,
        quantity: u32,
        buyer_reserved: AtomicBool,
    }

    #[async_trait]
    impl OrderRepository for BuyerAndPromoterFirst {
        async fn save(&self, order: Order) -> Result<Order, RepositoryError> {
            if order.status == OrderStatus::Cancelled {
                let bought = self.ledger.reserve(self.product_id, self.quantity).is_ok();
                self.buyer_reserved.store(bought, Ordering::SeqCst);

                if let Some(mut stored) = self.inner.find_by_id(order.id).await? {
                    stored.status = OrderStatus::Processing;
                    self.inner.save(stored).await?;
                }
            }
            self.inner.save(order).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_customer(
            &self,
            customer_id: &str,
            status: Option<OrderStatus>,
            request: PageRequest,
        ) -> Result<Page<Order>, RepositoryError> {
            self.inner.find_by_customer(customer_id, status, request).await
        }

        async fn find_pending_older_than(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<Order>, RepositoryError> {
            self.inner.find_pending_older_than(cutoff).await
        }
    }

    struct Fixture {
        manager: Arc<OrderLifecycleManager>,
        ledger: Arc<StockLedger>,
        catalog: Arc<InMemoryCatalog>,
        repository: Arc<dyn OrderRepository>,
        clock: Arc<ManualClock>,
        metrics: Arc<Metrics>,
    }

    fn fixture_with(repository: Arc<dyn OrderRepository>, validators: Option<ValidatorChain>) -> Fixture {
        let catalog = Arc::new(InMemoryCatalog::from_products([
            Product::new("PROD-1", "Wireless Mouse", Decimal::new(2500, 2)),
            Product::new("PROD-2", "Mechanical Keyboard", Decimal::new(15000, 2)),
            Product::new("PROD-3", "iPhone 15", Decimal::new(99900, 2)),
            Product::new("PROD-4", "Unstocked Cable", Decimal::new(500, 2)),
        ]));
        let ledger = Arc::new(StockLedger::from_seed([
            ("PROD-1", 100),
            ("PROD-2", 50),
            ("PROD-3", 2),
        ]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let metrics = Arc::new(Metrics::new().unwrap());
        let validators = validators.unwrap_or_else(|| ValidatorChain::default_for(ledger.clone()));

        let manager = OrderLifecycleManager::new(
            catalog.clone(),
            ledger.clone(),
            validators,
            repository.clone(),
            clock.clone(),
        )
        .with_metrics(metrics.clone());

        Fixture {
            manager: Arc::new(manager),
            ledger,
            catalog,
            repository,
            clock,
            metrics,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(InMemoryOrderRepository::new()), None)
    }

    fn one_item(product_id: &str, quantity: u32) -> CreateOrder {
        CreateOrder::new(CUSTOMER_ID, vec![OrderItemRequest::new(product_id, quantity)])
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_then_cancel_round_trip() {
        let f = fixture();

        let order = f.manager.create(one_item("PROD-1", 2)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.customer_id, CUSTOMER_ID);
        assert_eq!(
            order.items,
            vec![OrderItem {
                product_id: "PROD-1".to_string(),
                quantity: 2,
                price: Decimal::new(2500, 2),
            }]
        );
        assert_eq!(order.version, 1);
        assert_eq!(f.ledger.available("PROD-1"), Some(98));

        let cancelled = f.manager.cancel(order.id, CUSTOMER_ID).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.version, 2);
        assert_eq!(f.ledger.available("PROD-1"), Some(100));

        assert_eq!(f.metrics.orders_created.get(), 1);
        assert_eq!(f.metrics.orders_cancelled.get(), 1);
    }

    #[tokio::test]
    async fn test_create_keeps_submission_order() {
        let f = fixture();
        let command = CreateOrder::new(
            CUSTOMER_ID,
            vec![
                OrderItemRequest::new("PROD-2", 1),
                OrderItemRequest::new("PROD-1", 3),
                OrderItemRequest::new("PROD-3", 1),
            ],
        );

        let order = f.manager.create(command).await.unwrap();
        let ids: Vec<&str> = order.items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["PROD-2", "PROD-1", "PROD-3"]);

        assert_eq!(f.ledger.available("PROD-1"), Some(97));
        assert_eq!(f.ledger.available("PROD-2"), Some(49));
        assert_eq!(f.ledger.available("PROD-3"), Some(1));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_request() {
        let f = fixture();
        let err = f.manager.create(CreateOrder::new(CUSTOMER_ID, vec![])).await.unwrap_err();

        assert!(matches!(err, OrderError::InvalidRequest(_)));
        let page = f.manager.list(CUSTOMER_ID, None, 0, 10).await.unwrap();
        assert_eq!(page.total_elements, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_releases_earlier_items() {
        let f = fixture();
        let command = CreateOrder::new(
            CUSTOMER_ID,
            vec![
                OrderItemRequest::new("PROD-1", 2),
                OrderItemRequest::new("UNKNOWN", 1),
                OrderItemRequest::new("PROD-2", 1),
            ],
        );

        let err = f.manager.create(command).await.unwrap_err();
        assert_eq!(err, OrderError::ProductNotFound("UNKNOWN".to_string()));

        assert_eq!(f.ledger.available("PROD-1"), Some(100));
        assert_eq!(f.ledger.available("PROD-2"), Some(50));
        assert_eq!(f.metrics.stock_compensations.get(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_halts_before_reservation() {
        let f = fixture();
        let command = CreateOrder::new(
            CUSTOMER_ID,
            vec![OrderItemRequest::new("PROD-3", 5), OrderItemRequest::new("PROD-1", 1)],
        );

        let err = f.manager.create(command).await.unwrap_err();
        assert_eq!(
            err,
            OrderError::InsufficientStock("Insufficient stock for 'iPhone 15'.".to_string())
        );

        assert_eq!(f.ledger.available("PROD-3"), Some(2));
        assert_eq!(f.ledger.available("PROD-1"), Some(100));
        let page = f.manager.list(CUSTOMER_ID, None, 0, 10).await.unwrap();
        assert_eq!(page.total_elements, 0);
    }

    #[tokio::test]
    async fn test_missing_ledger_entry_fails_stock_not_found() {
        let f = fixture_with(
            Arc::new(InMemoryOrderRepository::new()),
            Some(ValidatorChain::default()),
        );

        let command = CreateOrder::new(
            CUSTOMER_ID,
            vec![OrderItemRequest::new("PROD-1", 1), OrderItemRequest::new("PROD-4", 1)],
        );
        let err = f.manager.create(command).await.unwrap_err();

        assert_eq!(err, OrderError::StockNotFound("PROD-4".to_string()));
        assert_eq!(f.ledger.available("PROD-1"), Some(100));
    }

    #[tokio::test]
    async fn test_save_failure_releases_every_reservation_once() {
        let repository = Arc::new(FlakyRepository::default());
        let f = fixture_with(repository.clone(), None);
        repository.fail_saves(true);

        let command = CreateOrder::new(
            CUSTOMER_ID,
            vec![OrderItemRequest::new("PROD-1", 2), OrderItemRequest::new("PROD-2", 5)],
        );
        let err = f.manager.create(command).await.unwrap_err();

        assert_eq!(err.code(), "ERR_001");
        assert!(err.to_string().contains("DB Connection Died"));
        assert_eq!(f.ledger.available("PROD-1"), Some(100));
        assert_eq!(f.ledger.available("PROD-2"), Some(50));
        assert_eq!(f.metrics.stock_compensations.get(), 2);
        assert_eq!(f.metrics.orders_created.get(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_for_last_unit() {
        let f = fixture();
        f.ledger.seed("PROD-3", 1);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = f.manager.clone();
                tokio::spawn(async move { manager.create(one_item("PROD-3", 1)).await })
            })
            .collect();

        let results: Vec<Result<Order, OrderError>> = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let insufficient = results
            .iter()
            .filter(|r| matches!(r, Err(OrderError::InsufficientStock(_))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(insufficient, 15);
        assert_eq!(f.ledger.available("PROD-3"), Some(0));
    }

    #[tokio::test]
    async fn test_price_is_captured_at_creation() {
        let f = fixture();
        let order = f.manager.create(one_item("PROD-1", 1)).await.unwrap();

        f.catalog
            .upsert(Product::new("PROD-1", "Wireless Mouse", Decimal::new(9900, 2)));

        let loaded = f.manager.get(order.id, CUSTOMER_ID).await.unwrap();
        assert_eq!(loaded.items[0].price, Decimal::new(2500, 2));
    }

    // ------------------------------------------------------------------------
    // Get / List
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_not_found_before_ownership() {
        let f = fixture();
        let missing = Uuid::new_v4();

        let err = f.manager.get(missing, "someone-else").await.unwrap_err();
        assert_eq!(err, OrderError::OrderNotFound(missing));
    }

    #[tokio::test]
    async fn test_other_customer_is_denied() {
        let f = fixture();
        let order = f.manager.create(one_item("PROD-1", 2)).await.unwrap();

        assert_eq!(
            f.manager.get(order.id, "hacker-user").await.unwrap_err(),
            OrderError::AccessDenied
        );
        assert_eq!(
            f.manager.cancel(order.id, "hacker-user").await.unwrap_err(),
            OrderError::AccessDenied
        );
        assert_eq!(f.ledger.available("PROD-1"), Some(98));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filter() {
        let f = fixture();
        let first = f.manager.create(one_item("PROD-1", 1)).await.unwrap();
        f.clock.advance(Duration::seconds(30));
        let second = f.manager.create(one_item("PROD-2", 1)).await.unwrap();
        f.clock.advance(Duration::seconds(30));
        let third = f.manager.create(one_item("PROD-1", 1)).await.unwrap();
        f.manager.create(CreateOrder::new("user-2", vec![OrderItemRequest::new("PROD-1", 1)]))
            .await
            .unwrap();

        f.manager.cancel(second.id, CUSTOMER_ID).await.unwrap();

        let all = f.manager.list(CUSTOMER_ID, None, 0, 10).await.unwrap();
        let ids: Vec<Uuid> = all.content.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let pending = f.manager.list(CUSTOMER_ID, Some("pending"), 0, 10).await.unwrap();
        assert_eq!(pending.total_elements, 2);

        let cancelled = f.manager.list(CUSTOMER_ID, Some("CANCELLED"), 0, 10).await.unwrap();
        assert_eq!(cancelled.content.len(), 1);
        assert_eq!(cancelled.content[0].id, second.id);

        let blank = f.manager.list(CUSTOMER_ID, Some("  "), 0, 10).await.unwrap();
        assert_eq!(blank.total_elements, 3);

        let paged = f.manager.list(CUSTOMER_ID, None, 1, 2).await.unwrap();
        assert_eq!(paged.content.len(), 1);
        assert_eq!(paged.total_pages, 2);
        assert!(paged.last);
    }

    #[tokio::test]
    async fn test_list_rejects_bad_input() {
        let f = fixture();

        let err = f.manager.list(CUSTOMER_ID, Some("JUNK_STATUS"), 0, 10).await.unwrap_err();
        assert_eq!(err, OrderError::InvalidRequest("Invalid status: JUNK_STATUS".to_string()));

        let err = f.manager.list(CUSTOMER_ID, None, 0, 0).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidRequest(_)));
    }

    // ------------------------------------------------------------------------
    // Cancel
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cancel_just_inside_window() {
        let f = fixture();
        let order = f.manager.create(one_item("PROD-1", 2)).await.unwrap();

        f.clock.advance(Duration::minutes(4) + Duration::seconds(59));
        let cancelled = f.manager.cancel(order.id, CUSTOMER_ID).await.unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(f.ledger.available("PROD-1"), Some(100));
    }

    #[tokio::test]
    async fn test_cancel_just_outside_window() {
        let f = fixture();
        let order = f.manager.create(one_item("PROD-1", 2)).await.unwrap();

        f.clock.advance(Duration::minutes(5) + Duration::seconds(1));
        let err = f.manager.cancel(order.id, CUSTOMER_ID).await.unwrap_err();

        assert_eq!(err, OrderError::CancellationExpired(300));
        assert_eq!(f.ledger.available("PROD-1"), Some(98));
        let stored = f.manager.get(order.id, CUSTOMER_ID).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_cannot_cancel_shipped_order() {
        let f = fixture();
        let order = f.manager.create(one_item("PROD-1", 2)).await.unwrap();

        let mut shipped = order.clone();
        shipped.status = OrderStatus::Shipped;
        f.repository.save(shipped).await.unwrap();

        let err = f.manager.cancel(order.id, CUSTOMER_ID).await.unwrap_err();
        assert_eq!(err, OrderError::InvalidOrderStatus(OrderStatus::Shipped));
        assert_eq!(f.ledger.available("PROD-1"), Some(98));
        assert_eq!(f.metrics.orders_cancelled.get(), 0);
    }

    #[tokio::test]
    async fn test_second_cancel_does_not_release_twice() {
        let f = fixture();
        let order = f.manager.create(one_item("PROD-1", 2)).await.unwrap();

        f.manager.cancel(order.id, CUSTOMER_ID).await.unwrap();
        let err = f.manager.cancel(order.id, CUSTOMER_ID).await.unwrap_err();

        assert_eq!(err, OrderError::InvalidOrderStatus(OrderStatus::Cancelled));
        assert_eq!(f.ledger.available("PROD-1"), Some(100));
    }

    #[tokio::test]
    async fn test_cancel_losing_to_promotion_keeps_ledger_balanced() {
        let f = fixture_with(Arc::new(PromotesBeforeCancel::default()), None);
        let order = f.manager.create(one_item("PROD-1", 2)).await.unwrap();

        let err = f.manager.cancel(order.id, CUSTOMER_ID).await.unwrap_err();

        assert_eq!(err, OrderError::InvalidOrderStatus(OrderStatus::Processing));
        assert_eq!(f.ledger.available("PROD-1"), Some(98));
        let stored = f.manager.get(order.id, CUSTOMER_ID).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_lost_cancel_never_frees_stock_to_other_buyers() {
        let ledger = Arc::new(StockLedger::from_seed([("PROD-3", 2)]));
        let catalog = Arc::new(InMemoryCatalog::from_products([Product::new(
            "PROD-3",
            "iPhone 15",
            Decimal::new(99900, 2),
        )]));
        let repository = Arc::new(BuyerAndPromoterFirst {
            inner: InMemoryOrderRepository::new(),
            ledger: ledger.clone(),
            product_id: "PROD-3",
            quantity: 2,
            buyer_reserved: AtomicBool::new(false),
        });
        let manager = OrderLifecycleManager::new(
            catalog,
            ledger.clone(),
            ValidatorChain::default_for(ledger.clone()),
            repository.clone(),
            Arc::new(ManualClock::new(Utc::now())),
        );

        let order = manager.create(one_item("PROD-3", 2)).await.unwrap();
        assert_eq!(ledger.available("PROD-3"), Some(0));

        let err = manager.cancel(order.id, CUSTOMER_ID).await.unwrap_err();

        assert_eq!(err, OrderError::InvalidOrderStatus(OrderStatus::Processing));
        // the winning order still holds both units
        assert!(!repository.buyer_reserved.load(Ordering::SeqCst));
        assert_eq!(ledger.available("PROD-3"), Some(0));
        let stored = manager.get(order.id, CUSTOMER_ID).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_cancel_storage_failure_is_not_compensated() {
        let repository = Arc::new(FlakyRepository::default());
        let f = fixture_with(repository.clone(), None);
        let order = f.manager.create(one_item("PROD-1", 2)).await.unwrap();

        repository.fail_saves(true);
        let err = f.manager.cancel(order.id, CUSTOMER_ID).await.unwrap_err();

        assert_eq!(err.code(), "ERR_001");
        // release already happened and stays
        assert_eq!(f.ledger.available("PROD-1"), Some(100));
        let stored = f.manager.get(order.id, CUSTOMER_ID).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_custom_cancellation_window() {
        let repository: Arc<dyn OrderRepository> = Arc::new(InMemoryOrderRepository::new());
        let ledger = Arc::new(StockLedger::from_seed([("PROD-1", 10)]));
        let catalog = Arc::new(InMemoryCatalog::from_products([Product::new(
            "PROD-1",
            "Wireless Mouse",
            Decimal::new(2500, 2),
        )]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = OrderLifecycleManager::new(
            catalog,
            ledger.clone(),
            ValidatorChain::default_for(ledger.clone()),
            repository,
            clock.clone(),
        )
        .with_cancellation_window(Duration::minutes(1));

        let order = manager.create(one_item("PROD-1", 1)).await.unwrap();
        clock.advance(Duration::seconds(61));

        let err = manager.cancel(order.id, CUSTOMER_ID).await.unwrap_err();
        assert_eq!(err, OrderError::CancellationExpired(60));
    }
}
