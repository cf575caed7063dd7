use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderRepository, Page, PageRequest, RepositoryError};
use crate::domain::order::{Order, OrderStatus};

/// In-memory order store.
///
/// Orders live in a HashMap behind a read-write lock. The version check and
/// the write in `save` happen under the same write guard.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, mut order: Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;

        let current = orders.get(&order.id).map(|stored| stored.version).unwrap_or(0);
        if current != order.version {
            return Err(RepositoryError::VersionConflict {
                id: order.id,
                expected: order.version,
                actual: current,
            });
        }

        order.version += 1;
        orders.insert(order.id, order.clone());

        tracing::debug!(
            order_id = %order.id,
            status = %order.status,
            version = order.version,
            "Saved order"
        );

        Ok(order)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
        status: Option<OrderStatus>,
        request: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let orders = self.orders.read().await;

        let mut matching: Vec<&Order> = orders
            .values()
            .filter(|order| order.customer_id == customer_id)
            .filter(|order| status.map_or(true, |wanted| order.status == wanted))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let content = matching
            .into_iter()
            .skip(request.offset())
            .take(request.size as usize)
            .cloned()
            .collect();

        Ok(Page::new(content, request, total))
    }

    async fn find_pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;

        let mut stale: Vec<Order> = orders
            .values()
            .filter(|order| order.is_stale(cutoff))
            .cloned()
            .collect();
        stale.sort_by_key(|order| order.created_at);

        Ok(stale)
    }
}
