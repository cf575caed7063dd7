// Private module declaration
mod server;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::configure;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers the order lifecycle:
// - Orders created / cancelled / promoted
// - Business failures by stable error code
// - Stock compensations (reservations handed back after a failed create)
// - Create latency
//
// Scraped via /metrics on the API server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_created: IntCounter,
    pub orders_cancelled: IntCounter,
    pub orders_promoted: IntCounter,
    pub order_failures: IntCounterVec,
    pub stock_compensations: IntCounter,
    pub create_duration: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_cancelled = IntCounter::new("orders_cancelled_total", "Total orders cancelled")?;
        registry.register(Box::new(orders_cancelled.clone()))?;

        let orders_promoted = IntCounter::new(
            "orders_promoted_total",
            "Total stale pending orders promoted to processing",
        )?;
        registry.register(Box::new(orders_promoted.clone()))?;

        let order_failures = IntCounterVec::new(
            Opts::new("order_failures_total", "Order operations rejected, by error code"),
            &["operation", "code"],
        )?;
        registry.register(Box::new(order_failures.clone()))?;

        let stock_compensations = IntCounter::new(
            "stock_compensations_total",
            "Reserved line items released after a failed create",
        )?;
        registry.register(Box::new(stock_compensations.clone()))?;

        let create_duration = Histogram::with_opts(
            HistogramOpts::new("order_create_duration_seconds", "Order creation duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(create_duration.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            orders_cancelled,
            orders_promoted,
            order_failures,
            stock_compensations,
            create_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_failure(&self, operation: &str, code: &str) {
        self.order_failures.with_label_values(&[operation, code]).inc();
    }

    pub fn record_compensation(&self, released_items: usize) {
        self.stock_compensations.inc_by(released_items as u64);
    }
}
