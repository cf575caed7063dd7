use std::sync::Arc;

use chrono::Duration;

use crate::clock::Clock;
use crate::metrics::Metrics;
use crate::repository::{OrderRepository, RepositoryError};

pub const DEFAULT_STALE_AFTER_MINUTES: i64 = 5;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionReport {
    pub promoted: usize,
    /// Orders that changed under us (usually a cancel won the race).
    pub skipped: usize,
    pub failed: usize,
}

/// Moves PENDING orders that outlived their cancellation window to PROCESSING.
pub struct StaleOrderPromoter {
    repository: Arc<dyn OrderRepository>,
    clock: Arc<dyn Clock>,
    stale_after: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl StaleOrderPromoter {
    pub fn new(repository: Arc<dyn OrderRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            stale_after: Duration::minutes(DEFAULT_STALE_AFTER_MINUTES),
            metrics: None,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn run_once(&self) -> Result<PromotionReport, RepositoryError> {
        let cutoff = self.clock.now() - self.stale_after;
        let stale = self.repository.find_pending_older_than(cutoff).await?;

        let mut report = PromotionReport::default();
        if stale.is_empty() {
            return Ok(report);
        }

        tracing::debug!(count = stale.len(), cutoff = %cutoff, "Promoting stale orders");

        for mut order in stale {
            let order_id = order.id;

            if order.promote().is_err() {
                report.skipped += 1;
                continue;
            }

            match self.repository.save(order).await {
                Ok(_) => {
                    tracing::info!(order_id = %order_id, "Order promoted to PROCESSING");
                    report.promoted += 1;
                }
                Err(RepositoryError::VersionConflict { .. }) => {
                    tracing::debug!(order_id = %order_id, "Order changed concurrently, skipping");
                    report.skipped += 1;
                }
                Err(err) => {
                    tracing::error!(order_id = %order_id, error = %err, "Failed to promote order");
                    report.failed += 1;
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.orders_promoted.inc_by(report.promoted as u64);
        }

        tracing::info!(
            promoted = report.promoted,
            skipped = report.skipped,
            failed = report.failed,
            "Promotion sweep finished"
        );

        Ok(report)
    }
}
