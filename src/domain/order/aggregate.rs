use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{OrderItem, OrderStatus};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Items and created_at are fixed at construction. After that only `status`
// changes, and only along the transitions OrderStatus allows.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    /// Optimistic lock token. The repository checks and bumps it on save.
    pub version: i64,

    // State
    pub customer_id: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// A fresh PENDING order that has never been saved (version 0).
    pub fn new_pending(
        customer_id: impl Into<String>,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 0,
            customer_id: customer_id.into(),
            status: OrderStatus::Pending,
            items,
            created_at,
        }
    }

    pub fn ensure_owned_by(&self, customer_id: &str) -> Result<(), OrderError> {
        if self.customer_id != customer_id {
            return Err(OrderError::AccessDenied);
        }
        Ok(())
    }

    pub fn cancellation_deadline(&self, window: Duration) -> DateTime<Utc> {
        self.created_at + window
    }

    /// Time gate first, then status gate.
    pub fn ensure_cancellable(&self, now: DateTime<Utc>, window: Duration) -> Result<(), OrderError> {
        if now > self.cancellation_deadline(window) {
            return Err(OrderError::CancellationExpired(window.num_seconds()));
        }

        if !self.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::InvalidOrderStatus(self.status));
        }

        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>, window: Duration) -> Result<(), OrderError> {
        self.ensure_cancellable(now, window)?;
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    pub fn promote(&mut self) -> Result<(), OrderError> {
        if !self.status.can_transition_to(OrderStatus::Processing) {
            return Err(OrderError::InvalidOrderStatus(self.status));
        }
        self.status = OrderStatus::Processing;
        Ok(())
    }

    /// Stale means still PENDING and created strictly before `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending && self.created_at < cutoff
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
