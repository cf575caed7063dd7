use serde::Serialize;
use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Errors
// ============================================================================
//
// Every variant carries a stable machine-readable code and a response class.
// Callers branch on `code()` / `classification()`; the Display text is the
// human message only.
//
// ============================================================================

/// Recommended response classification for a business error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    NotFound,
    Forbidden,
    Unprocessable,
    BadRequest,
    Internal,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("You do not have permission to access this order")]
    AccessDenied,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InsufficientStock(String),

    #[error("No inventory record for: {0}")]
    StockNotFound(String),

    /// Window length in seconds.
    #[error("Cancellation window of {} has expired", describe_window(*.0))]
    CancellationExpired(i64),

    #[error("Order cannot be cancelled in its current status: {0}")]
    InvalidOrderStatus(OrderStatus),

    #[error("An unexpected error occurred: {0}")]
    Internal(String),
}

fn describe_window(secs: i64) -> String {
    if secs > 0 && secs % 60 == 0 {
        format!("{} minutes", secs / 60)
    } else {
        format!("{secs} seconds")
    }
}

impl OrderError {
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Internal(_) => "ERR_001",
            OrderError::InvalidRequest(_) => "ERR_002",
            OrderError::ProductNotFound(_) => "PROD_001",
            OrderError::InsufficientStock(_) => "INV_001",
            OrderError::StockNotFound(_) => "INV_002",
            OrderError::OrderNotFound(_) => "ORD_001",
            OrderError::AccessDenied => "ORD_002",
            OrderError::CancellationExpired(_) => "ORD_003",
            OrderError::InvalidOrderStatus(_) => "ORD_004",
        }
    }

    pub fn classification(&self) -> ErrorClass {
        match self {
            OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => ErrorClass::NotFound,
            OrderError::AccessDenied => ErrorClass::Forbidden,
            OrderError::InvalidRequest(_) => ErrorClass::BadRequest,
            OrderError::InsufficientStock(_)
            | OrderError::CancellationExpired(_)
            | OrderError::InvalidOrderStatus(_) => ErrorClass::Unprocessable,
            // A missing ledger row for a catalog product is a seeding fault.
            OrderError::StockNotFound(_) | OrderError::Internal(_) => ErrorClass::Internal,
        }
    }
}
