// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderItem, OrderStatus, Product)
// - Commands (CreateOrder)
// - Errors (OrderError with stable codes)
// - Aggregate (Order and its status transitions)
// - Validator chain (per-item checks before reservation)
// - Lifecycle manager (create / get / list / cancel)
// - Stale-order promoter
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod validation;
pub mod lifecycle;
pub mod promoter;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use validation::*;
pub use lifecycle::*;
pub use promoter::*;
