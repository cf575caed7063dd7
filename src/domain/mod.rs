// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Everything here is storage- and transport-agnostic. Persistence comes in
// through `repository::OrderRepository`, time through `clock::Clock`.
//
// ============================================================================

pub mod order;
