// ============================================================================
// Actors Module
// ============================================================================
//
// Background drivers for the order domain. Domain logic stays in
// `domain::order`; actors only schedule it.
//
// ============================================================================

// Private module declarations
mod promoter;

// Re-export only what's needed in the public API
pub use promoter::{PromoterActor, RunPromotion};
