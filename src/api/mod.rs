// ============================================================================
// HTTP API - order endpoints on actix-web
// ============================================================================
//
// Caller identity comes from the `X-User-Id` header. Every failure is
// rendered as `{code, message, status, timestamp}` with the domain error's
// stable code.
//
// ============================================================================

// Private module declarations
mod dto;
mod error;
mod routes;

// Re-export for public API
pub use routes::configure;
