//! Shared application state.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use keyhaven_core::SecretService;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// The secret management engine.
    pub service: SecretService,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
