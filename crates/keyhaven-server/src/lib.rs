//! Keyhaven HTTP server.
//!
//! A thin Axum boundary over the `keyhaven-core` engine: request parsing,
//! principal extraction, and HTTP error mapping. All policy lives in the
//! engine.

pub mod config;
pub mod error;
pub mod principal;
pub mod routes;
pub mod state;
