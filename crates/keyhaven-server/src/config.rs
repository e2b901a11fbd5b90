//! Server configuration.
//!
//! Loaded from environment variables with sensible defaults. All settings
//! can be overridden via `KEYHAVEN_*` environment variables.

use std::net::SocketAddr;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Persistence backend.
    pub store_backend: StoreBackendType,
    /// Log level filter (e.g. `info`, `debug`, `warn`).
    pub log_level: String,
}

/// Supported persistence backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// PostgreSQL persistent storage.
    Postgres { url: String },
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT` — port to bind on (binds to `0.0.0.0`)
    /// - `KEYHAVEN_BIND_ADDR` — full bind address (overrides `PORT`, default: `127.0.0.1:8600`)
    /// - `KEYHAVEN_STORE` — `memory` or `postgres` (default: `memory`)
    /// - `DATABASE_URL` — PostgreSQL connection string (required when `KEYHAVEN_STORE=postgres`)
    /// - `KEYHAVEN_LOG_LEVEL` — log filter (default: `info`)
    #[must_use]
    pub fn from_env() -> Self {
        let bind_addr = if let Ok(addr) = std::env::var("KEYHAVEN_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8600)))
        } else if let Ok(port_str) = std::env::var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(8600);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], 8600))
        };

        let store_backend = match std::env::var("KEYHAVEN_STORE")
            .unwrap_or_else(|_| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => {
                let url = std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/keyhaven".to_owned());
                StoreBackendType::Postgres { url }
            }
            _ => StoreBackendType::Memory,
        };

        let log_level = std::env::var("KEYHAVEN_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        Self {
            bind_addr,
            store_backend,
            log_level,
        }
    }

    /// Backend name for logging, with no connection details.
    #[must_use]
    pub fn store_backend_kind(&self) -> &'static str {
        match self.store_backend {
            StoreBackendType::Memory => "memory",
            StoreBackendType::Postgres { .. } => "postgres",
        }
    }
}
