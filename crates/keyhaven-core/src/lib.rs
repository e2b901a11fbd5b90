//! Keyhaven core engine.
//!
//! The tenant-isolated secret management engine: per-organization key
//! derivation, authenticated encryption with an independent integrity
//! digest, append-only version history, composite access evaluation, and a
//! best-effort audit trail, all orchestrated by [`SecretService`] over a
//! pluggable [`SecretStore`](keyhaven_store::SecretStore).
//!
//! This crate holds policy and cryptography only. Persistence lives in
//! `keyhaven-store`; the HTTP surface lives in `keyhaven-server`.

pub mod access;
pub mod audit;
pub mod cipher;
pub mod error;
pub mod export;
pub mod keys;
pub mod service;
pub mod versions;

pub use access::{AccessEvaluator, Action};
pub use audit::{AuditAction, AuditSink};
pub use cipher::EncryptedValue;
pub use error::{CryptoError, SecretError};
pub use export::{render, ExportFormat, ExportedSecret};
pub use keys::{derive_org_key, OrgKey};
pub use service::{
    BulkExport, BulkExportFailure, CreateSecret, OpenedSecret, SecretMeta, SecretService,
};
pub use versions::{VersionEntry, VersionState, VersionStore};
