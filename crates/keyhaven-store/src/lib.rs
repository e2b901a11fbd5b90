//! Persistence layer for Keyhaven.
//!
//! This crate defines the [`SecretStore`] trait — a typed row store that
//! knows nothing about encryption, authorization, or versioning rules. The
//! engine in `keyhaven-core` wraps a store to enforce those; values reaching
//! this layer are always ciphertext.
//!
//! Two implementations are provided:
//!
//! - [`PostgresStore`] — production backend, backed by `PostgreSQL` via sqlx
//!   (feature `postgres`)
//! - [`MemoryStore`] — in-memory, for testing only

mod error;
mod memory;
pub mod models;
#[cfg(feature = "postgres")]
mod postgres;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use models::{AuditRow, GrantRow, OrgRole, OrgRow, SecretRow, SecretVersionRow};

/// A typed row store for the secret engine.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
/// Row-level consistency is required: concurrent readers observe either the
/// pre- or post-update live row, never a partial write. Cross-row atomicity
/// is NOT required — the engine sequences archive-before-overwrite itself
/// and relies on [`update_secret_value`](SecretStore::update_secret_value)
/// being conditional on the observed version.
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync + 'static {
    // ── Organizations (read-only to the engine) ──────────────────────

    /// Fetch an organization row, including its master key material.
    ///
    /// Returns `Ok(None)` if the organization does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn get_org(&self, org_id: Uuid) -> Result<Option<OrgRow>, StoreError>;

    /// Look up a principal's organization-level role.
    ///
    /// Returns `Ok(None)` if the principal has no membership in the org.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn org_role(
        &self,
        org_id: Uuid,
        principal_id: Uuid,
    ) -> Result<Option<OrgRole>, StoreError>;

    // ── Secrets (live rows) ──────────────────────────────────────────

    /// Insert a new secret at version 1.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the id is already taken.
    async fn insert_secret(&self, row: &SecretRow) -> Result<(), StoreError>;

    /// Fetch a secret's live row by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn get_secret(&self, secret_id: Uuid) -> Result<Option<SecretRow>, StoreError>;

    /// List live secret rows for a project, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn list_secrets(&self, project_id: Uuid) -> Result<Vec<SecretRow>, StoreError>;

    /// Conditionally overwrite a secret's live payload.
    ///
    /// Applies only if the live row's version still equals
    /// `expected_version`; on success the version advances to
    /// `expected_version + 1`. Returns `Ok(false)` if the row was missing
    /// or its version had already moved — the caller treats that as a
    /// concurrent-update conflict.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn update_secret_value(
        &self,
        secret_id: Uuid,
        expected_version: i32,
        encrypted_value: &[u8],
        integrity_digest: &str,
        updated_by: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Delete a secret's live row. Archived version rows are untouched.
    ///
    /// Returns `Ok(false)` if no row existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn delete_secret(&self, secret_id: Uuid) -> Result<bool, StoreError>;

    // ── Version snapshots (append-only) ──────────────────────────────

    /// Append an archived version snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if a snapshot for
    /// (secret, version) already exists.
    async fn insert_version(&self, row: &SecretVersionRow) -> Result<(), StoreError>;

    /// List archived snapshots for a secret, newest version first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn list_versions(&self, secret_id: Uuid) -> Result<Vec<SecretVersionRow>, StoreError>;

    /// Fetch one archived snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn get_version(
        &self,
        secret_id: Uuid,
        version: i32,
    ) -> Result<Option<SecretVersionRow>, StoreError>;

    // ── Grants ───────────────────────────────────────────────────────

    /// Insert or replace the grant for (secret, principal).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn upsert_grant(&self, row: &GrantRow) -> Result<(), StoreError>;

    /// Fetch the grant for (secret, principal), expired or not.
    ///
    /// Expiry is evaluated by the caller — the store returns whatever row
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn get_grant(
        &self,
        secret_id: Uuid,
        principal_id: Uuid,
    ) -> Result<Option<GrantRow>, StoreError>;

    /// Delete the grant for (secret, principal).
    ///
    /// Returns `Ok(false)` if no grant existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn delete_grant(&self, secret_id: Uuid, principal_id: Uuid)
        -> Result<bool, StoreError>;

    // ── Audit (append-only log) ──────────────────────────────────────

    /// Append one audit event, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails. The engine logs and
    /// swallows this error; audit emission never fails an operation.
    async fn append_audit(&self, row: &AuditRow) -> Result<Uuid, StoreError>;

    /// List audit events for an organization, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn list_audit(
        &self,
        org_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditRow>, StoreError>;
}
