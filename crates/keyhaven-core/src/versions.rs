//! Append-only version history.
//!
//! Every content-changing update first archives the live payload as a
//! [`SecretVersionRow`], then overwrites the live row — never the reverse —
//! so the archive is never missing the predecessor of any live value.
//! Snapshots are keyed by (secret, version) and are never updated or
//! deleted; deleting the secret leaves them behind as orphaned history for
//! audit purposes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use keyhaven_store::models::{SecretRow, SecretVersionRow};
use keyhaven_store::{SecretStore, StoreError};

use crate::error::SecretError;

/// Whether a listed version is the live payload or an archived snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionState {
    Current,
    Archived,
}

/// One entry in a secret's version history. Carries no payload.
#[derive(Debug, Clone, Serialize)]
pub struct VersionEntry {
    pub version: i32,
    pub state: VersionState,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Version history over a [`SecretStore`].
pub struct VersionStore {
    store: Arc<dyn SecretStore>,
}

impl VersionStore {
    /// Create a version store over the given backend.
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Archive the live row's payload under its current version number.
    ///
    /// Must be called exactly once, immediately before the live row is
    /// overwritten. The snapshot records the principal and time that
    /// produced the payload being archived, not the updater about to
    /// replace it.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::DuplicateVersion`] if a snapshot for this
    /// (secret, version) pair already exists, or [`SecretError::Store`]
    /// if the backend fails.
    pub async fn archive_current(&self, live: &SecretRow) -> Result<(), SecretError> {
        let snapshot = SecretVersionRow {
            secret_id: live.id,
            version: live.version,
            encrypted_value: live.encrypted_value.clone(),
            integrity_digest: live.integrity_digest.clone(),
            created_by: live.updated_by,
            created_at: live.updated_at,
        };

        self.store
            .insert_version(&snapshot)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate { .. } => SecretError::DuplicateVersion {
                    secret_id: live.id,
                    version: live.version,
                },
                other => SecretError::Store(other),
            })
    }

    /// List the full history of a secret, newest first.
    ///
    /// The live row (if any) is tagged [`VersionState::Current`]; archived
    /// snapshots are tagged [`VersionState::Archived`]. For a deleted
    /// secret only the orphaned snapshots remain.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Store`] if the backend fails.
    pub async fn list(&self, secret_id: Uuid) -> Result<Vec<VersionEntry>, SecretError> {
        let live = self.store.get_secret(secret_id).await?;
        let archived = self.store.list_versions(secret_id).await?;

        let mut entries = Vec::with_capacity(archived.len().saturating_add(1));
        if let Some(row) = live {
            entries.push(VersionEntry {
                version: row.version,
                state: VersionState::Current,
                created_by: row.updated_by,
                created_at: row.updated_at,
            });
        }
        for row in archived {
            entries.push(VersionEntry {
                version: row.version,
                state: VersionState::Archived,
                created_by: row.created_by,
                created_at: row.created_at,
            });
        }
        entries.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(entries)
    }

    /// Fetch the encrypted payload of one historical version.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::VersionNotFound`] if no snapshot exists for
    /// (secret, version), or [`SecretError::Store`] if the backend fails.
    pub async fn get(
        &self,
        secret_id: Uuid,
        version: i32,
    ) -> Result<SecretVersionRow, SecretError> {
        self.store
            .get_version(secret_id, version)
            .await?
            .ok_or(SecretError::VersionNotFound { secret_id, version })
    }
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore").finish_non_exhaustive()
    }
}
