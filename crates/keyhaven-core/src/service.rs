//! Secret lifecycle orchestration.
//!
//! [`SecretService`] is the single entry point the API layer calls. Every
//! operation follows the same shape: authorize, transform through the
//! cipher, sequence archive-before-overwrite through the version store,
//! commit to the store, then fire an audit event. Data flows one direction
//! per call — no component here calls back up into its caller.
//!
//! Failure semantics: authorization failures are terminal and
//! non-retryable; integrity/decryption failures are terminal and worth
//! alerting on; a store failure aborts the operation before any audit
//! emission, leaving state unchanged. Only [`SecretError::Conflict`] is
//! safe for the caller to retry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use keyhaven_store::models::{AuditRow, Environment, GrantRow, OrgRole, Permission, SecretRow};
use keyhaven_store::SecretStore;

use crate::access::{role_permits, AccessEvaluator, Action};
use crate::audit::{AuditAction, AuditSink};
use crate::cipher;
use crate::error::{CryptoError, SecretError};
use crate::export::ExportedSecret;
use crate::keys::{derive_org_key, OrgKey};
use crate::versions::{VersionEntry, VersionStore};

/// Parameters for creating a secret.
#[derive(Debug, Clone)]
pub struct CreateSecret {
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub value: String,
    pub environment: Environment,
}

/// A decrypted secret: the live row plus its verified plaintext.
#[derive(Debug, Clone)]
pub struct OpenedSecret {
    pub secret: SecretRow,
    pub value: String,
}

/// Value-free secret metadata, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SecretMeta {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub version: i32,
    pub environment: Environment,
    pub folder_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl From<SecretRow> for SecretMeta {
    fn from(row: SecretRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            version: row.version,
            environment: row.environment,
            folder_id: row.folder_id,
            updated_at: row.updated_at,
        }
    }
}

/// One failed item in a bulk export.
#[derive(Debug, Clone, Serialize)]
pub struct BulkExportFailure {
    pub secret_id: Uuid,
    pub error: String,
}

/// Outcome of a bulk export. Per-item failures never abort the batch.
#[derive(Debug, Clone)]
pub struct BulkExport {
    pub records: Vec<ExportedSecret>,
    pub failures: Vec<BulkExportFailure>,
    pub requested: usize,
    pub exported: usize,
}

/// The orchestrating service over cipher, versions, access, and audit.
pub struct SecretService {
    store: Arc<dyn SecretStore>,
    access: AccessEvaluator,
    versions: VersionStore,
    audit: AuditSink,
}

impl SecretService {
    /// Build a service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            access: AccessEvaluator::new(Arc::clone(&store)),
            versions: VersionStore::new(Arc::clone(&store)),
            audit: AuditSink::new(Arc::clone(&store)),
            store,
        }
    }

    // ── Lifecycle operations ─────────────────────────────────────────

    /// Create a secret at version 1.
    ///
    /// Requires an org role of developer or above.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Forbidden`], [`SecretError::OrgNotFound`],
    /// or crypto/store errors.
    pub async fn create(
        &self,
        principal: Uuid,
        req: CreateSecret,
    ) -> Result<SecretRow, SecretError> {
        let role = self.store.org_role(req.org_id, principal).await?;
        if !role.is_some_and(|r| role_permits(r, Action::Write)) {
            return Err(SecretError::Forbidden {
                reason: format!("create denied in org {}", req.org_id),
            });
        }

        let key = self.org_key(req.org_id).await?;
        let encrypted = cipher::encrypt(&key, req.value.as_bytes())?;

        let now = Utc::now();
        let row = SecretRow {
            id: Uuid::new_v4(),
            org_id: req.org_id,
            project_id: req.project_id,
            folder_id: req.folder_id,
            name: req.name,
            description: req.description,
            encrypted_value: encrypted.blob,
            integrity_digest: encrypted.digest,
            version: 1,
            environment: req.environment,
            created_by: principal,
            updated_by: principal,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_secret(&row).await?;

        info!(secret_id = %row.id, org_id = %row.org_id, "secret created");
        self.audit
            .record(
                row.org_id,
                principal,
                AuditAction::Created,
                "secret",
                row.id,
                json!({
                    "name": row.name,
                    "project_id": row.project_id,
                    "environment": row.environment.to_string(),
                }),
            )
            .await;

        Ok(row)
    }

    /// Read and decrypt a secret.
    ///
    /// Requires `read`. The plaintext is digest-verified after decryption;
    /// on mismatch the value is never returned.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotFound`], [`SecretError::Forbidden`],
    /// [`SecretError::Integrity`], or crypto/store errors.
    pub async fn read(
        &self,
        principal: Uuid,
        secret_id: Uuid,
    ) -> Result<OpenedSecret, SecretError> {
        let opened = self.open(principal, secret_id).await?;

        self.audit
            .record(
                opened.secret.org_id,
                principal,
                AuditAction::Accessed,
                "secret",
                opened.secret.id,
                json!({ "name": opened.secret.name, "version": opened.secret.version }),
            )
            .await;

        Ok(opened)
    }

    /// Replace a secret's value, advancing its version by exactly 1.
    ///
    /// Requires `write`. The previous payload is archived first; if
    /// archival fails the update is aborted with no partial state. The
    /// overwrite is conditional on the version observed at archive time —
    /// a concurrent update surfaces as [`SecretError::Conflict`].
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotFound`], [`SecretError::Forbidden`],
    /// [`SecretError::DuplicateVersion`], [`SecretError::Conflict`], or
    /// crypto/store errors.
    pub async fn update(
        &self,
        principal: Uuid,
        secret_id: Uuid,
        new_value: &str,
    ) -> Result<SecretRow, SecretError> {
        let secret = self.fetch(secret_id).await?;
        self.authorize(principal, &secret, Action::Write).await?;

        // Archive before overwrite, never the reverse.
        self.versions.archive_current(&secret).await?;

        let key = self.org_key(secret.org_id).await?;
        let encrypted = cipher::encrypt(&key, new_value.as_bytes())?;
        let now = Utc::now();

        let applied = self
            .store
            .update_secret_value(
                secret.id,
                secret.version,
                &encrypted.blob,
                &encrypted.digest,
                principal,
                now,
            )
            .await?;
        if !applied {
            return Err(SecretError::Conflict { secret_id: secret.id });
        }

        let new_version = secret.version.saturating_add(1);
        info!(secret_id = %secret.id, version = new_version, "secret updated");
        self.audit
            .record(
                secret.org_id,
                principal,
                AuditAction::Updated,
                "secret",
                secret.id,
                json!({ "name": secret.name, "version": new_version }),
            )
            .await;

        Ok(SecretRow {
            encrypted_value: encrypted.blob,
            integrity_digest: encrypted.digest,
            version: new_version,
            updated_by: principal,
            updated_at: now,
            ..secret
        })
    }

    /// Restore a historical version's content as the new live value.
    ///
    /// Requires `write`. The restored content gets a fresh version number
    /// (`current + 1`) — version numbers are a monotonic operation count
    /// and are never reused even though content repeats.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::VersionNotFound`] for an unknown target, plus
    /// everything [`update`](Self::update) can return.
    pub async fn restore(
        &self,
        principal: Uuid,
        secret_id: Uuid,
        target_version: i32,
    ) -> Result<SecretRow, SecretError> {
        let secret = self.fetch(secret_id).await?;
        self.authorize(principal, &secret, Action::Write).await?;

        let target = self.versions.get(secret_id, target_version).await?;
        self.versions.archive_current(&secret).await?;

        let now = Utc::now();
        let applied = self
            .store
            .update_secret_value(
                secret.id,
                secret.version,
                &target.encrypted_value,
                &target.integrity_digest,
                principal,
                now,
            )
            .await?;
        if !applied {
            return Err(SecretError::Conflict { secret_id: secret.id });
        }

        let new_version = secret.version.saturating_add(1);
        info!(
            secret_id = %secret.id,
            version = new_version,
            restored_from = target_version,
            "secret restored"
        );
        self.audit
            .record(
                secret.org_id,
                principal,
                AuditAction::Updated,
                "secret",
                secret.id,
                json!({
                    "name": secret.name,
                    "version": new_version,
                    "restored_from": target_version,
                }),
            )
            .await;

        Ok(SecretRow {
            encrypted_value: target.encrypted_value,
            integrity_digest: target.integrity_digest,
            version: new_version,
            updated_by: principal,
            updated_at: now,
            ..secret
        })
    }

    /// Delete a secret's live row.
    ///
    /// Requires `write`. Archived version rows are kept as orphaned
    /// history for audit purposes.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotFound`], [`SecretError::Forbidden`], or
    /// store errors.
    pub async fn delete(&self, principal: Uuid, secret_id: Uuid) -> Result<(), SecretError> {
        let secret = self.fetch(secret_id).await?;
        self.authorize(principal, &secret, Action::Write).await?;

        let removed = self.store.delete_secret(secret.id).await?;
        if !removed {
            return Err(SecretError::NotFound { secret_id });
        }

        info!(secret_id = %secret.id, "secret deleted");
        self.audit
            .record(
                secret.org_id,
                principal,
                AuditAction::Deleted,
                "secret",
                secret.id,
                json!({ "name": secret.name, "last_version": secret.version }),
            )
            .await;

        Ok(())
    }

    // ── History ──────────────────────────────────────────────────────

    /// List a secret's version history, newest first.
    ///
    /// Requires `read`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotFound`], [`SecretError::Forbidden`], or
    /// store errors.
    pub async fn list_versions(
        &self,
        principal: Uuid,
        secret_id: Uuid,
    ) -> Result<Vec<VersionEntry>, SecretError> {
        let secret = self.fetch(secret_id).await?;
        self.authorize(principal, &secret, Action::Read).await?;
        self.versions.list(secret_id).await
    }

    // ── Sharing ──────────────────────────────────────────────────────

    /// Grant (or replace) a per-secret permission for a principal.
    ///
    /// Requires `share` on the target secret — a write-only grantee cannot
    /// escalate by re-granting.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotFound`], [`SecretError::Forbidden`], or
    /// store errors.
    pub async fn grant(
        &self,
        principal: Uuid,
        secret_id: Uuid,
        grantee: Uuid,
        permission: Permission,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<GrantRow, SecretError> {
        let secret = self.fetch(secret_id).await?;
        self.authorize(principal, &secret, Action::Share).await?;

        let row = GrantRow {
            secret_id: secret.id,
            principal_id: grantee,
            permission,
            granted_by: principal,
            granted_at: Utc::now(),
            expires_at,
        };
        self.store.upsert_grant(&row).await?;

        info!(secret_id = %secret.id, grantee = %grantee, permission = %permission, "grant written");
        self.audit
            .record(
                secret.org_id,
                principal,
                AuditAction::Shared,
                "secret",
                secret.id,
                json!({
                    "grantee": grantee,
                    "permission": permission.to_string(),
                    "expires_at": expires_at,
                }),
            )
            .await;

        Ok(row)
    }

    /// Revoke a per-secret grant. Idempotent.
    ///
    /// Requires `share` on the target secret.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotFound`], [`SecretError::Forbidden`], or
    /// store errors.
    pub async fn revoke(
        &self,
        principal: Uuid,
        secret_id: Uuid,
        grantee: Uuid,
    ) -> Result<(), SecretError> {
        let secret = self.fetch(secret_id).await?;
        self.authorize(principal, &secret, Action::Share).await?;

        let removed = self.store.delete_grant(secret.id, grantee).await?;

        self.audit
            .record(
                secret.org_id,
                principal,
                AuditAction::Revoked,
                "secret",
                secret.id,
                json!({ "grantee": grantee, "removed": removed }),
            )
            .await;

        Ok(())
    }

    // ── Listing & export ─────────────────────────────────────────────

    /// List value-free secret metadata for a project.
    ///
    /// Requires any role in the organization.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Forbidden`] or store errors.
    pub async fn list_secrets(
        &self,
        principal: Uuid,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<SecretMeta>, SecretError> {
        if self.store.org_role(org_id, principal).await?.is_none() {
            return Err(SecretError::Forbidden {
                reason: format!("no membership in org {org_id}"),
            });
        }

        let rows = self.store.list_secrets(project_id).await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.org_id == org_id)
            .map(SecretMeta::from)
            .collect())
    }

    /// Decrypt a batch of secrets for export.
    ///
    /// Each item is read independently; a failure on one secret never
    /// aborts the batch. One `exported` audit event is emitted per batch
    /// with aggregate counts.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Store`] only if the batch-level audit state
    /// cannot be read; per-item errors are reported in the result.
    pub async fn bulk_export(
        &self,
        principal: Uuid,
        org_id: Uuid,
        secret_ids: &[Uuid],
    ) -> Result<BulkExport, SecretError> {
        let mut records = Vec::new();
        let mut failures = Vec::new();

        for &secret_id in secret_ids {
            match self.export_one(principal, org_id, secret_id).await {
                Ok(record) => records.push(record),
                Err(e) => failures.push(BulkExportFailure {
                    secret_id,
                    error: e.to_string(),
                }),
            }
        }

        self.audit
            .record(
                org_id,
                principal,
                AuditAction::Exported,
                "secret_batch",
                org_id,
                json!({
                    "requested": secret_ids.len(),
                    "exported": records.len(),
                    "failed": failures.len(),
                }),
            )
            .await;

        Ok(BulkExport {
            requested: secret_ids.len(),
            exported: records.len(),
            records,
            failures,
        })
    }

    // ── Audit listing ────────────────────────────────────────────────

    /// Page through an organization's audit log, newest first.
    ///
    /// Requires an `owner` or `admin` org role.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Forbidden`] or store errors.
    pub async fn list_audit(
        &self,
        principal: Uuid,
        org_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditRow>, SecretError> {
        let role = self.store.org_role(org_id, principal).await?;
        if !matches!(role, Some(OrgRole::Owner | OrgRole::Admin)) {
            return Err(SecretError::Forbidden {
                reason: format!("audit access denied in org {org_id}"),
            });
        }
        Ok(self.store.list_audit(org_id, limit, offset).await?)
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn fetch(&self, secret_id: Uuid) -> Result<SecretRow, SecretError> {
        self.store
            .get_secret(secret_id)
            .await?
            .ok_or(SecretError::NotFound { secret_id })
    }

    async fn authorize(
        &self,
        principal: Uuid,
        secret: &SecretRow,
        action: Action,
    ) -> Result<(), SecretError> {
        if self.access.can_perform(principal, secret, action).await? {
            Ok(())
        } else {
            Err(SecretError::Forbidden {
                reason: format!("{action} denied on secret {}", secret.id),
            })
        }
    }

    async fn org_key(&self, org_id: Uuid) -> Result<OrgKey, SecretError> {
        let org = self
            .store
            .get_org(org_id)
            .await?
            .ok_or(SecretError::OrgNotFound { org_id })?;
        Ok(derive_org_key(&org.master_key_material, org.id)?)
    }

    /// Authorize, decrypt, and digest-verify one secret without auditing.
    /// [`read`](Self::read) and [`bulk_export`](Self::bulk_export) layer
    /// their own audit events on top.
    async fn open(&self, principal: Uuid, secret_id: Uuid) -> Result<OpenedSecret, SecretError> {
        let secret = self.fetch(secret_id).await?;
        self.authorize(principal, &secret, Action::Read).await?;

        let key = self.org_key(secret.org_id).await?;
        let plaintext = cipher::decrypt(&key, &secret.encrypted_value)?;
        if !cipher::verify(&plaintext, &secret.integrity_digest) {
            return Err(SecretError::Integrity { secret_id: secret.id });
        }

        let value = String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption {
            reason: "plaintext is not valid UTF-8".to_owned(),
        })?;

        Ok(OpenedSecret { secret, value })
    }

    async fn export_one(
        &self,
        principal: Uuid,
        org_id: Uuid,
        secret_id: Uuid,
    ) -> Result<ExportedSecret, SecretError> {
        let opened = self.open(principal, secret_id).await?;
        if opened.secret.org_id != org_id {
            return Err(SecretError::Forbidden {
                reason: format!("secret {secret_id} belongs to a different organization"),
            });
        }

        Ok(ExportedSecret {
            name: opened.secret.name,
            value: opened.value,
            description: opened.secret.description,
            environment: opened.secret.environment,
            created_at: opened.secret.created_at,
            updated_at: opened.secret.updated_at,
        })
    }
}

impl std::fmt::Debug for SecretService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretService").finish_non_exhaustive()
    }
}
