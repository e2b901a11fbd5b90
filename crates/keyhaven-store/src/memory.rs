//! In-memory store backend for testing.
//!
//! All rows live in maps behind a single `RwLock`. Nothing is persistent —
//! data is lost when the process exits. Use this for unit and integration
//! tests where a real store is needed without touching a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    AuditRow, GrantRow, MembershipRow, OrgRole, OrgRow, SecretRow, SecretVersionRow,
};
use crate::{SecretStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    orgs: HashMap<Uuid, OrgRow>,
    memberships: HashMap<(Uuid, Uuid), MembershipRow>,
    secrets: HashMap<Uuid, SecretRow>,
    // BTreeMap keyed by (secret, version) keeps snapshots ordered per secret.
    versions: BTreeMap<(Uuid, i32), SecretVersionRow>,
    grants: HashMap<(Uuid, Uuid), GrantRow>,
    audit: Vec<AuditRow>,
}

/// An in-memory [`SecretStore`] backed by plain maps.
///
/// Thread-safe and async-compatible. `Clone` shares state, so a test can
/// hand the same store to the engine and inspect rows afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an organization row.
    ///
    /// Organizations are created by out-of-scope tenant provisioning, so
    /// this is an inherent method rather than part of [`SecretStore`].
    pub async fn insert_org(&self, row: OrgRow) {
        self.inner.write().await.orgs.insert(row.id, row);
    }

    /// Seed or replace an organization membership.
    pub async fn upsert_membership(&self, row: MembershipRow) {
        self.inner
            .write()
            .await
            .memberships
            .insert((row.org_id, row.principal_id), row);
    }

    /// Number of audit events recorded so far.
    pub async fn audit_len(&self) -> usize {
        self.inner.read().await.audit.len()
    }
}

#[async_trait::async_trait]
impl SecretStore for MemoryStore {
    async fn get_org(&self, org_id: Uuid) -> Result<Option<OrgRow>, StoreError> {
        Ok(self.inner.read().await.orgs.get(&org_id).cloned())
    }

    async fn org_role(
        &self,
        org_id: Uuid,
        principal_id: Uuid,
    ) -> Result<Option<OrgRole>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .memberships
            .get(&(org_id, principal_id))
            .map(|m| m.role))
    }

    async fn insert_secret(&self, row: &SecretRow) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.secrets.contains_key(&row.id) {
            return Err(StoreError::Duplicate {
                entity: "secret".to_owned(),
            });
        }
        inner.secrets.insert(row.id, row.clone());
        Ok(())
    }

    async fn get_secret(&self, secret_id: Uuid) -> Result<Option<SecretRow>, StoreError> {
        Ok(self.inner.read().await.secrets.get(&secret_id).cloned())
    }

    async fn list_secrets(&self, project_id: Uuid) -> Result<Vec<SecretRow>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<SecretRow> = inner
            .secrets
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_secret_value(
        &self,
        secret_id: Uuid,
        expected_version: i32,
        encrypted_value: &[u8],
        integrity_digest: &str,
        updated_by: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.secrets.get_mut(&secret_id) {
            Some(row) if row.version == expected_version => {
                row.encrypted_value = encrypted_value.to_vec();
                row.integrity_digest = integrity_digest.to_owned();
                row.version = expected_version.saturating_add(1);
                row.updated_by = updated_by;
                row.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_secret(&self, secret_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.secrets.remove(&secret_id).is_some())
    }

    async fn insert_version(&self, row: &SecretVersionRow) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = (row.secret_id, row.version);
        if inner.versions.contains_key(&key) {
            return Err(StoreError::Duplicate {
                entity: "secret version".to_owned(),
            });
        }
        inner.versions.insert(key, row.clone());
        Ok(())
    }

    async fn list_versions(&self, secret_id: Uuid) -> Result<Vec<SecretVersionRow>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<SecretVersionRow> = inner
            .versions
            .range((secret_id, i32::MIN)..=(secret_id, i32::MAX))
            .map(|(_, v)| v.clone())
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn get_version(
        &self,
        secret_id: Uuid,
        version: i32,
    ) -> Result<Option<SecretVersionRow>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .versions
            .get(&(secret_id, version))
            .cloned())
    }

    async fn upsert_grant(&self, row: &GrantRow) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .grants
            .insert((row.secret_id, row.principal_id), row.clone());
        Ok(())
    }

    async fn get_grant(
        &self,
        secret_id: Uuid,
        principal_id: Uuid,
    ) -> Result<Option<GrantRow>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .grants
            .get(&(secret_id, principal_id))
            .cloned())
    }

    async fn delete_grant(
        &self,
        secret_id: Uuid,
        principal_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .write()
            .await
            .grants
            .remove(&(secret_id, principal_id))
            .is_some())
    }

    async fn append_audit(&self, row: &AuditRow) -> Result<Uuid, StoreError> {
        self.inner.write().await.audit.push(row.clone());
        Ok(row.id)
    }

    async fn list_audit(
        &self,
        org_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditRow>, StoreError> {
        let inner = self.inner.read().await;
        let rows = inner
            .audit
            .iter()
            .rev()
            .filter(|e| e.org_id == org_id)
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(rows)
    }
}
