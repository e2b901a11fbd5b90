//! Composite access evaluation.
//!
//! Whether a principal may act on a secret is decided by combining the
//! organization-level role with the per-secret grant, in this order (first
//! match wins):
//!
//! 1. `owner`/`admin` org role → any action.
//! 2. `developer` → `read`/`write`; never `admin`/`share`.
//! 3. `viewer` → `read` only.
//! 4. No sufficient role → an unexpired grant whose level dominates the
//!    action (`admin` ⊇ `write` ⊇ `read`; `share` requires `admin`).
//! 5. Otherwise deny.
//!
//! A grant with a past expiry is treated as absent without being deleted
//! (lazy expiry). Granting and revoking are themselves `share` actions, so
//! a write-only grantee can never escalate by re-granting.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keyhaven_store::models::{GrantRow, OrgRole, Permission, SecretRow};
use keyhaven_store::{SecretStore, StoreError};

/// An action a principal can attempt on a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Admin,
    Share,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Admin => write!(f, "admin"),
            Self::Share => write!(f, "share"),
        }
    }
}

impl Action {
    /// Whether a grant at `level` dominates this action.
    #[must_use]
    pub fn satisfied_by(self, level: Permission) -> bool {
        match level {
            Permission::Admin => true,
            Permission::Write => matches!(self, Self::Read | Self::Write),
            Permission::Read => matches!(self, Self::Read),
        }
    }
}

/// Whether an organization role alone permits an action.
#[must_use]
pub fn role_permits(role: OrgRole, action: Action) -> bool {
    match role {
        OrgRole::Owner | OrgRole::Admin => true,
        OrgRole::Developer => matches!(action, Action::Read | Action::Write),
        OrgRole::Viewer => matches!(action, Action::Read),
    }
}

/// Whether a grant is active at `now`. Expiry must be strictly in the
/// future; a grant with no expiry never expires.
#[must_use]
pub fn grant_active(grant: &GrantRow, now: DateTime<Utc>) -> bool {
    grant.expires_at.is_none_or(|expiry| expiry > now)
}

/// Store-backed access evaluator.
pub struct AccessEvaluator {
    store: Arc<dyn SecretStore>,
}

impl AccessEvaluator {
    /// Create an evaluator over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Decide whether `principal` may perform `action` on `secret`.
    ///
    /// The grant lookup only happens when the org role is absent or
    /// insufficient.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a role or grant lookup fails.
    pub async fn can_perform(
        &self,
        principal: Uuid,
        secret: &SecretRow,
        action: Action,
    ) -> Result<bool, StoreError> {
        if let Some(role) = self.store.org_role(secret.org_id, principal).await? {
            if role_permits(role, action) {
                return Ok(true);
            }
        }

        let grant = self.store.get_grant(secret.id, principal).await?;
        Ok(grant
            .is_some_and(|g| grant_active(&g, Utc::now()) && action.satisfied_by(g.permission)))
    }
}

impl std::fmt::Debug for AccessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessEvaluator").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use keyhaven_store::models::{Environment, MembershipRow};
    use keyhaven_store::MemoryStore;

    fn grant(permission: Permission, expires_at: Option<DateTime<Utc>>) -> GrantRow {
        GrantRow {
            secret_id: Uuid::new_v4(),
            principal_id: Uuid::new_v4(),
            permission,
            granted_by: Uuid::new_v4(),
            granted_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn owner_and_admin_permit_everything() {
        for role in [OrgRole::Owner, OrgRole::Admin] {
            for action in [Action::Read, Action::Write, Action::Admin, Action::Share] {
                assert!(role_permits(role, action));
            }
        }
    }

    #[test]
    fn developer_gets_read_write_only() {
        assert!(role_permits(OrgRole::Developer, Action::Read));
        assert!(role_permits(OrgRole::Developer, Action::Write));
        assert!(!role_permits(OrgRole::Developer, Action::Admin));
        assert!(!role_permits(OrgRole::Developer, Action::Share));
    }

    #[test]
    fn viewer_gets_read_only() {
        assert!(role_permits(OrgRole::Viewer, Action::Read));
        assert!(!role_permits(OrgRole::Viewer, Action::Write));
        assert!(!role_permits(OrgRole::Viewer, Action::Share));
    }

    #[test]
    fn permission_dominance() {
        assert!(Action::Read.satisfied_by(Permission::Read));
        assert!(!Action::Write.satisfied_by(Permission::Read));
        assert!(Action::Read.satisfied_by(Permission::Write));
        assert!(Action::Write.satisfied_by(Permission::Write));
        assert!(!Action::Share.satisfied_by(Permission::Write));
        assert!(Action::Share.satisfied_by(Permission::Admin));
        assert!(Action::Admin.satisfied_by(Permission::Admin));
    }

    #[test]
    fn expiry_is_strict_and_lazy() {
        let now = Utc::now();
        assert!(grant_active(&grant(Permission::Read, None), now));
        assert!(grant_active(
            &grant(Permission::Read, Some(now + Duration::hours(1))),
            now
        ));
        assert!(!grant_active(
            &grant(Permission::Read, Some(now - Duration::seconds(1))),
            now
        ));
        // Expiry exactly at evaluation time is not "strictly in the future".
        assert!(!grant_active(&grant(Permission::Read, Some(now)), now));
    }

    fn secret_in(org_id: Uuid) -> SecretRow {
        let now = Utc::now();
        SecretRow {
            id: Uuid::new_v4(),
            org_id,
            project_id: Uuid::new_v4(),
            folder_id: None,
            name: "API_KEY".to_owned(),
            description: None,
            encrypted_value: vec![0; 28],
            integrity_digest: String::new(),
            version: 1,
            environment: Environment::Production,
            created_by: Uuid::new_v4(),
            updated_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn no_role_no_grant_denies_everything() {
        let store = MemoryStore::new();
        let evaluator = AccessEvaluator::new(Arc::new(store));
        let secret = secret_in(Uuid::new_v4());
        let stranger = Uuid::new_v4();

        for action in [Action::Read, Action::Write, Action::Admin, Action::Share] {
            assert!(!evaluator.can_perform(stranger, &secret, action).await.unwrap());
        }
    }

    #[tokio::test]
    async fn role_in_a_different_org_does_not_carry_over() {
        let store = MemoryStore::new();
        let principal = Uuid::new_v4();
        let other_org = Uuid::new_v4();
        store
            .upsert_membership(MembershipRow {
                org_id: other_org,
                principal_id: principal,
                role: OrgRole::Owner,
                created_at: Utc::now(),
            })
            .await;

        let evaluator = AccessEvaluator::new(Arc::new(store));
        let secret = secret_in(Uuid::new_v4());
        assert!(!evaluator
            .can_perform(principal, &secret, Action::Read)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn expired_admin_grant_denies_read() {
        let store = MemoryStore::new();
        let principal = Uuid::new_v4();
        let secret = secret_in(Uuid::new_v4());
        store
            .upsert_grant(&GrantRow {
                secret_id: secret.id,
                principal_id: principal,
                permission: Permission::Admin,
                granted_by: Uuid::new_v4(),
                granted_at: Utc::now() - Duration::days(2),
                expires_at: Some(Utc::now() - Duration::days(1)),
            })
            .await
            .unwrap();

        let evaluator = AccessEvaluator::new(Arc::new(store));
        assert!(!evaluator
            .can_perform(principal, &secret, Action::Read)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unexpired_grant_dominates() {
        let store = MemoryStore::new();
        let principal = Uuid::new_v4();
        let secret = secret_in(Uuid::new_v4());
        store
            .upsert_grant(&GrantRow {
                secret_id: secret.id,
                principal_id: principal,
                permission: Permission::Write,
                granted_by: Uuid::new_v4(),
                granted_at: Utc::now(),
                expires_at: Some(Utc::now() + Duration::hours(1)),
            })
            .await
            .unwrap();

        let evaluator = AccessEvaluator::new(Arc::new(store));
        assert!(evaluator
            .can_perform(principal, &secret, Action::Read)
            .await
            .unwrap());
        assert!(evaluator
            .can_perform(principal, &secret, Action::Write)
            .await
            .unwrap());
        assert!(!evaluator
            .can_perform(principal, &secret, Action::Share)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn insufficient_role_falls_through_to_grant() {
        let store = MemoryStore::new();
        let principal = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let secret = secret_in(org_id);
        store
            .upsert_membership(MembershipRow {
                org_id,
                principal_id: principal,
                role: OrgRole::Viewer,
                created_at: Utc::now(),
            })
            .await;
        store
            .upsert_grant(&GrantRow {
                secret_id: secret.id,
                principal_id: principal,
                permission: Permission::Admin,
                granted_by: Uuid::new_v4(),
                granted_at: Utc::now(),
                expires_at: None,
            })
            .await
            .unwrap();

        let evaluator = AccessEvaluator::new(Arc::new(store));
        // Viewer role alone denies share, but the admin grant permits it.
        assert!(evaluator
            .can_perform(principal, &secret, Action::Share)
            .await
            .unwrap());
    }
}
