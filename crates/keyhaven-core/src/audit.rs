//! Best-effort audit trail.
//!
//! One structured event per sensitive operation, appended to the store's
//! immutable log after the operation's primary effect is durable. Emission
//! is fire-and-forget: a failed write is logged and swallowed, never rolled
//! into the primary operation's result. Metadata carries identifiers and
//! counts only — never secret values.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use keyhaven_store::models::AuditRow;
use keyhaven_store::SecretStore;

/// Kind of sensitive operation being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Created,
    Accessed,
    Updated,
    Deleted,
    Shared,
    Revoked,
    Exported,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Accessed => write!(f, "accessed"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
            Self::Shared => write!(f, "shared"),
            Self::Revoked => write!(f, "revoked"),
            Self::Exported => write!(f, "exported"),
        }
    }
}

/// Fire-and-forget recorder over the store's append-only log.
pub struct AuditSink {
    store: Arc<dyn SecretStore>,
}

impl AuditSink {
    /// Create a sink over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Record one event. Failures are logged and swallowed.
    pub async fn record(
        &self,
        org_id: Uuid,
        principal_id: Uuid,
        action: AuditAction,
        resource_type: &str,
        resource_id: Uuid,
        metadata: serde_json::Value,
    ) {
        let row = AuditRow {
            id: Uuid::new_v4(),
            org_id,
            principal_id,
            action: action.to_string(),
            resource_type: resource_type.to_owned(),
            resource_id,
            metadata,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.append_audit(&row).await {
            warn!(
                %org_id,
                %resource_id,
                action = %action,
                error = %e,
                "audit write failed"
            );
        }
    }
}

impl std::fmt::Debug for AuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSink").finish_non_exhaustive()
    }
}
