//! Row models for the Keyhaven store.
//!
//! Domain types for organizations, memberships, secrets, version snapshots,
//! per-secret grants, and audit events. All IDs are UUIDs. Secret values are
//! always encrypted — `SecretRow.encrypted_value` holds `nonce || ciphertext`
//! produced by the core cipher, never plaintext.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Organizations & roles ────────────────────────────────────────────

/// An organization (tenant).
///
/// `master_key_material` is the opaque per-tenant key-derivation seed. It
/// never leaves the server boundary and is skipped during serialization.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct OrgRow {
    pub id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub master_key_material: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Organization-level role of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "postgres",
    derive(sqlx::Type),
    sqlx(type_name = "text", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Owner,
    Admin,
    Developer,
    Viewer,
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Admin => write!(f, "admin"),
            Self::Developer => write!(f, "developer"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "developer" => Ok(Self::Developer),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown org role: {other}")),
        }
    }
}

/// An organization membership row.
///
/// Owned by membership management (out of scope for the engine) — the core
/// only ever reads the role through [`SecretStore::org_role`].
///
/// [`SecretStore::org_role`]: crate::SecretStore::org_role
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct MembershipRow {
    pub org_id: Uuid,
    pub principal_id: Uuid,
    pub role: OrgRole,
    pub created_at: DateTime<Utc>,
}

// ── Secrets ──────────────────────────────────────────────────────────

/// Deployment environment a secret belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "postgres",
    derive(sqlx::Type),
    sqlx(type_name = "text", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// The live row of a secret.
///
/// `version` starts at 1 and increases by exactly 1 on every
/// content-changing update or restore; no version number is ever reused
/// across the live row and its archived snapshots.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct SecretRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub encrypted_value: Vec<u8>,
    pub integrity_digest: String,
    pub version: i32,
    pub environment: Environment,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An archived snapshot of a previously-live secret payload.
///
/// Append-only: rows are created exactly once per version transition,
/// immediately before the live row's version advances, and never updated
/// or deleted — deleting the secret leaves its history behind for audit.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct SecretVersionRow {
    pub secret_id: Uuid,
    pub version: i32,
    pub encrypted_value: Vec<u8>,
    pub integrity_digest: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

// ── Grants ───────────────────────────────────────────────────────────

/// Permission level of a per-secret grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "postgres",
    derive(sqlx::Type),
    sqlx(type_name = "text", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown permission: {other}")),
        }
    }
}

/// A per-secret, per-principal permission override.
///
/// At most one row exists per (secret, principal) — granting again replaces
/// the prior level and expiry. A grant whose `expires_at` is in the past is
/// treated as absent without being deleted (lazy expiry).
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct GrantRow {
    pub secret_id: Uuid,
    pub principal_id: Uuid,
    pub permission: Permission,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

// ── Audit ────────────────────────────────────────────────────────────

/// A single immutable audit event.
///
/// One row per sensitive operation, written after the operation's primary
/// effect is durable. Never mutated. `metadata` never contains secret
/// values, only identifiers and counts.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct AuditRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub principal_id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
