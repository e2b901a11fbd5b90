//! PostgreSQL store backend.
//!
//! Every query is parameterized via sqlx — no SQL injection risk. The
//! engine's ordering guarantees (archive-before-overwrite, conditional live
//! row update) map onto a unique index on `(secret_id, version)` and a CAS
//! `UPDATE ... WHERE version = $expected`.
//!
//! Feature-gated behind `postgres`. Uses `sqlx` with the Tokio runtime for
//! fully async operations.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AuditRow, GrantRow, OrgRole, OrgRow, SecretRow, SecretVersionRow};
use crate::{SecretStore, StoreError};

/// Schema bootstrap, applied on connect. Idempotent.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS organizations (
    id                  UUID PRIMARY KEY,
    name                TEXT NOT NULL,
    master_key_material BYTEA NOT NULL,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS memberships (
    org_id       UUID NOT NULL REFERENCES organizations(id),
    principal_id UUID NOT NULL,
    role         TEXT NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (org_id, principal_id)
);

CREATE TABLE IF NOT EXISTS secrets (
    id               UUID PRIMARY KEY,
    org_id           UUID NOT NULL REFERENCES organizations(id),
    project_id       UUID NOT NULL,
    folder_id        UUID,
    name             TEXT NOT NULL,
    description      TEXT,
    encrypted_value  BYTEA NOT NULL,
    integrity_digest TEXT NOT NULL,
    version          INTEGER NOT NULL DEFAULT 1,
    environment      TEXT NOT NULL,
    created_by       UUID NOT NULL,
    updated_by       UUID NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at       TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_secrets_project ON secrets (project_id, name);

CREATE TABLE IF NOT EXISTS secret_versions (
    secret_id        UUID NOT NULL,
    version          INTEGER NOT NULL,
    encrypted_value  BYTEA NOT NULL,
    integrity_digest TEXT NOT NULL,
    created_by       UUID NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (secret_id, version)
);

CREATE TABLE IF NOT EXISTS secret_grants (
    secret_id    UUID NOT NULL,
    principal_id UUID NOT NULL,
    permission   TEXT NOT NULL,
    granted_by   UUID NOT NULL,
    granted_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    expires_at   TIMESTAMPTZ,
    PRIMARY KEY (secret_id, principal_id)
);

CREATE TABLE IF NOT EXISTS audit_log (
    id            UUID PRIMARY KEY,
    org_id        UUID NOT NULL,
    principal_id  UUID NOT NULL,
    action        TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    resource_id   UUID NOT NULL,
    metadata      JSONB NOT NULL DEFAULT '{}',
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_audit_org ON audit_log (org_id, created_at DESC);
";

/// A [`SecretStore`] backed by PostgreSQL.
///
/// Thread-safe via `PgPool`. All operations are fully async.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool", &"[PgPool]")
            .finish_non_exhaustive()
    }
}

impl PostgresStore {
    /// Connect to PostgreSQL and apply the schema bootstrap.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the connection or bootstrap
    /// fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection {
                reason: e.to_string(),
            })?;

        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::Connection {
                    reason: format!("schema bootstrap failed: {e}"),
                })?;
        }

        Ok(Self { pool })
    }

    /// Return a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl SecretStore for PostgresStore {
    async fn get_org(&self, org_id: Uuid) -> Result<Option<OrgRow>, StoreError> {
        let org = sqlx::query_as::<_, OrgRow>("SELECT * FROM organizations WHERE id = $1")
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(org)
    }

    async fn org_role(
        &self,
        org_id: Uuid,
        principal_id: Uuid,
    ) -> Result<Option<OrgRole>, StoreError> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM memberships WHERE org_id = $1 AND principal_id = $2",
        )
        .bind(org_id)
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;

        role.map(|r| {
            r.parse::<OrgRole>()
                .map_err(|reason| StoreError::Corrupt { reason })
        })
        .transpose()
    }

    async fn insert_secret(&self, row: &SecretRow) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO secrets
                (id, org_id, project_id, folder_id, name, description,
                 encrypted_value, integrity_digest, version, environment,
                 created_by, updated_by, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(row.id)
        .bind(row.org_id)
        .bind(row.project_id)
        .bind(row.folder_id)
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.encrypted_value)
        .bind(&row.integrity_digest)
        .bind(row.version)
        .bind(row.environment.to_string())
        .bind(row.created_by)
        .bind(row.updated_by)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_secret(&self, secret_id: Uuid) -> Result<Option<SecretRow>, StoreError> {
        let row = sqlx::query_as::<_, SecretRow>("SELECT * FROM secrets WHERE id = $1")
            .bind(secret_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_secrets(&self, project_id: Uuid) -> Result<Vec<SecretRow>, StoreError> {
        let rows = sqlx::query_as::<_, SecretRow>(
            "SELECT * FROM secrets WHERE project_id = $1 ORDER BY name",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
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
        // Compare-and-swap on the observed version: a concurrent update
        // that already advanced the row makes this a no-op.
        let result = sqlx::query(
            r"UPDATE secrets
              SET encrypted_value = $3,
                  integrity_digest = $4,
                  version = version + 1,
                  updated_by = $5,
                  updated_at = $6
              WHERE id = $1 AND version = $2",
        )
        .bind(secret_id)
        .bind(expected_version)
        .bind(encrypted_value)
        .bind(integrity_digest)
        .bind(updated_by)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_secret(&self, secret_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM secrets WHERE id = $1")
            .bind(secret_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_version(&self, row: &SecretVersionRow) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO secret_versions
                (secret_id, version, encrypted_value, integrity_digest, created_by, created_at)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(row.secret_id)
        .bind(row.version)
        .bind(&row.encrypted_value)
        .bind(&row.integrity_digest)
        .bind(row.created_by)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_versions(&self, secret_id: Uuid) -> Result<Vec<SecretVersionRow>, StoreError> {
        let rows = sqlx::query_as::<_, SecretVersionRow>(
            "SELECT * FROM secret_versions WHERE secret_id = $1 ORDER BY version DESC",
        )
        .bind(secret_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_version(
        &self,
        secret_id: Uuid,
        version: i32,
    ) -> Result<Option<SecretVersionRow>, StoreError> {
        let row = sqlx::query_as::<_, SecretVersionRow>(
            "SELECT * FROM secret_versions WHERE secret_id = $1 AND version = $2",
        )
        .bind(secret_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_grant(&self, row: &GrantRow) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO secret_grants
                (secret_id, principal_id, permission, granted_by, granted_at, expires_at)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (secret_id, principal_id) DO UPDATE SET
                permission = EXCLUDED.permission,
                granted_by = EXCLUDED.granted_by,
                granted_at = EXCLUDED.granted_at,
                expires_at = EXCLUDED.expires_at",
        )
        .bind(row.secret_id)
        .bind(row.principal_id)
        .bind(row.permission.to_string())
        .bind(row.granted_by)
        .bind(row.granted_at)
        .bind(row.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_grant(
        &self,
        secret_id: Uuid,
        principal_id: Uuid,
    ) -> Result<Option<GrantRow>, StoreError> {
        let row = sqlx::query_as::<_, GrantRow>(
            "SELECT * FROM secret_grants WHERE secret_id = $1 AND principal_id = $2",
        )
        .bind(secret_id)
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_grant(
        &self,
        secret_id: Uuid,
        principal_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM secret_grants WHERE secret_id = $1 AND principal_id = $2",
        )
        .bind(secret_id)
        .bind(principal_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_audit(&self, row: &AuditRow) -> Result<Uuid, StoreError> {
        sqlx::query(
            r"INSERT INTO audit_log
                (id, org_id, principal_id, action, resource_type, resource_id, metadata, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(row.id)
        .bind(row.org_id)
        .bind(row.principal_id)
        .bind(&row.action)
        .bind(&row.resource_type)
        .bind(row.resource_id)
        .bind(&row.metadata)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        Ok(row.id)
    }

    async fn list_audit(
        &self,
        org_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditRow>, StoreError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r"SELECT * FROM audit_log
              WHERE org_id = $1
              ORDER BY created_at DESC
              LIMIT $2 OFFSET $3",
        )
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
