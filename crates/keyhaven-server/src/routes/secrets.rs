//! Secret routes: `/v1/secrets/*`
//!
//! CRUD, restore, version history, and grant management for individual
//! secrets. Responses never carry ciphertext; plaintext values appear only
//! in read responses.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keyhaven_core::{CreateSecret, VersionEntry};
use keyhaven_store::models::{Environment, Permission, SecretRow};

use crate::error::ApiError;
use crate::principal::Principal;
use crate::state::AppState;

/// Build the `/v1/secrets` router.
///
/// Paths:
/// - `POST   /v1/secrets` — create
/// - `GET    /v1/secrets/{id}` — read (decrypted value)
/// - `PUT    /v1/secrets/{id}` — update value
/// - `DELETE /v1/secrets/{id}` — delete
/// - `GET    /v1/secrets/{id}/versions` — version history
/// - `POST   /v1/secrets/{id}/restore` — restore a historical version
/// - `PUT    /v1/secrets/{id}/grants` — grant or replace a permission
/// - `DELETE /v1/secrets/{id}/grants/{principal_id}` — revoke
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", axum::routing::post(create_secret))
        .route(
            "/{id}",
            get(read_secret).put(update_secret).delete(delete_secret),
        )
        .route("/{id}/versions", get(list_versions))
        .route("/{id}/restore", axum::routing::post(restore_secret))
        .route("/{id}/grants", put(grant_access))
        .route("/{id}/grants/{principal_id}", axum::routing::delete(revoke_access))
}

// ── Request / response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSecretBody {
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub value: String,
    pub environment: Environment,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSecretBody {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct RestoreBody {
    pub version: i32,
}

#[derive(Debug, Deserialize)]
pub struct GrantBody {
    pub principal_id: Uuid,
    pub permission: Permission,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Value-free view of a secret row.
#[derive(Debug, Serialize)]
pub struct SecretResponse {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub version: i32,
    pub environment: Environment,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SecretRow> for SecretResponse {
    fn from(row: SecretRow) -> Self {
        Self {
            id: row.id,
            org_id: row.org_id,
            project_id: row.project_id,
            folder_id: row.folder_id,
            name: row.name,
            description: row.description,
            version: row.version,
            environment: row.environment,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SecretValueResponse {
    #[serde(flatten)]
    pub secret: SecretResponse,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct VersionListResponse {
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub secret_id: Uuid,
    pub principal_id: Uuid,
    pub permission: Permission,
    pub expires_at: Option<DateTime<Utc>>,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn create_secret(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Json(body): Json<CreateSecretBody>,
) -> Result<(StatusCode, Json<SecretResponse>), ApiError> {
    if body.name.is_empty() {
        return Err(ApiError::BadRequest("secret name must not be empty".to_owned()));
    }

    let row = state
        .service
        .create(
            principal,
            CreateSecret {
                org_id: body.org_id,
                project_id: body.project_id,
                folder_id: body.folder_id,
                name: body.name,
                description: body.description,
                value: body.value,
                environment: body.environment,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

async fn read_secret(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<SecretValueResponse>, ApiError> {
    let opened = state.service.read(principal, id).await?;
    Ok(Json(SecretValueResponse {
        secret: opened.secret.into(),
        value: opened.value,
    }))
}

async fn update_secret(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateSecretBody>,
) -> Result<Json<SecretResponse>, ApiError> {
    let row = state.service.update(principal, id, &body.value).await?;
    Ok(Json(row.into()))
}

async fn delete_secret(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_versions(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<VersionListResponse>, ApiError> {
    let versions = state.service.list_versions(principal, id).await?;
    Ok(Json(VersionListResponse { versions }))
}

async fn restore_secret(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path(id): Path<Uuid>,
    Json(body): Json<RestoreBody>,
) -> Result<Json<SecretResponse>, ApiError> {
    let row = state.service.restore(principal, id, body.version).await?;
    Ok(Json(row.into()))
}

async fn grant_access(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path(id): Path<Uuid>,
    Json(body): Json<GrantBody>,
) -> Result<Json<GrantResponse>, ApiError> {
    let grant = state
        .service
        .grant(principal, id, body.principal_id, body.permission, body.expires_at)
        .await?;
    Ok(Json(GrantResponse {
        secret_id: grant.secret_id,
        principal_id: grant.principal_id,
        permission: grant.permission,
        expires_at: grant.expires_at,
    }))
}

async fn revoke_access(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path((id, grantee)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state.service.revoke(principal, id, grantee).await?;
    Ok(StatusCode::NO_CONTENT)
}
