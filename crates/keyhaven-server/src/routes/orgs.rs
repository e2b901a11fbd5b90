//! Organization-scoped routes: `/v1/orgs/*`
//!
//! Project secret listings, bulk export, and the audit log.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keyhaven_core::{render, BulkExportFailure, ExportFormat, SecretMeta};
use keyhaven_store::models::AuditRow;

use crate::error::ApiError;
use crate::principal::Principal;
use crate::state::AppState;

/// Build the `/v1/orgs` router.
///
/// Paths:
/// - `GET  /v1/orgs/{org_id}/projects/{project_id}/secrets` — list metadata
/// - `POST /v1/orgs/{org_id}/export` — bulk export decrypted values
/// - `GET  /v1/orgs/{org_id}/audit` — page through the audit log
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{org_id}/projects/{project_id}/secrets", get(list_secrets))
        .route("/{org_id}/export", axum::routing::post(export_secrets))
        .route("/{org_id}/audit", get(list_audit))
}

// ── Request / response types ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SecretListResponse {
    pub secrets: Vec<SecretMeta>,
}

#[derive(Debug, Deserialize)]
pub struct ExportBody {
    pub secret_ids: Vec<Uuid>,
    /// `json`, `csv`, or `dotenv`.
    pub format: String,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    /// The decrypted records rendered in the requested format.
    pub rendered: String,
    pub requested: usize,
    pub exported: usize,
    pub failures: Vec<BulkExportFailure>,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditListResponse {
    pub events: Vec<AuditRow>,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn list_secrets(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path((org_id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SecretListResponse>, ApiError> {
    let secrets = state
        .service
        .list_secrets(principal, org_id, project_id)
        .await?;
    Ok(Json(SecretListResponse { secrets }))
}

async fn export_secrets(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path(org_id): Path<Uuid>,
    Json(body): Json<ExportBody>,
) -> Result<Json<ExportResponse>, ApiError> {
    let format: ExportFormat = body
        .format
        .parse()
        .map_err(ApiError::BadRequest)?;

    let export = state
        .service
        .bulk_export(principal, org_id, &body.secret_ids)
        .await?;

    Ok(Json(ExportResponse {
        rendered: render(format, &export.records),
        requested: export.requested,
        exported: export.exported,
        failures: export.failures,
    }))
}

const DEFAULT_AUDIT_PAGE: i64 = 50;
const MAX_AUDIT_PAGE: i64 = 500;

async fn list_audit(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path(org_id): Path<Uuid>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditListResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_PAGE)
        .clamp(1, MAX_AUDIT_PAGE);
    let offset = query.offset.unwrap_or(0).max(0);

    let events = state
        .service
        .list_audit(principal, org_id, limit, offset)
        .await?;
    Ok(Json(AuditListResponse { events }))
}
