//! Principal extraction.
//!
//! The engine trusts an upstream gateway to authenticate callers; the
//! gateway forwards the authenticated principal's UUID in the
//! `x-keyhaven-principal` header. Authorization (roles and grants) is
//! enforced by the engine on every operation, so a forged header without
//! matching membership or grants gets nothing.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated principal's UUID.
pub const PRINCIPAL_HEADER: &str = "x-keyhaven-principal";

/// The authenticated principal, extracted from the request headers.
#[derive(Debug, Clone, Copy)]
pub struct Principal(pub Uuid);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(PRINCIPAL_HEADER).ok_or_else(|| {
            ApiError::Unauthorized(format!("missing {PRINCIPAL_HEADER} header"))
        })?;
        let text = value.to_str().map_err(|_| {
            ApiError::Unauthorized(format!("{PRINCIPAL_HEADER} header is not valid UTF-8"))
        })?;
        let id = text.parse::<Uuid>().map_err(|_| {
            ApiError::Unauthorized(format!("{PRINCIPAL_HEADER} header is not a UUID"))
        })?;
        Ok(Self(id))
    }
}
