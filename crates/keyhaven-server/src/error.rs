//! HTTP error mapping.
//!
//! Maps engine errors into HTTP responses. Every error variant produces a
//! JSON body with a machine-readable `error` field and a human-readable
//! `message`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use keyhaven_core::SecretError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The principal header is missing or malformed.
    Unauthorized(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// Access evaluation denied the operation.
    Forbidden(String),
    /// Requested resource not found.
    NotFound(String),
    /// Concurrent update or duplicate version.
    Conflict(String),
    /// Stored payload failed integrity verification.
    Integrity(String),
    /// Internal server error.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Integrity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "integrity_failure", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<SecretError> for ApiError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::Forbidden { .. } => Self::Forbidden(err.to_string()),
            SecretError::NotFound { .. }
            | SecretError::OrgNotFound { .. }
            | SecretError::VersionNotFound { .. } => Self::NotFound(err.to_string()),
            SecretError::Conflict { .. } | SecretError::DuplicateVersion { .. } => {
                Self::Conflict(err.to_string())
            }
            SecretError::Integrity { .. } => Self::Integrity(err.to_string()),
            SecretError::Crypto(_) | SecretError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn conflict_maps_to_409() {
        let err = ApiError::from(SecretError::Conflict {
            secret_id: Uuid::new_v4(),
        });
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn integrity_maps_to_422() {
        let err = ApiError::from(SecretError::Integrity {
            secret_id: Uuid::new_v4(),
        });
        assert!(matches!(err, ApiError::Integrity(_)));
    }

    #[test]
    fn missing_version_maps_to_404() {
        let err = ApiError::from(SecretError::VersionNotFound {
            secret_id: Uuid::new_v4(),
            version: 3,
        });
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
