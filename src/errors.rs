use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

use crate::db::DatabaseTarget;

/// Error body returned on every failed request.
///
/// `details` carries the underlying store error text for operator diagnosis;
/// this is an internal tool, so the raw message is intentionally kept.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    /// Required field missing or referentially invalid (unknown store, bad qty).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Targeted order/line/store does not exist, or an update affected zero rows.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A statement against one of the backing stores failed. The target names
    /// which database the failure hit, since earlier steps of the same
    /// transition may already have committed elsewhere.
    #[error("Persistence error on {target}: {source}")]
    PersistenceError {
        target: String,
        #[source]
        #[serde(skip)]
        source: DbErr,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl ServiceError {
    /// Wraps a database error, tagging the logical database it came from.
    pub fn persistence(target: &DatabaseTarget, source: DbErr) -> Self {
        ServiceError::PersistenceError {
            target: target.to_string(),
            source,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PersistenceError { .. }
            | Self::EventError(_)
            | Self::HashError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::PersistenceError { source, .. } => Some(source.to_string()),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.to_string(),
            details: self.details(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
