use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

/// Failure taxonomy for the upload/query operations.
///
/// - `Validation`: the request itself is bad (unsupported extension, missing
///   required columns). Nothing is written.
/// - `Decode`: the file bytes could not be structurally decoded.
/// - `Store`: the object store backend failed; surfaced as unavailable and
///   not retried here.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("failed to decode file: {0}")]
    Decode(String),
    #[error("object store unavailable: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Validation(_) | ServiceError::Decode(_) => StatusCode::BAD_REQUEST,
            ServiceError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
