//! The local service never exposes typed errors over the wire: every
//! handler failure becomes a logged `tracing::error!` and a flat 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] testtrack_core::TestTrackError),

    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        let body = Json(serde_json::json!({ "error": "internal server error" }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
