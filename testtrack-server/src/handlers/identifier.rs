use axum::extract::Path;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::wire::SENTINEL_VISITOR_ID;

/// Registering an identifier always resolves to the one sentinel visitor
/// the local service knows about.
pub async fn create_v1() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::CREATED, Json(json!({ "id": SENTINEL_VISITOR_ID })))
}

pub async fn create_v4(Path((_app, _version, _build)): Path<(String, String, String)>) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::CREATED, Json(json!({ "id": SENTINEL_VISITOR_ID })))
}
