use axum::http::StatusCode;

/// Assignment events are fire-and-forget telemetry upstream; the local
/// service has nowhere to send them, so it just acknowledges receipt.
pub async fn create() -> StatusCode {
    StatusCode::NO_CONTENT
}
