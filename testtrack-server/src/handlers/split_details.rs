use axum::extract::Path;
use axum::Json;

use crate::wire;

/// A deliberate stub: no handler state is needed because every id gets
/// the same constant shape back.
pub async fn show(Path(id): Path<String>) -> Json<wire::SplitDetails> {
    Json(wire::split_details_stub(&id))
}
