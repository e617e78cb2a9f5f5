use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::error::Result;
use crate::state::AppState;
use crate::wire;

pub async fn by_id_v1(State(state): State<Arc<AppState>>, Path(_id): Path<String>) -> Result<Json<wire::VisitorV1>> {
    let (_schema, overrides) = state.read_merged().await?;
    Ok(Json(wire::visitor_v1(&overrides)))
}

/// Looking a visitor up by identifier is answered identically to looking
/// it up by visitor id: the local service only ever knows one visitor.
pub async fn by_identifier(
    State(state): State<Arc<AppState>>,
    Path((_identifier_type, _identifier)): Path<(String, String)>,
) -> Result<Json<wire::VisitorV1>> {
    let (_schema, overrides) = state.read_merged().await?;
    Ok(Json(wire::visitor_v1(&overrides)))
}

pub async fn detail_by_identifier(
    State(state): State<Arc<AppState>>,
    Path((_identifier_type, _identifier)): Path<(String, String)>,
) -> Result<Json<wire::VisitorDetail>> {
    let (schema, overrides) = state.read_merged().await?;
    Ok(Json(wire::visitor_detail(&schema, &overrides)))
}
