use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::error::Result;
use crate::state::AppState;
use crate::wire;

pub async fn v1(
    State(state): State<Arc<AppState>>,
    Path((_app, _version, _build, _visitor)): Path<(String, String, String, String)>,
) -> Result<Json<wire::VisitorConfigV1>> {
    let (schema, overrides) = state.read_merged().await?;
    Ok(Json(wire::visitor_config_v1(&schema, &overrides)))
}

pub async fn v4(
    State(state): State<Arc<AppState>>,
    Path((_app, _version, _build, _visitor)): Path<(String, String, String, String)>,
) -> Result<Json<wire::VisitorConfigV4>> {
    let (schema, overrides) = state.read_merged().await?;
    Ok(Json(wire::visitor_config_v4(&schema, &overrides)))
}
