use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::error::Result;
use crate::state::AppState;
use crate::wire;

pub async fn v1(State(state): State<Arc<AppState>>) -> Result<Json<BTreeMap<String, BTreeMap<String, u32>>>> {
    let (schema, _) = state.read_merged().await?;
    Ok(Json(wire::split_registry_v1(&schema)))
}

pub async fn v2(State(state): State<Arc<AppState>>) -> Result<Json<wire::SplitRegistryV2>> {
    let (schema, _) = state.read_merged().await?;
    Ok(Json(wire::split_registry_v2(&schema)))
}

/// v3 adds a `/builds/{b}` path segment but is semantically v2 — the
/// build id is accepted and ignored.
pub async fn v3(State(state): State<Arc<AppState>>, Path(_build): Path<String>) -> Result<Json<wire::SplitRegistryV2>> {
    v2(State(state)).await
}

pub async fn v4(State(state): State<Arc<AppState>>, Path(_build): Path<String>) -> Result<Json<wire::SplitRegistryV4>> {
    let (schema, _) = state.read_merged().await?;
    Ok(Json(wire::split_registry_v4(&schema)))
}
