//! Assignment overrides negotiate on `Content-Type`: a form post carries a
//! single `{split_name, variant}` pair (v1 shape); a JSON post may carry
//! either that single pair or a `{assignments: [...]}` batch (v2 shape).
//! Anything else is an `UnexpectedContentType`.

use std::sync::Arc;

use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, StatusCode};

use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::wire::AssignmentEntry;

pub enum OverridePayload {
    Single(AssignmentEntry),
    Multiple(Vec<AssignmentEntry>),
}

impl OverridePayload {
    fn into_entries(self) -> Vec<AssignmentEntry> {
        match self {
            OverridePayload::Single(entry) => vec![entry],
            OverridePayload::Multiple(entries) => entries,
        }
    }
}

#[axum::async_trait]
impl<S> FromRequest<S> for OverridePayload
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let is_json = content_type.starts_with("application/json");
        let is_form = content_type.starts_with("application/x-www-form-urlencoded");
        if !is_json && !is_form {
            return Err(ServerError::UnexpectedContentType(content_type));
        }

        let bytes = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|e| ServerError::InvalidBody(e.to_string()))?;

        if is_json {
            parse_json(&bytes)
        } else {
            parse_form(&bytes)
        }
    }
}

fn parse_json(bytes: &[u8]) -> Result<OverridePayload> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Multiple { assignments: Vec<AssignmentEntry> },
        Single(AssignmentEntry),
    }
    let shape: Shape = serde_json::from_slice(bytes).map_err(|e| ServerError::InvalidBody(e.to_string()))?;
    Ok(match shape {
        Shape::Multiple { assignments } => OverridePayload::Multiple(assignments),
        Shape::Single(entry) => OverridePayload::Single(entry),
    })
}

fn parse_form(bytes: &[u8]) -> Result<OverridePayload> {
    let entry: AssignmentEntry = serde_urlencoded::from_bytes(bytes).map_err(|e| ServerError::InvalidBody(e.to_string()))?;
    Ok(OverridePayload::Single(entry))
}

async fn apply(state: &AppState, payload: OverridePayload) -> Result<StatusCode> {
    let entries = payload.into_entries();
    state
        .merge_overrides(|overrides| {
            for entry in &entries {
                overrides.assign(entry.split_name.clone(), entry.variant.clone());
            }
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_v1(State(state): State<Arc<AppState>>, payload: OverridePayload) -> Result<StatusCode> {
    apply(&state, payload).await
}

pub async fn create_v2(
    State(state): State<Arc<AppState>>,
    Path(_visitor): Path<String>,
    payload: OverridePayload,
) -> Result<StatusCode> {
    apply(&state, payload).await
}
