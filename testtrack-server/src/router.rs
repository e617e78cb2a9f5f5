use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::cors;
use crate::handlers;
use crate::state::AppState;

pub fn build(state: Arc<AppState>) -> Router {
    let allowed_origins = state.config.allowed_origins.clone();

    Router::new()
        .route("/api/v1/split_registry", get(handlers::split_registry::v1))
        .route("/api/v2/split_registry", get(handlers::split_registry::v2))
        .route("/api/v3/builds/:build/split_registry", get(handlers::split_registry::v3))
        .route("/api/v4/builds/:build/split_registry", get(handlers::split_registry::v4))
        .route("/api/v1/visitors/:id", get(handlers::visitor::by_id_v1))
        .route(
            "/api/v1/identifier_types/:identifier_type/identifiers/:identifier/visitor",
            get(handlers::visitor::by_identifier),
        )
        .route(
            "/api/v1/identifier_types/:identifier_type/identifiers/:identifier/visitor_detail",
            get(handlers::visitor::detail_by_identifier),
        )
        .route(
            "/api/v1/apps/:app/versions/:version/builds/:build/visitors/:visitor/config",
            get(handlers::config_endpoint::v1),
        )
        .route(
            "/api/v4/apps/:app/versions/:version/builds/:build/visitors/:visitor/config",
            get(handlers::config_endpoint::v4),
        )
        .route("/api/v1/split_details/:id", get(handlers::split_details::show))
        .route("/api/v1/assignment_event", post(handlers::assignment_event::create))
        .route("/api/v1/identifier", post(handlers::identifier::create_v1))
        .route(
            "/api/v4/apps/:app/versions/:version/builds/:build/identifier",
            post(handlers::identifier::create_v4),
        )
        .route("/api/v1/assignment_override", post(handlers::assignment_override::create_v1))
        .route(
            "/api/v2/visitors/:visitor/assignment_overrides",
            post(handlers::assignment_override::create_v2),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors::layer(allowed_origins))
        .with_state(state)
}
