//! HTTP/WebSocket surface (§6): route table, CORS/body-limit/tracing
//! layers, and the auth extractor every protected handler depends on.

mod extractor;
mod handlers;
mod viewer_ws;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors_origins: Vec<axum::http::HeaderValue> = state
        .config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(cors_origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let max_body = state.config.max_request_bytes;

    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/auth/login", post(handlers::login))
        .route("/sessions", post(handlers::create_session).get(handlers::list_sessions))
        .route(
            "/sessions/:id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/:id/hibernate", post(handlers::hibernate_session))
        .route("/sessions/:id/wake", post(handlers::wake_session))
        .route("/sessions/:id/vnc", get(handlers::session_vnc))
        .route("/agents", get(handlers::list_agents))
        .route("/agents/connect", get(handlers::agent_connect))
        .route("/ws", get(handlers::viewer_events))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(cors)
        .with_state(state)
}
