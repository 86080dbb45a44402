//! Route handlers (§6). Each one is a thin translation layer: parse path
//! and body, call into the Lifecycle Manager / Store, map the result to a
//! DTO or an [`ApiError`].

use super::extractor::AuthContext;
use crate::auth::{issue_token, verify_password};
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use streamspace_core::{AgentId, Clock, SessionId};
use streamspace_wire::api::{
    AgentDto, CreateSessionRequest, CreateSessionResponse, ErrorResponse, HealthResponse,
    LoginRequest, LoginResponse, SessionDto,
};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    crate::metrics::render(state.store.as_ref(), &state.registry, &state.vnc)
        .await
        .map_err(ApiError::from)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .store
        .get_user_by_username_unscoped(&req.username)
        .await
        .map_err(|_| ApiError::Unauthenticated)?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::Unauthenticated);
    }

    let token = issue_token(
        &state.config.jwt_secret,
        &user.id,
        &user.organization_id,
        user.role,
        state.clock.now(),
    )?;
    Ok(Json(LoginResponse { token }))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let session = state.lifecycle.create_session(&auth, req).await?;
    Ok(Json(CreateSessionResponse {
        session_id: session.id,
        observed_state: session.observed_state,
    }))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<Vec<SessionDto>>, ApiError> {
    let sessions = state.lifecycle.list_sessions(&auth).await?;
    Ok(Json(sessions.iter().map(SessionDto::from).collect()))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDto>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let session = state.lifecycle.get_session(&auth, &session_id).await?;
    Ok(Json(SessionDto::from(&session)))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDto>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let session = state.lifecycle.delete_session(&auth, &session_id).await?;
    Ok(Json(SessionDto::from(&session)))
}

pub async fn hibernate_session(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDto>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let session = state.lifecycle.hibernate_session(&auth, &session_id).await?;
    Ok(Json(SessionDto::from(&session)))
}

pub async fn wake_session(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDto>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let session = state.lifecycle.wake_session(&auth, &session_id).await?;
    Ok(Json(SessionDto::from(&session)))
}

pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<Vec<AgentDto>>, ApiError> {
    auth.require_admin()?;
    let agents = state
        .store
        .list_all_agents(&auth.scope())
        .await
        .map_err(ApiError::from)?;
    Ok(Json(agents.iter().map(AgentDto::from).collect()))
}

pub async fn agent_connect(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let ctx = state.channel_context();
    ws.on_upgrade(move |socket| crate::channel::run_channel(socket, ctx))
}

pub async fn session_vnc(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let session = state.lifecycle.get_session(&auth, &session_id).await?;
    let agent_id: AgentId = session.agent_id;
    let vnc = state.vnc.clone();
    let registry = state.registry.clone();
    let timeout = state.config.command_ack_timeout;
    let keepalive = state.config.vnc_stream_keepalive;

    Ok(ws.on_upgrade(move |socket| async move {
        super::viewer_ws::run_vnc_viewer(socket, vnc, registry, agent_id, session_id, timeout, keepalive).await;
    }))
}

pub async fn viewer_events(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let events = state.events.clone();
    let user_id = auth.user_id.clone();
    let organization_id = auth.organization_id.clone();
    let is_admin = auth.role.is_admin();
    let keepalive = state.config.vnc_stream_keepalive;
    ws.on_upgrade(move |socket| async move {
        super::viewer_ws::run_event_viewer(socket, events, user_id, organization_id, is_admin, keepalive).await;
    })
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(raw).map_err(|_| ApiError::Validation("malformed session id".into()))
}

pub async fn not_found() -> impl IntoResponse {
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "no such route".into(),
            code: streamspace_core::ErrorKind::NotFound,
        }),
    )
}

