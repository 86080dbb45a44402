//! Request/response DTOs for the HTTP/JSON API (§6). Kept separate from
//! the domain types in `streamspace-core` so an internal field rename
//! never silently changes the wire contract.

use serde::{Deserialize, Serialize};
use streamspace_core::{AgentId, ObservedState, Role, SessionId};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub mfa: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub template: String,
    pub resources: Option<ResourceRequestDto>,
    pub persistent_home: Option<bool>,
    pub idle_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ResourceRequestDto {
    pub cpu_millicores: u32,
    pub memory_mib: u32,
    pub storage_mib: u32,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub observed_state: ObservedState,
}

#[derive(Debug, Serialize)]
pub struct StreamingEndpointDto {
    pub protocol: streamspace_core::StreamingProtocol,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub session_id: SessionId,
    pub template: String,
    pub agent_id: AgentId,
    pub desired_state: streamspace_core::DesiredState,
    pub observed_state: ObservedState,
    pub resources: ResourceRequestDto,
    pub streaming_endpoint: Option<StreamingEndpointDto>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&streamspace_core::Session> for SessionDto {
    fn from(session: &streamspace_core::Session) -> Self {
        Self {
            session_id: session.id.clone(),
            template: session.template_reference.clone(),
            agent_id: session.agent_id.clone(),
            desired_state: session.desired_state,
            observed_state: session.observed_state,
            resources: ResourceRequestDto {
                cpu_millicores: session.resources.cpu_millicores,
                memory_mib: session.resources.memory_mib,
                storage_mib: session.resources.storage_mib,
            },
            streaming_endpoint: session.streaming_endpoint.as_ref().map(|endpoint| {
                StreamingEndpointDto {
                    protocol: endpoint.protocol,
                    port: endpoint.port,
                    path: endpoint.path.clone(),
                }
            }),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgentDto {
    pub agent_id: AgentId,
    pub platform: streamspace_core::Platform,
    pub region: String,
    pub status: streamspace_core::AgentStatus,
    pub active_sessions_count: u32,
    pub max_concurrent_sessions: u32,
    pub last_heartbeat: chrono::DateTime<chrono::Utc>,
}

impl From<&streamspace_core::Agent> for AgentDto {
    fn from(agent: &streamspace_core::Agent) -> Self {
        Self {
            agent_id: agent.agent_id.clone(),
            platform: agent.platform,
            region: agent.region.clone(),
            status: agent.status,
            active_sessions_count: agent.capacity.active_sessions_count,
            max_concurrent_sessions: agent.capacity.max_concurrent_sessions,
            last_heartbeat: agent.last_heartbeat,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyBody {}

/// The uniform machine-readable error body for every non-2xx response
/// (§7: "400 with a machine-readable code").
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: streamspace_core::ErrorKind,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
