//! Builders used by this crate's own tests and, via the `test-support`
//! feature, by `streamspace-storage` and `streamspace-control-plane`'s test
//! suites. Kept out of the default build so production binaries never pull
//! in `proptest`.

use crate::agent::{Agent, AgentStatus, Capacity, Platform};
use crate::id::{AgentId, OrganizationId, SessionId, TemplateId, UserId};
use crate::session::{DesiredState, ObservedState, ResourceRequest, Session};
use crate::user::{Role, User};
use chrono::Utc;

pub fn sample_organization_id() -> OrganizationId {
    OrganizationId::new()
}

pub fn sample_user(organization_id: &OrganizationId, role: Role) -> User {
    User {
        id: UserId::new(),
        organization_id: organization_id.clone(),
        username: "test-user".into(),
        role,
        password_hash: "unused-in-tests".into(),
    }
}

pub fn sample_agent(organization_id: Option<OrganizationId>, status: AgentStatus) -> Agent {
    Agent {
        agent_id: AgentId::new(),
        organization_id,
        platform: Platform::Kubernetes,
        region: "us-east".into(),
        status,
        capacity: Capacity {
            max_concurrent_sessions: 10,
            active_sessions_count: 0,
            cpu_millicores_total: 8_000,
            memory_mib_total: 16_384,
        },
        last_heartbeat: Utc::now(),
        credential_fingerprint: "fp".into(),
    }
}

pub fn sample_session(organization_id: &OrganizationId, owner: &UserId, agent_id: &AgentId) -> Session {
    let now = Utc::now();
    Session {
        id: SessionId::new(),
        organization_id: organization_id.clone(),
        owner_user_id: owner.clone(),
        template_id: TemplateId::new(),
        template_reference: "firefox-browser@1".into(),
        agent_id: agent_id.clone(),
        desired_state: DesiredState::Running,
        observed_state: ObservedState::Pending,
        resources: ResourceRequest {
            cpu_millicores: 500,
            memory_mib: 2048,
            storage_mib: 1024,
        },
        streaming_endpoint: None,
        idle_timeout: None,
        last_activity_at: now,
        created_at: now,
        updated_at: now,
        last_error: None,
    }
}
