//! Exercises the Lifecycle Manager directly against a `MemoryStore`,
//! bypassing HTTP and the Agent WebSocket channel entirely. The wire API
//! has no fixture-seeding endpoints (organizations/users/templates/agents
//! only ever arrive via `Register`/admin tooling), so these scenarios
//! seed state through the `Store` trait the way the Control Plane's own
//! background paths do, then drive `LifecycleManager` the way a handler
//! would.

use std::sync::Arc;
use std::time::Duration;

use streamspace_control_plane::auth::RequestContext;
use streamspace_control_plane::config::Config;
use streamspace_control_plane::error::ApiError;
use streamspace_control_plane::events::EventFanout;
use streamspace_control_plane::lifecycle::LifecycleManager;
use streamspace_control_plane::registry::AgentRegistry;
use streamspace_control_plane::scheduler::{LeastLoadedScheduler, Scheduler};
use streamspace_core::{
    test_support, Agent, AgentStatus, AuditOutcome, Clock, ObservedState, OrgScope, Organization,
    ResourceDefaults, Role, StreamingProtocol, SystemClock, Template, TemplateId, UserId,
};
use streamspace_storage::{MemoryStore, Store};
use streamspace_wire::api::CreateSessionRequest;

fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        jwt_secret: "a".repeat(32),
        agent_shared_secret: "shared-secret".into(),
        cors_allowed_origins: Vec::new(),
        allowed_websocket_origins: Vec::new(),
        heartbeat_interval: Duration::from_secs(30),
        heartbeat_grace_factor: 2,
        command_ack_timeout: Duration::from_millis(50),
        idle_timeout_default: None,
        agent_lost_grace: Duration::from_secs(1800),
        reconciler_interval: Duration::from_secs(15),
        max_request_bytes: 1024 * 1024,
        vnc_buffer_frames: 64,
        vnc_stream_keepalive: Duration::from_secs(30),
        graceful_shutdown_drain: Duration::from_secs(1),
    }
}

struct Harness {
    store: Arc<dyn Store>,
    lifecycle: LifecycleManager,
    org: Organization,
}

impl Harness {
    async fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = AgentRegistry::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(LeastLoadedScheduler::new(store.clone()));
        let events = Arc::new(EventFanout::new());
        let config = Arc::new(test_config());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let org = Organization {
            id: test_support::sample_organization_id(),
            name: "acme".into(),
        };
        store.create_organization(org.clone()).await.unwrap();

        let lifecycle = LifecycleManager::new(store.clone(), registry, scheduler, events, config, clock);
        Self { store, lifecycle, org }
    }

    async fn seed_user(&self, role: Role) -> RequestContext {
        let user = test_support::sample_user(&self.org.id, role);
        self.store.create_user(user.clone()).await.unwrap();
        RequestContext {
            user_id: user.id,
            organization_id: self.org.id.clone(),
            role: user.role,
        }
    }

    async fn seed_template(&self) -> Template {
        let template = Template {
            id: TemplateId::new(),
            name: "firefox-browser".into(),
            version: "1".into(),
            container_image: "registry.internal/streamspace/firefox:1".into(),
            resource_defaults: ResourceDefaults {
                cpu_millicores: 500,
                memory_mib: 2048,
                storage_mib: 1024,
            },
            protocol: StreamingProtocol::Vnc,
            port: 5900,
            path: "/vnc".into(),
        };
        self.store.upsert_template(template.clone()).await.unwrap();
        template
    }

    async fn seed_online_agent(&self) -> Agent {
        let agent = test_support::sample_agent(None, AgentStatus::Online);
        self.store.upsert_agent(agent.clone()).await.unwrap();
        agent
    }

    fn create_request(&self, template: &Template) -> CreateSessionRequest {
        CreateSessionRequest {
            template: template.reference(),
            resources: None,
            persistent_home: Some(false),
            idle_timeout_seconds: None,
        }
    }
}

#[tokio::test]
async fn happy_path_create_assigns_the_only_eligible_agent_and_audits() {
    let harness = Harness::new().await;
    let ctx = harness.seed_user(Role::User).await;
    let template = harness.seed_template().await;
    let agent = harness.seed_online_agent().await;

    let session = harness
        .lifecycle
        .create_session(&ctx, harness.create_request(&template))
        .await
        .expect("create_session should succeed with one eligible agent");

    assert_eq!(session.agent_id, agent.agent_id);
    assert_eq!(session.observed_state, ObservedState::Pending);
    assert_eq!(session.organization_id, harness.org.id);

    let quota = harness
        .store
        .get_quota(&OrgScope::new(harness.org.id.clone()), &ctx.user_id)
        .await
        .unwrap();
    assert_eq!(quota.in_flight_sessions, 1);

    let audit = harness
        .store
        .list_audit_for_org(&OrgScope::new(harness.org.id.clone()), 10)
        .await
        .unwrap();
    assert!(audit.iter().any(|r| r.action == "session.create"));
}

#[tokio::test]
async fn create_with_no_eligible_agents_reports_no_candidates() {
    let harness = Harness::new().await;
    let ctx = harness.seed_user(Role::User).await;
    let template = harness.seed_template().await;
    // No agent seeded at all.

    let err = harness
        .lifecycle
        .create_session(&ctx, harness.create_request(&template))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NoCandidates));

    let audit = harness
        .store
        .list_audit_for_org(&OrgScope::new(harness.org.id.clone()), 10)
        .await
        .unwrap();
    let denied = audit
        .iter()
        .find(|r| r.action == "session.create" && r.outcome == AuditOutcome::Denied)
        .expect("a denied session.create audit row");
    assert_eq!(denied.reason.as_deref(), Some("no_candidates"));
}

#[tokio::test]
async fn draining_agent_is_not_an_eligible_candidate() {
    let harness = Harness::new().await;
    let ctx = harness.seed_user(Role::User).await;
    let template = harness.seed_template().await;
    let draining = test_support::sample_agent(None, AgentStatus::Draining);
    harness.store.upsert_agent(draining).await.unwrap();

    let err = harness
        .lifecycle
        .create_session(&ctx, harness.create_request(&template))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NoCandidates));
}

#[tokio::test]
async fn cross_org_session_read_is_not_found_not_forbidden() {
    let harness = Harness::new().await;
    let ctx = harness.seed_user(Role::User).await;
    let template = harness.seed_template().await;
    harness.seed_online_agent().await;

    let session = harness
        .lifecycle
        .create_session(&ctx, harness.create_request(&template))
        .await
        .unwrap();

    let other_org = Organization {
        id: test_support::sample_organization_id(),
        name: "other".into(),
    };
    harness.store.create_organization(other_org.clone()).await.unwrap();
    let other_ctx = RequestContext {
        user_id: UserId::new(),
        organization_id: other_org.id,
        role: Role::User,
    };

    let err = harness
        .lifecycle
        .get_session(&other_ctx, &session.id)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NotFound));

    let audit = harness
        .store
        .list_audit_for_org(&OrgScope::new(other_ctx.organization_id.clone()), 10)
        .await
        .unwrap();
    let denied = audit
        .iter()
        .find(|r| r.action == "session.read" && r.outcome == AuditOutcome::Denied)
        .expect("a denied session.read audit row in the requester's own org stream");
    assert_eq!(denied.organization_id, other_ctx.organization_id);
}

#[tokio::test]
async fn agent_disconnect_marks_its_running_sessions_disconnected() {
    let harness = Harness::new().await;
    let ctx = harness.seed_user(Role::User).await;
    let template = harness.seed_template().await;
    let agent = harness.seed_online_agent().await;

    let session = harness
        .lifecycle
        .create_session(&ctx, harness.create_request(&template))
        .await
        .unwrap();

    // A real Agent would report this itself; simulate it reaching Running
    // before the channel drops (Pending -> Starting -> Running, per the
    // observed-state transition table).
    let scope = OrgScope::new(harness.org.id.clone());
    harness
        .store
        .apply_session_transition(&scope, &session.id, ObservedState::Starting, chrono::Utc::now(), None, None, None)
        .await
        .unwrap();
    harness
        .store
        .apply_session_transition(&scope, &session.id, ObservedState::Running, chrono::Utc::now(), None, None, None)
        .await
        .unwrap();

    harness.lifecycle.handle_agent_disconnected(&agent.agent_id).await;

    let updated = harness.store.get_session_unscoped(&session.id).await.unwrap();
    assert_eq!(updated.observed_state, ObservedState::Disconnected);
}

#[tokio::test]
async fn hibernate_then_wake_round_trips_desired_state() {
    let harness = Harness::new().await;
    let ctx = harness.seed_user(Role::User).await;
    let template = harness.seed_template().await;
    harness.seed_online_agent().await;

    let session = harness
        .lifecycle
        .create_session(&ctx, harness.create_request(&template))
        .await
        .unwrap();

    // No channel is registered for the agent; both calls must still
    // record desired state rather than failing the caller (§4.4 treats
    // Agent dispatch as best-effort).
    let hibernated = harness.lifecycle.hibernate_session(&ctx, &session.id).await.unwrap();
    assert_eq!(hibernated.desired_state, streamspace_core::DesiredState::Hibernated);

    let woken = harness.lifecycle.wake_session(&ctx, &session.id).await.unwrap();
    assert_eq!(woken.desired_state, streamspace_core::DesiredState::Running);
}

#[tokio::test]
async fn status_report_from_a_non_owning_agent_is_dropped() {
    let harness = Harness::new().await;
    let ctx = harness.seed_user(Role::User).await;
    let template = harness.seed_template().await;
    harness.seed_online_agent().await;

    let session = harness
        .lifecycle
        .create_session(&ctx, harness.create_request(&template))
        .await
        .unwrap();

    let impostor = test_support::sample_agent(None, AgentStatus::Online);
    harness.store.upsert_agent(impostor.clone()).await.unwrap();

    harness
        .lifecycle
        .handle_session_status(
            &impostor.agent_id,
            session.id.clone(),
            ObservedState::Running,
            None,
            None,
            None,
        )
        .await;

    let unchanged = harness.store.get_session_unscoped(&session.id).await.unwrap();
    assert_eq!(unchanged.observed_state, ObservedState::Pending);
}
