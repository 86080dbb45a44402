use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use streamspace_core::{
    Agent, AgentId, AgentStatus, AuditRecord, Capacity, ObservedState, OrgScope, Organization,
    Platform, Quota, QuotaLimits, Session, SessionId, StreamingEndpoint, Template, User, UserId,
};

/// The Durable Store contract (§4.1). Every method takes an [`OrgScope`]
/// (or, for Agent methods that may legitimately span organizations, an
/// explicit note that no scope applies) so that an unscoped query is a
/// type error rather than a runtime bug (invariant 5, §3).
///
/// A SQL-backed implementation satisfies this same trait; the in-process
/// [`crate::memory::MemoryStore`] here is the only implementation this
/// repository ships, guarded by a single lock rather than per-row
/// transactions — sufficient for the "serialized-enough isolation for
/// quota reservation" requirement the contract actually demands.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_organization(&self, org: Organization) -> Result<(), StoreError>;
    async fn get_organization(&self, scope: &OrgScope) -> Result<Organization, StoreError>;

    async fn create_user(&self, user: User) -> Result<(), StoreError>;
    async fn get_user(&self, scope: &OrgScope, user_id: &UserId) -> Result<User, StoreError>;
    async fn get_user_by_username(
        &self,
        scope: &OrgScope,
        username: &str,
    ) -> Result<User, StoreError>;
    /// Login (§6) has no org context to scope by yet — usernames are
    /// unique platform-wide, so this is the one user lookup that isn't
    /// `OrgScope`-qualified.
    async fn get_user_by_username_unscoped(&self, username: &str) -> Result<User, StoreError>;

    async fn upsert_template(&self, template: Template) -> Result<(), StoreError>;
    async fn get_template_by_reference(&self, reference: &str) -> Result<Template, StoreError>;

    async fn upsert_agent(&self, agent: Agent) -> Result<(), StoreError>;
    async fn get_agent(&self, agent_id: &AgentId) -> Result<Agent, StoreError>;
    async fn set_agent_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn record_heartbeat(
        &self,
        agent_id: &AgentId,
        capacity: Capacity,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    /// `Agents.ListEligible(org, platform)` — online agents with free
    /// capacity serving `org`, ordered by ascending load, tie-broken by
    /// most-recently-heard (§4.1).
    async fn list_eligible_agents(
        &self,
        scope: &OrgScope,
        platform: Platform,
    ) -> Result<Vec<Agent>, StoreError>;
    async fn list_all_agents(&self, scope: &OrgScope) -> Result<Vec<Agent>, StoreError>;

    async fn ensure_quota(
        &self,
        scope: &OrgScope,
        user_id: &UserId,
        limits: QuotaLimits,
    ) -> Result<(), StoreError>;
    async fn get_quota(&self, scope: &OrgScope, user_id: &UserId) -> Result<Quota, StoreError>;
    async fn release_quota(&self, scope: &OrgScope, user_id: &UserId) -> Result<(), StoreError>;

    /// The create-flow transaction from §4.4: reserves quota, inserts the
    /// session (no-op if `session.id` already exists, per the command
    /// idempotence property, §8), and appends the audit record — all under
    /// one lock. Rolls back the quota reservation if the session already
    /// existed with a different owner (a programming error, surfaced as
    /// `Conflict`) or if quota was unavailable.
    async fn reserve_and_create_session(
        &self,
        scope: &OrgScope,
        user_id: &UserId,
        session: Session,
        audit: AuditRecord,
    ) -> Result<Session, StoreError>;

    async fn get_session_for_org(
        &self,
        scope: &OrgScope,
        session_id: &SessionId,
    ) -> Result<Session, StoreError>;
    /// Looks up a session by id with no org scope, for the Agent-facing
    /// status-report path (§4.2) where the Control Plane must discover the
    /// owning org before it can scope anything else.
    async fn get_session_unscoped(&self, session_id: &SessionId) -> Result<Session, StoreError>;
    async fn list_sessions_for_user(
        &self,
        scope: &OrgScope,
        user_id: &UserId,
    ) -> Result<Vec<Session>, StoreError>;
    async fn list_sessions_for_agent(&self, agent_id: &AgentId) -> Result<Vec<Session>, StoreError>;
    /// All non-terminated sessions, for the reconciler and auto-hibernation
    /// sweeps — these run process-wide, not scoped to one caller's org.
    async fn list_active_sessions(&self) -> Result<Vec<Session>, StoreError>;
    /// All agents, for the agent-lost sweep (§4.4 failure semantics).
    async fn list_all_agents_unscoped(&self) -> Result<Vec<Agent>, StoreError>;

    /// Applies an observed-state transition plus any side effects that
    /// must be atomic with it (streaming endpoint assignment, quota
    /// release on reaching a terminal state). Returns `Conflict` if the
    /// transition is illegal for the session's current state, per the
    /// rule that illegal transitions are dropped (§4.4).
    #[allow(clippy::too_many_arguments)]
    async fn apply_session_transition(
        &self,
        scope: &OrgScope,
        session_id: &SessionId,
        next: ObservedState,
        at: DateTime<Utc>,
        streaming_endpoint: Option<StreamingEndpoint>,
        last_activity_at: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<Session, StoreError>;

    /// Sets desired state without touching observed state (the
    /// API-driven half of §4.4's "desired state mutations").
    async fn set_desired_state(
        &self,
        scope: &OrgScope,
        session_id: &SessionId,
        desired: streamspace_core::DesiredState,
    ) -> Result<Session, StoreError>;

    async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError>;
    async fn list_audit_for_org(
        &self,
        scope: &OrgScope,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, StoreError>;
}
