use super::state::MemoryState;
use crate::{Store, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use streamspace_core::{
    Agent, AgentId, AgentStatus, AuditRecord, Capacity, DesiredState, ObservedState, OrgScope,
    Organization, Platform, Quota, QuotaLimits, Session, SessionId, StreamingEndpoint, Template,
    User, UserId,
};

/// In-process implementation of [`Store`]. Adequate for a single Control
/// Plane instance or for tests; a multi-instance deployment swaps this for
/// a SQL-backed implementation without changing any caller (§2.1).
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_organization(&self, org: Organization) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.organizations.insert(org.id.clone(), org);
        Ok(())
    }

    async fn get_organization(&self, scope: &OrgScope) -> Result<Organization, StoreError> {
        let state = self.state.lock();
        state
            .organizations
            .get(scope.org_id())
            .cloned()
            .ok_or_else(|| StoreError::not_found("organization", scope.org_id().to_string()))
    }

    async fn create_user(&self, user: User) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get_user(&self, scope: &OrgScope, user_id: &UserId) -> Result<User, StoreError> {
        let state = self.state.lock();
        state
            .users
            .get(user_id)
            .filter(|u| &u.organization_id == scope.org_id())
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", user_id.to_string()))
    }

    async fn get_user_by_username(
        &self,
        scope: &OrgScope,
        username: &str,
    ) -> Result<User, StoreError> {
        let state = self.state.lock();
        state
            .users
            .values()
            .find(|u| &u.organization_id == scope.org_id() && u.username == username)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", username))
    }

    async fn get_user_by_username_unscoped(&self, username: &str) -> Result<User, StoreError> {
        let state = self.state.lock();
        state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", username))
    }

    async fn upsert_template(&self, template: Template) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state
            .templates
            .insert(template.reference(), template);
        Ok(())
    }

    async fn get_template_by_reference(&self, reference: &str) -> Result<Template, StoreError> {
        let state = self.state.lock();
        state
            .templates
            .get(reference)
            .cloned()
            .ok_or_else(|| StoreError::not_found("template", reference))
    }

    async fn upsert_agent(&self, agent: Agent) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.agents.insert(agent.agent_id.clone(), agent);
        Ok(())
    }

    async fn get_agent(&self, agent_id: &AgentId) -> Result<Agent, StoreError> {
        let state = self.state.lock();
        state
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("agent", agent_id.to_string()))
    }

    async fn set_agent_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let agent = state
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| StoreError::not_found("agent", agent_id.to_string()))?;
        agent.status = status;
        agent.last_heartbeat = at;
        Ok(())
    }

    async fn record_heartbeat(
        &self,
        agent_id: &AgentId,
        capacity: Capacity,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let agent = state
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| StoreError::not_found("agent", agent_id.to_string()))?;
        agent.capacity = capacity;
        agent.last_heartbeat = at;
        agent.status = AgentStatus::Online;
        Ok(())
    }

    async fn list_eligible_agents(
        &self,
        scope: &OrgScope,
        platform: Platform,
    ) -> Result<Vec<Agent>, StoreError> {
        let state = self.state.lock();
        let mut eligible: Vec<Agent> = state
            .agents
            .values()
            .filter(|a| a.is_eligible(scope.org_id(), platform) && a.capacity.free_sessions() > 0)
            .cloned()
            .collect();
        eligible.sort_by(|a, b| {
            a.capacity
                .active_sessions_count
                .cmp(&b.capacity.active_sessions_count)
                .then(b.last_heartbeat.cmp(&a.last_heartbeat))
        });
        Ok(eligible)
    }

    async fn list_all_agents(&self, scope: &OrgScope) -> Result<Vec<Agent>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .agents
            .values()
            .filter(|a| a.serves_org(scope.org_id()))
            .cloned()
            .collect())
    }

    async fn ensure_quota(
        &self,
        scope: &OrgScope,
        user_id: &UserId,
        limits: QuotaLimits,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state
            .quotas
            .entry((scope.org_id().clone(), user_id.clone()))
            .or_insert_with(|| Quota::new(scope.org_id().clone(), user_id.clone(), limits));
        Ok(())
    }

    async fn get_quota(&self, scope: &OrgScope, user_id: &UserId) -> Result<Quota, StoreError> {
        let state = self.state.lock();
        state
            .quotas
            .get(&(scope.org_id().clone(), user_id.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("quota", user_id.to_string()))
    }

    async fn release_quota(&self, scope: &OrgScope, user_id: &UserId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let quota = state
            .quotas
            .get_mut(&(scope.org_id().clone(), user_id.clone()))
            .ok_or_else(|| StoreError::not_found("quota", user_id.to_string()))?;
        quota.in_flight_sessions = quota.in_flight_sessions.saturating_sub(1);
        Ok(())
    }

    async fn reserve_and_create_session(
        &self,
        scope: &OrgScope,
        user_id: &UserId,
        session: Session,
        audit: AuditRecord,
    ) -> Result<Session, StoreError> {
        let mut state = self.state.lock();

        // Idempotent create: a known session_id is a no-op (§8).
        if let Some(existing) = state.sessions.get(&session.id) {
            if existing.organization_id != session.organization_id
                || existing.owner_user_id != session.owner_user_id
            {
                return Err(StoreError::Conflict(format!(
                    "session {} already exists under a different owner",
                    session.id
                )));
            }
            return Ok(existing.clone());
        }

        let key = (scope.org_id().clone(), user_id.clone());
        let quota = state
            .quotas
            .get_mut(&key)
            .ok_or_else(|| StoreError::not_found("quota", user_id.to_string()))?;
        if !quota.has_headroom() {
            return Err(StoreError::QuotaExceeded);
        }
        quota.in_flight_sessions += 1;

        state.sessions.insert(session.id.clone(), session.clone());
        state.audit_order.push(audit.id.clone());
        state.audit.insert(audit.id.clone(), audit);

        Ok(session)
    }

    async fn get_session_for_org(
        &self,
        scope: &OrgScope,
        session_id: &SessionId,
    ) -> Result<Session, StoreError> {
        let state = self.state.lock();
        state
            .sessions
            .get(session_id)
            .filter(|s| &s.organization_id == scope.org_id())
            .cloned()
            .ok_or_else(|| StoreError::not_found("session", session_id.to_string()))
    }

    async fn get_session_unscoped(&self, session_id: &SessionId) -> Result<Session, StoreError> {
        let state = self.state.lock();
        state
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("session", session_id.to_string()))
    }

    async fn list_sessions_for_user(
        &self,
        scope: &OrgScope,
        user_id: &UserId,
    ) -> Result<Vec<Session>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .sessions
            .values()
            .filter(|s| &s.organization_id == scope.org_id() && &s.owner_user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_sessions_for_agent(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<Session>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .sessions
            .values()
            .filter(|s| &s.agent_id == agent_id)
            .cloned()
            .collect())
    }

    async fn list_active_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .sessions
            .values()
            .filter(|s| !s.observed_state.is_terminal())
            .cloned()
            .collect())
    }

    async fn list_all_agents_unscoped(&self) -> Result<Vec<Agent>, StoreError> {
        let state = self.state.lock();
        Ok(state.agents.values().cloned().collect())
    }

    async fn apply_session_transition(
        &self,
        scope: &OrgScope,
        session_id: &SessionId,
        next: ObservedState,
        at: DateTime<Utc>,
        streaming_endpoint: Option<StreamingEndpoint>,
        last_activity_at: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<Session, StoreError> {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(session_id)
            .filter(|s| &s.organization_id == scope.org_id())
            .ok_or_else(|| StoreError::not_found("session", session_id.to_string()))?;

        if !session.apply_observed_state(next, at) {
            return Err(StoreError::Conflict(format!(
                "illegal transition {:?} -> {:?} for session {}",
                session.observed_state, next, session_id
            )));
        }

        if streaming_endpoint.is_some() {
            session.streaming_endpoint = streaming_endpoint;
        }
        if let Some(activity) = last_activity_at {
            session.last_activity_at = activity;
        }
        session.last_error = error;

        let released = next.is_terminal();
        let result = session.clone();
        let owner = result.owner_user_id.clone();
        drop(session);

        if released {
            if let Some(quota) = state.quotas.get_mut(&(scope.org_id().clone(), owner)) {
                quota.in_flight_sessions = quota.in_flight_sessions.saturating_sub(1);
            }
        }

        Ok(result)
    }

    async fn set_desired_state(
        &self,
        scope: &OrgScope,
        session_id: &SessionId,
        desired: DesiredState,
    ) -> Result<Session, StoreError> {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(session_id)
            .filter(|s| &s.organization_id == scope.org_id())
            .ok_or_else(|| StoreError::not_found("session", session_id.to_string()))?;

        if session.observed_state.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "session {session_id} is already terminal"
            )));
        }

        session.desired_state = desired;
        Ok(session.clone())
    }

    async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.audit_order.push(record.id.clone());
        state.audit.insert(record.id.clone(), record);
        Ok(())
    }

    async fn list_audit_for_org(
        &self,
        scope: &OrgScope,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .audit_order
            .iter()
            .rev()
            .filter_map(|id| state.audit.get(id))
            .filter(|r| &r.organization_id == scope.org_id())
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamspace_core::{test_support, AuditRecordBuilder, Role};

    fn scope(org_id: &streamspace_core::OrganizationId) -> OrgScope {
        OrgScope::new(org_id.clone())
    }

    #[tokio::test]
    async fn quota_exceeded_leaves_no_session_row_behind() {
        let store = MemoryStore::new();
        let org_id = test_support::sample_organization_id();
        let user = test_support::sample_user(&org_id, Role::User);
        let agent = test_support::sample_agent(None, AgentStatus::Online);

        store
            .ensure_quota(
                &scope(&org_id),
                &user.id,
                QuotaLimits {
                    max_concurrent_sessions: 0,
                    ..QuotaLimits::default()
                },
            )
            .await
            .unwrap();

        let session = test_support::sample_session(&org_id, &user.id, &agent.agent_id);
        let audit = AuditRecordBuilder::new(org_id.clone(), "session.create", "session", session.id.to_string())
            .build(Utc::now());

        let err = store
            .reserve_and_create_session(&scope(&org_id), &user.id, session.clone(), audit)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded));

        let err = store
            .get_session_for_org(&scope(&org_id), &session.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn creating_a_known_session_id_twice_is_a_no_op() {
        let store = MemoryStore::new();
        let org_id = test_support::sample_organization_id();
        let user = test_support::sample_user(&org_id, Role::User);
        let agent = test_support::sample_agent(None, AgentStatus::Online);
        store
            .ensure_quota(&scope(&org_id), &user.id, QuotaLimits::default())
            .await
            .unwrap();

        let session = test_support::sample_session(&org_id, &user.id, &agent.agent_id);
        let audit = |session_id: &SessionId| {
            AuditRecordBuilder::new(org_id.clone(), "session.create", "session", session_id.to_string())
                .build(Utc::now())
        };

        store
            .reserve_and_create_session(&scope(&org_id), &user.id, session.clone(), audit(&session.id))
            .await
            .unwrap();
        store
            .reserve_and_create_session(&scope(&org_id), &user.id, session.clone(), audit(&session.id))
            .await
            .unwrap();

        let quota = store.get_quota(&scope(&org_id), &user.id).await.unwrap();
        assert_eq!(quota.in_flight_sessions, 1);
    }

    #[tokio::test]
    async fn terminal_transition_releases_quota() {
        let store = MemoryStore::new();
        let org_id = test_support::sample_organization_id();
        let user = test_support::sample_user(&org_id, Role::User);
        let agent = test_support::sample_agent(None, AgentStatus::Online);
        store
            .ensure_quota(&scope(&org_id), &user.id, QuotaLimits::default())
            .await
            .unwrap();

        let mut session = test_support::sample_session(&org_id, &user.id, &agent.agent_id);
        session.observed_state = ObservedState::Running;
        let audit = AuditRecordBuilder::new(org_id.clone(), "session.create", "session", session.id.to_string())
            .build(Utc::now());
        store
            .reserve_and_create_session(&scope(&org_id), &user.id, session.clone(), audit)
            .await
            .unwrap();

        store
            .apply_session_transition(
                &scope(&org_id),
                &session.id,
                ObservedState::Terminating,
                Utc::now(),
                None,
                None,
                None,
            )
            .await
            .unwrap();
        store
            .apply_session_transition(
                &scope(&org_id),
                &session.id,
                ObservedState::Terminated,
                Utc::now(),
                None,
                None,
                None,
            )
            .await
            .unwrap();

        let quota = store.get_quota(&scope(&org_id), &user.id).await.unwrap();
        assert_eq!(quota.in_flight_sessions, 0);
    }

    #[tokio::test]
    async fn illegal_transition_is_reported_as_conflict() {
        let store = MemoryStore::new();
        let org_id = test_support::sample_organization_id();
        let user = test_support::sample_user(&org_id, Role::User);
        let agent = test_support::sample_agent(None, AgentStatus::Online);
        store
            .ensure_quota(&scope(&org_id), &user.id, QuotaLimits::default())
            .await
            .unwrap();
        let session = test_support::sample_session(&org_id, &user.id, &agent.agent_id);
        let audit = AuditRecordBuilder::new(org_id.clone(), "session.create", "session", session.id.to_string())
            .build(Utc::now());
        store
            .reserve_and_create_session(&scope(&org_id), &user.id, session.clone(), audit)
            .await
            .unwrap();

        let err = store
            .apply_session_transition(
                &scope(&org_id),
                &session.id,
                ObservedState::Running,
                Utc::now(),
                None,
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn cross_org_session_lookup_is_not_found_not_forbidden() {
        let store = MemoryStore::new();
        let org_a = test_support::sample_organization_id();
        let org_b = test_support::sample_organization_id();
        let user = test_support::sample_user(&org_a, Role::User);
        let agent = test_support::sample_agent(None, AgentStatus::Online);
        store
            .ensure_quota(&scope(&org_a), &user.id, QuotaLimits::default())
            .await
            .unwrap();
        let session = test_support::sample_session(&org_a, &user.id, &agent.agent_id);
        let audit = AuditRecordBuilder::new(org_a.clone(), "session.create", "session", session.id.to_string())
            .build(Utc::now());
        store
            .reserve_and_create_session(&scope(&org_a), &user.id, session.clone(), audit)
            .await
            .unwrap();

        let err = store
            .get_session_for_org(&scope(&org_b), &session.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
