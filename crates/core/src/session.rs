use crate::id::{AgentId, OrganizationId, SessionId, TemplateId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    Running,
    Hibernated,
    Terminated,
}

/// The full set of states a `SessionStatus` report (or internal timer) may
/// move a session through. Kept as one enumerated type, per the
/// compile-time-exhaustiveness design note (§9) — the transition table in
/// [`ObservedState::can_transition_to`] is matched exhaustively so adding a
/// new variant here forces every call site to account for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedState {
    Pending,
    Starting,
    Running,
    Hibernating,
    Hibernated,
    Waking,
    Terminating,
    Terminated,
    Failed,
    Disconnected,
}

impl ObservedState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ObservedState::Terminated | ObservedState::Failed)
    }

    /// Whether this session counts against a user's concurrent-session
    /// quota (§3 invariant 2): every non-terminated observed state does.
    pub fn counts_against_quota(self) -> bool {
        !self.is_terminal()
    }

    /// The observed-state transition table from §4.4. Illegal transitions
    /// are dropped (and logged) by the caller, never panicked on.
    pub fn can_transition_to(self, next: ObservedState) -> bool {
        use ObservedState::*;
        match (self, next) {
            (Pending, Starting) => true,
            (Starting, Running) => true,
            (Starting, Failed) => true,
            (Running, Hibernating) => true,
            (Hibernating, Hibernated) => true,
            (Hibernated, Waking) => true,
            (Waking, Running) => true,
            (Running, Disconnected) => true,
            (Disconnected, Running) => true,
            // `any -> terminating -> terminated` on DeleteSession.
            (state, Terminating) if !state.is_terminal() => true,
            (Terminating, Terminated) => true,
            // A disconnected or hibernating agent can still report a hard
            // failure (e.g. it comes back only to report the container died).
            (state, Failed) if !state.is_terminal() => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub cpu_millicores: u32,
    pub memory_mib: u32,
    pub storage_mib: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingEndpoint {
    pub protocol: crate::template::StreamingProtocol,
    pub port: u16,
    pub path: String,
}

/// The central lifecycle entity (§3). `agent_id` is set once, at creation,
/// and is never changed for the session's lifetime (invariant 1,
/// "ownership immutability" in §8) — re-homing is not modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub organization_id: OrganizationId,
    pub owner_user_id: UserId,
    pub template_id: TemplateId,
    pub template_reference: String,
    pub agent_id: AgentId,
    pub desired_state: DesiredState,
    pub observed_state: ObservedState,
    pub resources: ResourceRequest,
    pub streaming_endpoint: Option<StreamingEndpoint>,
    pub idle_timeout: Option<std::time::Duration>,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl Session {
    /// Applies an observed-state report, returning `true` if it was legal
    /// and applied, `false` if it was dropped as an illegal transition.
    /// Only the Lifecycle Manager calls this (invariant 3, §3).
    pub fn apply_observed_state(&mut self, next: ObservedState, at: DateTime<Utc>) -> bool {
        if !self.observed_state.can_transition_to(next) {
            return false;
        }
        self.observed_state = next;
        self.updated_at = at;
        true
    }

    pub fn is_idle_past(&self, now: DateTime<Utc>) -> bool {
        match self.idle_timeout {
            Some(timeout) => {
                self.observed_state == ObservedState::Running
                    && now.signed_duration_since(self.last_activity_at)
                        > chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero())
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hibernate_then_wake_round_trips_to_running() {
        assert!(ObservedState::Running.can_transition_to(ObservedState::Hibernating));
        assert!(ObservedState::Hibernating.can_transition_to(ObservedState::Hibernated));
        assert!(ObservedState::Hibernated.can_transition_to(ObservedState::Waking));
        assert!(ObservedState::Waking.can_transition_to(ObservedState::Running));
    }

    #[test]
    fn disconnect_then_reconnect_round_trips_to_running() {
        assert!(ObservedState::Running.can_transition_to(ObservedState::Disconnected));
        assert!(ObservedState::Disconnected.can_transition_to(ObservedState::Running));
    }

    #[test]
    fn terminated_sessions_accept_no_further_transitions() {
        for candidate in [
            ObservedState::Pending,
            ObservedState::Running,
            ObservedState::Failed,
        ] {
            assert!(!ObservedState::Terminated.can_transition_to(candidate));
        }
    }

    #[test]
    fn terminal_states_no_longer_count_against_quota() {
        assert!(!ObservedState::Terminated.counts_against_quota());
        assert!(!ObservedState::Failed.counts_against_quota());
        assert!(ObservedState::Pending.counts_against_quota());
        assert!(ObservedState::Disconnected.counts_against_quota());
    }

    #[test]
    fn illegal_transition_is_rejected_without_mutating_state() {
        let mut session = sample_session();
        let before = session.updated_at;
        let applied = session.apply_observed_state(ObservedState::Running, Utc::now());
        assert!(!applied);
        assert_eq!(session.observed_state, ObservedState::Pending);
        assert_eq!(session.updated_at, before);
    }

    fn sample_session() -> Session {
        let now = Utc::now();
        Session {
            id: SessionId::new(),
            organization_id: OrganizationId::new(),
            owner_user_id: UserId::new(),
            template_id: TemplateId::new(),
            template_reference: "firefox-browser@1".into(),
            agent_id: AgentId::new(),
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
}
