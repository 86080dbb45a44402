use crate::id::{AgentId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Kubernetes,
    Docker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Draining,
}

impl AgentStatus {
    /// Whether the Scheduler may hand this Agent new sessions.
    pub fn accepts_new_sessions(self) -> bool {
        matches!(self, AgentStatus::Online)
    }
}

/// Self-reported capacity from the most recent `Heartbeat` or `Register`.
/// Totals are static per-agent configuration; the used fields move with
/// every heartbeat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Capacity {
    pub max_concurrent_sessions: u32,
    pub active_sessions_count: u32,
    pub cpu_millicores_total: u32,
    pub memory_mib_total: u32,
}

impl Capacity {
    pub fn free_sessions(&self) -> u32 {
        self.max_concurrent_sessions
            .saturating_sub(self.active_sessions_count)
    }

    pub fn has_room_for(&self, required_cpu_millicores: u32, required_memory_mib: u32) -> bool {
        self.free_sessions() > 0
            && required_cpu_millicores <= self.cpu_millicores_total
            && required_memory_mib <= self.memory_mib_total
    }
}

/// `(agent_id, organization?, platform, region, status, capacity, last_heartbeat)`.
///
/// Whether `organization_id` is set is an open implementation question the
/// source material left ambiguous (§9); this subsystem supports both
/// platform-wide agents (`organization_id: None`, eligible for any
/// organization's sessions of a matching platform) and org-scoped agents
/// reserved for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub organization_id: Option<OrganizationId>,
    pub platform: Platform,
    pub region: String,
    pub status: AgentStatus,
    pub capacity: Capacity,
    pub last_heartbeat: DateTime<Utc>,
    /// HMAC of the shared secret presented at `Register`, so reconnects can
    /// be re-verified without storing the secret itself.
    #[serde(skip_serializing)]
    pub credential_fingerprint: String,
}

impl Agent {
    /// Whether this agent may host a session created in `org`.
    pub fn serves_org(&self, org: &OrganizationId) -> bool {
        match &self.organization_id {
            Some(scoped) => scoped == org,
            None => true,
        }
    }

    pub fn is_eligible(&self, org: &OrganizationId, platform: Platform) -> bool {
        self.status.accepts_new_sessions() && self.platform == platform && self.serves_org(org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(status: AgentStatus, organization_id: Option<OrganizationId>) -> Agent {
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

    #[test]
    fn platform_wide_agent_serves_any_org() {
        let a = agent(AgentStatus::Online, None);
        assert!(a.serves_org(&OrganizationId::new()));
    }

    #[test]
    fn org_scoped_agent_rejects_other_orgs() {
        let mine = OrganizationId::new();
        let a = agent(AgentStatus::Online, Some(mine.clone()));
        assert!(a.serves_org(&mine));
        assert!(!a.serves_org(&OrganizationId::new()));
    }

    #[test]
    fn draining_agent_is_not_eligible() {
        let a = agent(AgentStatus::Draining, None);
        assert!(!a.is_eligible(&OrganizationId::new(), Platform::Kubernetes));
    }
}
