use crate::id::{OrganizationId, UserId};
use serde::{Deserialize, Serialize};

/// Resource ceilings enforced transactionally at session-create time
/// (§4.4). `max_concurrent_sessions` is the only limit the Lifecycle
/// Manager checks against a live counter; the resource totals bound the
/// sum of `ResourceRequest` across a user's non-terminated sessions and
/// are advisory for the Scheduler's admission check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub max_concurrent_sessions: u32,
    pub max_cpu_millicores: u32,
    pub max_memory_mib: u32,
    pub max_storage_mib: u32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 5,
            max_cpu_millicores: 4_000,
            max_memory_mib: 8_192,
            max_storage_mib: 20_480,
        }
    }
}

/// Per-`(organization, user)` quota record plus the live in-flight
/// session counter `Quotas.Reserve`/`Quotas.Release` maintain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub limits: QuotaLimits,
    pub in_flight_sessions: u32,
}

impl Quota {
    pub fn new(organization_id: OrganizationId, user_id: UserId, limits: QuotaLimits) -> Self {
        Self {
            organization_id,
            user_id,
            limits,
            in_flight_sessions: 0,
        }
    }

    /// `true` if reserving one more session would not exceed the limit.
    pub fn has_headroom(&self) -> bool {
        self.in_flight_sessions < self.limits.max_concurrent_sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headroom_is_false_exactly_at_the_limit() {
        let mut quota = Quota::new(
            OrganizationId::new(),
            UserId::new(),
            QuotaLimits {
                max_concurrent_sessions: 1,
                ..QuotaLimits::default()
            },
        );
        assert!(quota.has_headroom());
        quota.in_flight_sessions = 1;
        assert!(!quota.has_headroom());
    }
}
