use crate::id::{AuditRecordId, OrganizationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allowed,
    Denied,
}

/// Append-only record (§3). `resource_id` is stored as a plain string
/// rather than a typed ID so records outlive the entity they describe —
/// audit rows referencing a deleted session must remain readable
/// (invariant 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub timestamp: DateTime<Utc>,
    pub organization_id: OrganizationId,
    pub actor_user_id: Option<UserId>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub outcome: AuditOutcome,
    pub reason: Option<String>,
    pub source_ip: Option<String>,
}

pub struct AuditRecordBuilder {
    organization_id: OrganizationId,
    actor_user_id: Option<UserId>,
    action: String,
    resource_type: String,
    resource_id: String,
    before: Option<serde_json::Value>,
    after: Option<serde_json::Value>,
    outcome: AuditOutcome,
    reason: Option<String>,
    source_ip: Option<String>,
}

impl AuditRecordBuilder {
    pub fn new(
        organization_id: OrganizationId,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            organization_id,
            actor_user_id: None,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            before: None,
            after: None,
            outcome: AuditOutcome::Allowed,
            reason: None,
            source_ip: None,
        }
    }

    pub fn actor(mut self, actor: UserId) -> Self {
        self.actor_user_id = Some(actor);
        self
    }

    pub fn before(mut self, value: serde_json::Value) -> Self {
        self.before = Some(value);
        self
    }

    pub fn after(mut self, value: serde_json::Value) -> Self {
        self.after = Some(value);
        self
    }

    pub fn denied(mut self, reason: impl Into<String>) -> Self {
        self.outcome = AuditOutcome::Denied;
        self.reason = Some(reason.into());
        self
    }

    pub fn source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = Some(ip.into());
        self
    }

    pub fn build(self, now: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            id: AuditRecordId::new(),
            timestamp: now,
            organization_id: self.organization_id,
            actor_user_id: self.actor_user_id,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            before: self.before,
            after: self.after,
            outcome: self.outcome,
            reason: self.reason,
            source_ip: self.source_ip,
        }
    }
}
