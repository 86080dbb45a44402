use std::collections::HashMap;
use streamspace_core::{
    Agent, AgentId, AuditRecord, AuditRecordId, Organization, OrganizationId, Quota, Session,
    SessionId, Template, User, UserId,
};

/// All materialized state behind one lock. Matches the teacher's
/// single-`Arc<Mutex<...>>` shared-context pattern rather than per-table
/// locks — correct, not fine-grained, which is all §4.1 actually requires.
#[derive(Default)]
pub struct MemoryState {
    pub organizations: HashMap<OrganizationId, Organization>,
    pub users: HashMap<UserId, User>,
    pub templates: HashMap<String, Template>,
    pub agents: HashMap<AgentId, Agent>,
    pub sessions: HashMap<SessionId, Session>,
    pub quotas: HashMap<(OrganizationId, UserId), Quota>,
    pub audit: HashMap<AuditRecordId, AuditRecord>,
    pub audit_order: Vec<AuditRecordId>,
}
