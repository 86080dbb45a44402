use crate::id::OrganizationId;
use serde::{Deserialize, Serialize};

/// The tenant boundary. Every other entity belongs to exactly one
/// organization; created out-of-band (there is no `POST /organizations` in
/// this subsystem's API surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
}

/// Wraps an [`OrganizationId`] to mark a call site as having already
/// resolved the caller's organization scope. Store methods take this
/// instead of a bare ID so an unscoped query cannot compile by accident
/// (invariant 5, §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgScope(OrganizationId);

impl OrgScope {
    pub fn new(org_id: OrganizationId) -> Self {
        Self(org_id)
    }

    pub fn org_id(&self) -> &OrganizationId {
        &self.0
    }
}
