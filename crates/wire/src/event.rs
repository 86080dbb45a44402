//! Events the fan-out delivers over the per-user event WebSocket (`GET
//! /ws`, §4.6). Tagged variants keyed on `type`, per the dynamic-payload
//! design note (§9) — extend by adding a case, never by adding keys to an
//! existing one.

use serde::{Deserialize, Serialize};
use streamspace_core::{AgentId, AgentStatus, ObservedState, OrganizationId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// `session.*`, `agent.*` (admin-only), and `alert.*` events. The fan-out
/// decides recipients by `{org_id, target_user_id?, admin_only}`
/// (carried alongside the event, not inside it — see
/// `streamspace_control_plane::events::Published`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ViewerEvent {
    SessionStatus {
        session_id: SessionId,
        observed_state: ObservedState,
        error: Option<String>,
    },
    SessionDeleted {
        session_id: SessionId,
    },
    AgentStatus {
        agent_id: AgentId,
        status: AgentStatus,
    },
    Alert {
        severity: AlertSeverity,
        message: String,
    },
}

impl ViewerEvent {
    /// `true` for events only admins within the organization should see
    /// (`agent.*`, per §4.6).
    pub fn admin_only(&self) -> bool {
        matches!(self, ViewerEvent::AgentStatus { .. })
    }
}

/// The envelope actually sent over `GET /ws`: ties an event to the
/// organization that produced it so the client-side org filter is
/// verifiable without trusting the server's fan-out alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerEventEnvelope {
    pub organization_id: OrganizationId,
    pub event: ViewerEvent,
}
