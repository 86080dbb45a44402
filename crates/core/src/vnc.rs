use crate::id::{AgentId, SessionId, UserId, VncStreamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transient per-viewer record (§3). Lifetime is bounded by the shorter of
/// the viewer WebSocket and the Agent-side tunnel; there is no persistence
/// requirement for these beyond the process's own bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VncStream {
    pub stream_id: VncStreamId,
    pub session_id: SessionId,
    pub viewer_user_id: UserId,
    pub agent_id: AgentId,
    pub opened_at: DateTime<Utc>,
}
