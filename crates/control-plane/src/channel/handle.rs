use super::pending::PendingAcks;
use std::sync::Arc;
use std::time::Duration;
use streamspace_wire::{ControlPlaneToAgent, Envelope};
use tokio::sync::{mpsc, Notify};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("agent channel is closed")]
    Closed,
    #[error("command ack timed out")]
    Timeout,
}

/// A cheaply-clonable reference to one Agent's outbound queue and
/// pending-acks map. Callers hold only an [`AgentId`](streamspace_core::AgentId)
/// and fetch one of these from the [`crate::registry::AgentRegistry`] on
/// every send, per the Registry-lookup design note (§9) — never a direct
/// pointer back into the channel actor's task.
#[derive(Clone)]
pub struct ChannelHandle {
    id: u64,
    outbound: mpsc::UnboundedSender<Envelope<ControlPlaneToAgent>>,
    pending: Arc<PendingAcks>,
    closed: Arc<Notify>,
}

impl ChannelHandle {
    pub(super) fn new(
        id: u64,
        outbound: mpsc::UnboundedSender<Envelope<ControlPlaneToAgent>>,
        pending: Arc<PendingAcks>,
    ) -> Self {
        Self {
            id,
            outbound,
            pending,
            closed: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Signals this channel's connection loop to exit. Called by the
    /// Registry when a newer registration for the same Agent replaces this
    /// one (§4.2: "rejects duplicate active sessions of the same
    /// agent_id; old channel is closed"). `Notify::notify_one` buffers the
    /// permit, so this is safe to call before the loop starts awaiting it.
    pub fn close(&self) {
        self.closed.notify_one();
    }

    pub(super) async fn wait_closed(&self) {
        self.closed.notified().await;
    }

    /// Fire-and-forget send (e.g. `VncData`, §4.2).
    pub fn send(&self, message: ControlPlaneToAgent) -> Result<(), ChannelError> {
        self.outbound
            .send(Envelope::new(message))
            .map_err(|_| ChannelError::Closed)
    }

    /// Sends a command and awaits its ack, timing out after `timeout`
    /// (default T=10s, §4.2/§5).
    pub async fn send_awaiting_ack(
        &self,
        message: ControlPlaneToAgent,
        timeout: Duration,
    ) -> Result<streamspace_wire::AgentToControlPlane, ChannelError> {
        let (correlation_id, rx) = self.pending.register();
        self.outbound
            .send(Envelope::with_correlation(message, correlation_id))
            .map_err(|_| ChannelError::Closed)?;
        tokio::time::timeout(timeout, rx)
            .await
            .map_err(|_| ChannelError::Timeout)?
            .map_err(|_| ChannelError::Closed)
    }

    pub(super) fn pending(&self) -> &PendingAcks {
        &self.pending
    }
}
