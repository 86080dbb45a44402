//! The pending-acks map for one Agent channel (§4.2, §5): "mutex; one
//! owner per correlation ID."

use parking_lot::Mutex;
use std::collections::HashMap;
use streamspace_wire::{AgentToControlPlane, CorrelationId};
use tokio::sync::oneshot;

#[derive(Default)]
pub struct PendingAcks {
    slots: Mutex<HashMap<CorrelationId, oneshot::Sender<AgentToControlPlane>>>,
}

impl PendingAcks {
    pub fn register(&self) -> (CorrelationId, oneshot::Receiver<AgentToControlPlane>) {
        let id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();
        self.slots.lock().insert(id.clone(), tx);
        (id, rx)
    }

    /// Resolves the pending slot for `correlation_id`, if any is still
    /// waiting. Returns `false` if nothing was waiting (stale or unknown
    /// correlation ID — logged by the caller, never treated as fatal).
    pub fn resolve(&self, correlation_id: &CorrelationId, response: AgentToControlPlane) -> bool {
        if let Some(sender) = self.slots.lock().remove(correlation_id) {
            let _ = sender.send(response);
            true
        } else {
            false
        }
    }

    pub fn cancel_all(&self) {
        self.slots.lock().clear();
    }
}
