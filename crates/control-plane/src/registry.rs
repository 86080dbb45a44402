//! The process-wide index of open Agent channels (§4.2). Read by the
//! Scheduler and VNC Proxy without locking the whole map; mutated only by
//! the Control Channel on connect/disconnect. Cyclic references are
//! avoided per the design note in §9: callers hold only an `AgentId` and
//! re-resolve the channel handle from this map on every send, rather than
//! holding a pointer back into the channel actor.

use crate::channel::ChannelHandle;
use dashmap::DashMap;
use streamspace_core::AgentId;
use std::sync::Arc;

#[derive(Clone)]
pub struct RegistryEntry {
    pub handle: ChannelHandle,
}

/// Shared by every component that needs to reach a connected Agent.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    entries: Arc<DashMap<AgentId, RegistryEntry>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly authenticated channel, closing and replacing
    /// any prior channel for the same `agent_id` (§4.2: "rejects duplicate
    /// active sessions of the same agent_id; old channel is closed").
    pub fn insert(&self, agent_id: AgentId, handle: ChannelHandle) -> Option<ChannelHandle> {
        let previous = self
            .entries
            .insert(agent_id, RegistryEntry { handle })
            .map(|prev| prev.handle);
        if let Some(previous) = &previous {
            previous.close();
        }
        previous
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<ChannelHandle> {
        self.entries.get(agent_id).map(|entry| entry.handle.clone())
    }

    /// Removes the entry only if it still points at `handle` — a reconnect
    /// may have already replaced it between the old channel's read loop
    /// detecting EOF and it running its cleanup path. Returns whether this
    /// call actually removed the entry, so the caller can tell a genuine
    /// disconnect (still current) from a channel superseded by a newer
    /// registration (already replaced, nothing to clean up here).
    pub fn remove_if_current(&self, agent_id: &AgentId, handle: &ChannelHandle) -> bool {
        self.entries
            .remove_if(agent_id, |_, entry| entry.handle.id() == handle.id())
            .is_some()
    }

    /// Unconditional removal, for the reconciler's agent-lost sweep where
    /// there is no specific handle to compare against — any channel
    /// currently registered for this agent is stale.
    pub fn remove(&self, agent_id: &AgentId) {
        self.entries.remove(agent_id);
    }

    pub fn is_online(&self, agent_id: &AgentId) -> bool {
        self.entries.contains_key(agent_id)
    }

    pub fn connected_agent_ids(&self) -> Vec<AgentId> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of currently connected Agent channels, for `/metrics` (§6).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
