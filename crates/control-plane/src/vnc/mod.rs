//! The VNC Proxy (§4.5): multiplexes any number of viewer WebSocket
//! connections over the single control channel each Agent maintains,
//! keyed by `stream_id`. A stream closes when either side closes it, or
//! when the owning Agent disconnects.

use crate::registry::AgentRegistry;
use dashmap::DashMap;
use nanoid::nanoid;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamspace_core::{AgentId, SessionId};
use streamspace_wire::control::ControlPlaneToAgent;
use tokio::sync::mpsc;

/// Consecutive dropped frames before a slow viewer is no longer treated
/// as merely backpressured but as dead, tearing the stream down instead
/// of dropping frames into it forever (§4.5 "overrun").
const MAX_CONSECUTIVE_OVERRUNS: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum VncError {
    #[error("agent for this session is not connected")]
    AgentOffline,
    #[error("agent rejected the stream: {0}")]
    Rejected(String),
    #[error("stream open timed out")]
    Timeout,
}

struct ViewerStream {
    agent_id: AgentId,
    to_viewer: mpsc::Sender<Vec<u8>>,
    consecutive_overruns: AtomicU32,
}

/// Tracks every currently-open VNC stream so inbound `VncData`/`VncClose`
/// frames from an Agent can be routed back to the right viewer socket
/// (§4.5 "bounded buffer per stream, backpressure over drop").
#[derive(Clone, Default)]
pub struct VncProxy {
    streams: Arc<DashMap<String, ViewerStream>>,
    buffer_frames: usize,
}

/// Handed to the viewer-facing WebSocket task: a receiver for frames
/// arriving from the Agent, and a way to push frames (and eventually a
/// close) the other direction.
pub struct OpenStream {
    pub stream_id: String,
    pub from_agent: mpsc::Receiver<Vec<u8>>,
}

impl VncProxy {
    pub fn new(buffer_frames: usize) -> Self {
        Self {
            streams: Arc::new(DashMap::new()),
            buffer_frames,
        }
    }

    /// Opens a stream for `session_id` on whichever agent currently hosts
    /// it, waiting for the Agent's `VncOpenAck` (no ack within `timeout`
    /// is treated as a rejection, not left dangling).
    pub async fn open(
        &self,
        registry: &AgentRegistry,
        agent_id: &AgentId,
        session_id: &SessionId,
        timeout: Duration,
    ) -> Result<OpenStream, VncError> {
        let channel = registry.get(agent_id).ok_or(VncError::AgentOffline)?;
        let stream_id = nanoid!(21);
        let (to_viewer, from_agent) = mpsc::channel(self.buffer_frames);
        self.streams.insert(
            stream_id.clone(),
            ViewerStream {
                agent_id: agent_id.clone(),
                to_viewer,
                consecutive_overruns: AtomicU32::new(0),
            },
        );

        let ack = channel
            .send_awaiting_ack(
                ControlPlaneToAgent::VncOpen {
                    stream_id: stream_id.clone(),
                    session_id: session_id.clone(),
                },
                timeout,
            )
            .await;

        match ack {
            Ok(streamspace_wire::AgentToControlPlane::VncOpenAck { ok: true, .. }) => {
                Ok(OpenStream { stream_id, from_agent })
            }
            Ok(streamspace_wire::AgentToControlPlane::VncOpenAck { error, .. }) => {
                self.streams.remove(&stream_id);
                Err(VncError::Rejected(error.unwrap_or_default()))
            }
            Ok(_) => {
                self.streams.remove(&stream_id);
                Err(VncError::Rejected("unexpected response to vnc_open".into()))
            }
            Err(_) => {
                self.streams.remove(&stream_id);
                Err(VncError::Timeout)
            }
        }
    }

    /// Forwards a viewer-originated frame to the owning Agent.
    pub fn send_to_agent(&self, registry: &AgentRegistry, stream_id: &str, bytes: Vec<u8>) {
        let Some(entry) = self.streams.get(stream_id) else {
            return;
        };
        let Some(channel) = registry.get(&entry.agent_id) else {
            return;
        };
        let _ = channel.send(ControlPlaneToAgent::VncData {
            stream_id: stream_id.to_string(),
            bytes,
        });
    }

    /// Delivers an Agent-originated `VncData` frame to the viewer side.
    /// Backpressure: a full buffer means the viewer socket is too slow,
    /// and the frame is dropped rather than blocking the Agent's channel.
    /// `MAX_CONSECUTIVE_OVERRUNS` dropped frames in a row means the viewer
    /// isn't draining at all — the stream is torn down rather than left
    /// dropping frames into it indefinitely.
    pub fn deliver_from_agent(&self, registry: &AgentRegistry, stream_id: &str, bytes: Vec<u8>) {
        let overruns = {
            let Some(entry) = self.streams.get(stream_id) else {
                return;
            };
            if entry.to_viewer.try_send(bytes).is_ok() {
                entry.consecutive_overruns.store(0, Ordering::Relaxed);
                return;
            }
            entry.consecutive_overruns.fetch_add(1, Ordering::Relaxed) + 1
        };
        tracing::warn!(stream_id, overruns, "vnc viewer too slow, dropping frame");
        if overruns >= MAX_CONSECUTIVE_OVERRUNS {
            tracing::warn!(stream_id, "vnc stream overrun threshold exceeded, tearing down");
            self.close(registry, stream_id);
        }
    }

    pub fn close(&self, registry: &AgentRegistry, stream_id: &str) {
        if let Some((_, entry)) = self.streams.remove(stream_id) {
            if let Some(channel) = registry.get(&entry.agent_id) {
                let _ = channel.send(ControlPlaneToAgent::VncClose {
                    stream_id: stream_id.to_string(),
                });
            }
        }
    }

    /// Called when the Agent reports the stream closed from its side, or
    /// when the Agent disconnects entirely — no outbound `VncClose` is
    /// sent back in this direction.
    pub fn close_from_agent(&self, stream_id: &str) {
        self.streams.remove(stream_id);
    }

    pub fn close_all_for_agent(&self, agent_id: &AgentId) {
        self.streams.retain(|_, entry| &entry.agent_id != agent_id);
    }

    /// Number of currently open VNC streams, for `/metrics` (§6).
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_against_an_unregistered_agent_is_offline_not_a_timeout() {
        let proxy = VncProxy::new(8);
        let registry = AgentRegistry::new();
        let agent_id = AgentId::new();
        let session_id = SessionId::new();

        let err = proxy
            .open(&registry, &agent_id, &session_id, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, VncError::AgentOffline));
    }

    #[test]
    fn close_for_an_unknown_stream_is_a_no_op() {
        let proxy = VncProxy::new(8);
        let registry = AgentRegistry::new();
        proxy.close(&registry, "not-a-real-stream");
    }

    #[test]
    fn deliver_for_an_unknown_stream_is_dropped_silently() {
        let proxy = VncProxy::new(8);
        let registry = AgentRegistry::new();
        proxy.deliver_from_agent(&registry, "not-a-real-stream", vec![1, 2, 3]);
    }
}
