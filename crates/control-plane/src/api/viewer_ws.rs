//! The two viewer-facing WebSocket loops (§4.5, §4.6): raw VNC frame
//! relay and the per-user event stream. Both are thin pumps over channels
//! the rest of the crate already owns — no protocol logic lives here.

use crate::events::EventFanout;
use crate::registry::AgentRegistry;
use crate::vnc::VncProxy;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use streamspace_core::{AgentId, OrganizationId, SessionId, UserId};

pub async fn run_vnc_viewer(
    socket: WebSocket,
    vnc: VncProxy,
    registry: AgentRegistry,
    agent_id: AgentId,
    session_id: SessionId,
    open_timeout: Duration,
    keepalive: Duration,
) {
    let open = match vnc.open(&registry, &agent_id, &session_id, open_timeout).await {
        Ok(open) => open,
        Err(err) => {
            tracing::info!(%session_id, %err, "vnc stream open failed");
            return;
        }
    };
    let stream_id = open.stream_id;
    let mut from_agent = open.from_agent;

    let (mut sink, mut stream) = socket.split();

    let relay_task = tokio::spawn(async move {
        let mut ping_ticker = tokio::time::interval(keepalive);
        ping_ticker.tick().await;
        loop {
            tokio::select! {
                frame = from_agent.recv() => {
                    let Some(frame) = frame else { break };
                    if sink.send(Message::Binary(frame)).await.is_err() {
                        break;
                    }
                }
                _ = ping_ticker.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Any frame, including a bare Pong, counts as liveness; silence for
    // two keepalive intervals (one missed ping round-trip) means the
    // connection is dead (§4.5 stream overrun/teardown).
    loop {
        match tokio::time::timeout(keepalive * 2, stream.next()).await {
            Ok(Some(Ok(message))) => match message {
                Message::Binary(bytes) => vnc.send_to_agent(&registry, &stream_id, bytes),
                Message::Close(_) => break,
                _ => continue,
            },
            Ok(Some(Err(_))) | Ok(None) => break,
            Err(_) => {
                tracing::info!(%session_id, "vnc viewer missed keepalive, tearing down stream");
                break;
            }
        }
    }

    relay_task.abort();
    vnc.close(&registry, &stream_id);
}

pub async fn run_event_viewer(
    socket: WebSocket,
    events: Arc<EventFanout>,
    user_id: UserId,
    organization_id: OrganizationId,
    is_admin: bool,
    keepalive: Duration,
) {
    let mut subscription = events.subscribe(user_id, organization_id, is_admin);
    let (mut sink, mut stream) = socket.split();

    let forward_task = tokio::spawn(async move {
        let mut ping_ticker = tokio::time::interval(keepalive);
        ping_ticker.tick().await;
        loop {
            tokio::select! {
                envelope = subscription.receiver.recv() => {
                    let Some(envelope) = envelope else { break };
                    let Ok(text) = serde_json::to_string(&envelope) else { continue };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                _ = ping_ticker.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // The viewer never sends anything meaningful on this socket besides
    // control frames; drain it so a clean close is observed promptly and a
    // silently dropped connection is torn down after two missed keepalives.
    loop {
        match tokio::time::timeout(keepalive * 2, stream.next()).await {
            Ok(Some(Ok(message))) => {
                if matches!(message, Message::Close(_)) {
                    break;
                }
            }
            Ok(Some(Err(_))) | Ok(None) => break,
            Err(_) => {
                tracing::debug!("event viewer missed keepalive, closing");
                break;
            }
        }
    }

    forward_task.abort();
}
