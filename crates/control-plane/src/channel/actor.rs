//! The per-connection Agent channel actor (§4.2). One instance runs for
//! the lifetime of one Agent WebSocket: it authenticates the Agent,
//! registers it, then loops reading inbound frames until the socket
//! closes or the heartbeat grace period lapses.

use super::handle::ChannelHandle;
use super::pending::PendingAcks;
use crate::config::Config;
use crate::lifecycle::LifecycleManager;
use crate::registry::AgentRegistry;
use crate::vnc::VncProxy;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use streamspace_core::{Agent, AgentStatus, Capacity, Clock};
use streamspace_storage::Store;
use streamspace_wire::control::{ControlPlaneToAgent, StreamingEndpointWire};
use streamspace_wire::{AgentToControlPlane, Envelope};
use tokio::sync::mpsc;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
pub struct ChannelContext {
    pub store: Arc<dyn Store>,
    pub registry: AgentRegistry,
    pub lifecycle: Arc<LifecycleManager>,
    pub vnc: VncProxy,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
}

/// Drives one Agent connection end to end. Never panics on malformed
/// input — a bad frame is logged and the connection is dropped, the
/// Agent is expected to reconnect (§4.2 recovery semantics).
pub async fn run_channel(socket: WebSocket, ctx: ChannelContext) {
    let (mut sink, mut stream) = socket.split();
    let handshake_pending = PendingAcks::default();

    let register = match recv_typed(&mut stream, ctx.config.heartbeat_grace(), &handshake_pending).await {
        Some(AgentToControlPlane::Register {
            agent_id,
            platform,
            region,
            capacity,
            credential,
            known_session_ids,
        }) => (agent_id, platform, region, capacity, credential, known_session_ids),
        _ => {
            tracing::warn!("agent channel closed before a register message arrived");
            return;
        }
    };
    let (agent_id, platform, region, capacity, credential, known_session_ids) = register;

    if credential != ctx.config.agent_shared_secret {
        tracing::warn!(%agent_id, "agent presented an invalid credential");
        let reject = Envelope::new(ControlPlaneToAgent::AuthReject {
            reason: "invalid credential".into(),
        });
        let _ = send_envelope(&mut sink, &reject).await;
        return;
    }

    let now = ctx.clock.now();
    let agent = Agent {
        agent_id: agent_id.clone(),
        organization_id: None,
        platform,
        region,
        status: AgentStatus::Online,
        capacity: Capacity {
            max_concurrent_sessions: capacity.max_concurrent_sessions,
            active_sessions_count: capacity.active_sessions_count,
            cpu_millicores_total: capacity.cpu_millicores_total,
            memory_mib_total: capacity.memory_mib_total,
        },
        last_heartbeat: now,
        credential_fingerprint: String::new(),
    };
    if let Err(err) = ctx.store.upsert_agent(agent).await {
        tracing::error!(%agent_id, %err, "failed to persist connecting agent");
        return;
    }

    if let Ok(hosted) = ctx.store.list_sessions_for_agent(&agent_id).await {
        for session in hosted {
            if !session.observed_state.is_terminal() && !known_session_ids.contains(&session.id) {
                tracing::warn!(session_id = %session.id, %agent_id, "agent reconnected without knowledge of a session it was hosting");
            }
        }
    }

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope<ControlPlaneToAgent>>();
    let pending = Arc::new(PendingAcks::default());
    let channel_id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed);
    let handle = ChannelHandle::new(channel_id, outbound_tx, pending.clone());

    let previous = ctx.registry.insert(agent_id.clone(), handle.clone());
    if previous.is_some() {
        tracing::info!(%agent_id, "replacing a previous channel for this agent");
    }

    let accept = Envelope::new(ControlPlaneToAgent::AuthAccept);
    if send_envelope(&mut sink, &accept).await.is_err() {
        ctx.registry.remove_if_current(&agent_id, &handle);
        return;
    }

    let outbound_task = tokio::spawn(async move {
        while let Some(envelope) = outbound_rx.recv().await {
            let Ok(text) = serde_json::to_string(&envelope) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    tracing::info!(%agent_id, "agent channel established");
    inbound_loop(&mut stream, &ctx, &agent_id, &pending, &handle).await;

    outbound_task.abort();
    let still_current = ctx.registry.remove_if_current(&agent_id, &handle);
    pending.cancel_all();
    if still_current {
        ctx.vnc.close_all_for_agent(&agent_id);
        let disconnect_at = ctx.clock.now();
        if let Err(err) = ctx
            .store
            .set_agent_status(&agent_id, AgentStatus::Offline, disconnect_at)
            .await
        {
            tracing::error!(%agent_id, %err, "failed to mark disconnected agent offline");
        }
        ctx.lifecycle.handle_agent_disconnected(&agent_id).await;
    } else {
        tracing::debug!(%agent_id, "channel superseded by a newer registration; skipping offline cleanup");
    }
    tracing::info!(%agent_id, "agent channel closed");
}

async fn send_envelope(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    envelope: &Envelope<ControlPlaneToAgent>,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(envelope).map_err(axum::Error::new)?;
    sink.send(Message::Text(text)).await
}

async fn inbound_loop(
    stream: &mut futures_util::stream::SplitStream<WebSocket>,
    ctx: &ChannelContext,
    agent_id: &streamspace_core::AgentId,
    pending: &PendingAcks,
    handle: &ChannelHandle,
) {
    loop {
        tokio::select! {
            message = recv_typed(stream, ctx.config.heartbeat_grace(), pending) => {
                let Some(message) = message else { return };
                handle_inbound(ctx, agent_id, message).await;
            }
            _ = handle.wait_closed() => {
                tracing::info!(%agent_id, "channel superseded by a newer registration for this agent, closing");
                return;
            }
        }
    }
}

async fn handle_inbound(
    ctx: &ChannelContext,
    agent_id: &streamspace_core::AgentId,
    message: AgentToControlPlane,
) {
    match message {
        AgentToControlPlane::Heartbeat {
            status,
            capacity,
            active_sessions_count: _,
        } => {
            let now = ctx.clock.now();
            let capacity = Capacity {
                max_concurrent_sessions: capacity.max_concurrent_sessions,
                active_sessions_count: capacity.active_sessions_count,
                cpu_millicores_total: capacity.cpu_millicores_total,
                memory_mib_total: capacity.memory_mib_total,
            };
            if let Err(err) = ctx.store.record_heartbeat(agent_id, capacity, now).await {
                tracing::error!(%agent_id, %err, "failed to record heartbeat");
            }
            if status != AgentStatus::Online {
                if let Err(err) = ctx.store.set_agent_status(agent_id, status, now).await {
                    tracing::error!(%agent_id, %err, "failed to apply reported agent status");
                }
            }
        }
        AgentToControlPlane::SessionStatus {
            session_id,
            observed_state,
            streaming_endpoint,
            last_activity_at,
            error,
        } => {
            let endpoint = streaming_endpoint.map(convert_endpoint);
            ctx.lifecycle
                .handle_session_status(agent_id, session_id, observed_state, endpoint, last_activity_at, error)
                .await;
        }
        AgentToControlPlane::VncOpenAck { stream_id, ok, error } => {
            tracing::debug!(%stream_id, ok, ?error, "vnc_open_ack received, resolved via pending-ack map");
        }
        AgentToControlPlane::VncData { stream_id, bytes } => {
            ctx.vnc.deliver_from_agent(&ctx.registry, &stream_id, bytes);
        }
        AgentToControlPlane::VncClose { stream_id } => {
            ctx.vnc.close_from_agent(&stream_id);
        }
        AgentToControlPlane::Register { .. } => {
            tracing::warn!(%agent_id, "ignoring a second register message on an established channel");
        }
    }
}

fn convert_endpoint(wire: StreamingEndpointWire) -> streamspace_core::StreamingEndpoint {
    streamspace_core::StreamingEndpoint {
        protocol: wire.protocol,
        port: wire.port,
        path: wire.path,
    }
}

async fn recv_typed(
    stream: &mut futures_util::stream::SplitStream<WebSocket>,
    heartbeat_grace: std::time::Duration,
    pending: &PendingAcks,
) -> Option<AgentToControlPlane> {
    loop {
        let next = tokio::time::timeout(heartbeat_grace, stream.next()).await;
        let message = match next {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(err))) => {
                tracing::debug!(%err, "agent websocket read error");
                return None;
            }
            Ok(None) => return None,
            Err(_) => {
                tracing::warn!("agent channel missed its heartbeat grace period");
                return None;
            }
        };

        match message {
            Message::Text(text) => {
                let envelope: Envelope<AgentToControlPlane> = match serde_json::from_str(&text) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        tracing::warn!(%err, "dropping malformed frame from agent");
                        continue;
                    }
                };
                if let Some(correlation_id) = &envelope.correlation_id {
                    pending.resolve(correlation_id, envelope.message.clone());
                }
                return Some(envelope.message);
            }
            Message::Binary(_) => continue,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return None,
        }
    }
}
