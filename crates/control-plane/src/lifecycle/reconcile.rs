//! The background reconciler (§4.4 failure semantics, §5): a periodic
//! sweep over all active sessions and all agents, independent of any
//! single request. Three jobs share one tick so they share one snapshot
//! of "now":
//!
//! 1. agent-lost: an agent with no heartbeat in `agent_lost_grace` is
//!    marked offline and every session it hosts moves to `disconnected`.
//! 2. idle-hibernation: a `running` session whose `last_activity_at` is
//!    older than its `idle_timeout` gets a `Hibernate` command.
//! 3. redispatch: any session whose desired state has not yet been
//!    reflected in its observed state, and whose agent is now online,
//!    gets the corresponding command resent — covers `CreateSession`,
//!    `Hibernate`, `Wake`, and `DeleteSession` all failing to dispatch
//!    because the Agent was briefly offline (§4.4, spec'd generically
//!    across all four desired-state endpoints).

use super::LifecycleManager;
use crate::registry::AgentRegistry;
use std::sync::Arc;
use std::time::Duration;
use streamspace_core::{AgentStatus, Clock, DesiredState, ObservedState};
use streamspace_storage::Store;
use streamspace_wire::control::ControlPlaneToAgent;

pub async fn run_reconciler(
    lifecycle: Arc<LifecycleManager>,
    store: Arc<dyn Store>,
    registry: AgentRegistry,
    clock: Arc<dyn Clock>,
    interval: Duration,
    agent_lost_grace: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = clock.now();

        match store.list_all_agents_unscoped().await {
            Ok(agents) => {
                for agent in agents {
                    let stale = now
                        .signed_duration_since(agent.last_heartbeat)
                        .to_std()
                        .map(|age| age > agent_lost_grace)
                        .unwrap_or(false);
                    if stale && agent.status != AgentStatus::Offline {
                        tracing::warn!(agent_id = %agent.agent_id, "agent heartbeat lost, marking offline");
                        if let Err(err) = store
                            .set_agent_status(&agent.agent_id, AgentStatus::Offline, now)
                            .await
                        {
                            tracing::error!(%err, "failed to mark agent offline");
                            continue;
                        }
                        registry.remove(&agent.agent_id);
                        lifecycle.handle_agent_disconnected(&agent.agent_id).await;
                    }
                }
            }
            Err(err) => tracing::error!(%err, "reconciler failed to list agents"),
        }

        match store.list_active_sessions().await {
            Ok(sessions) => {
                for session in sessions {
                    if session.observed_state == ObservedState::Running && session.is_idle_past(now) {
                        tracing::info!(session_id = %session.id, "idle timeout reached, hibernating");
                        if let Some(channel) = registry.get(&session.agent_id) {
                            let _ = channel.send(ControlPlaneToAgent::Hibernate {
                                session_id: session.id.clone(),
                            });
                        }
                        continue;
                    }

                    let Some(channel) = registry.get(&session.agent_id) else {
                        continue;
                    };

                    match (session.desired_state, session.observed_state) {
                        (DesiredState::Running, ObservedState::Pending) => {
                            tracing::debug!(session_id = %session.id, "redispatching create to now-online agent");
                            match store.get_template_by_reference(&session.template_reference).await {
                                Ok(t) => {
                                    let _ = channel.send(ControlPlaneToAgent::CreateSession {
                                        session_id: session.id.clone(),
                                        template: streamspace_wire::control::TemplateWire {
                                            name: t.name,
                                            version: t.version,
                                            container_image: t.container_image,
                                            port: t.port,
                                            path: t.path,
                                        },
                                        resources: streamspace_wire::control::SessionResourcesWire {
                                            cpu_millicores: session.resources.cpu_millicores,
                                            memory_mib: session.resources.memory_mib,
                                            storage_mib: session.resources.storage_mib,
                                        },
                                        persistent_home: false,
                                        user_id: session.owner_user_id.clone(),
                                        org_id: session.organization_id.clone(),
                                    });
                                }
                                Err(err) => {
                                    tracing::error!(%err, session_id = %session.id, "redispatch: template vanished");
                                }
                            }
                        }
                        (DesiredState::Running, ObservedState::Hibernated) => {
                            tracing::debug!(session_id = %session.id, "redispatching wake to now-online agent");
                            let _ = channel.send(ControlPlaneToAgent::Wake {
                                session_id: session.id.clone(),
                            });
                        }
                        (DesiredState::Hibernated, ObservedState::Running) => {
                            tracing::debug!(session_id = %session.id, "redispatching hibernate to now-online agent");
                            let _ = channel.send(ControlPlaneToAgent::Hibernate {
                                session_id: session.id.clone(),
                            });
                        }
                        (DesiredState::Terminated, observed)
                            if !observed.is_terminal() && observed != ObservedState::Terminating =>
                        {
                            tracing::debug!(session_id = %session.id, "redispatching delete to now-online agent");
                            let _ = channel.send(ControlPlaneToAgent::DeleteSession {
                                session_id: session.id.clone(),
                            });
                        }
                        _ => {}
                    }
                }
            }
            Err(err) => tracing::error!(%err, "reconciler failed to list active sessions"),
        }
    }
}
