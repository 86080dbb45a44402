//! Owns the session state machine and all mutation paths (§4.4).

mod reconcile;

pub use reconcile::run_reconciler;

use crate::auth::RequestContext;
use crate::channel::ChannelError;
use crate::config::Config;
use crate::error::ApiError;
use crate::events::{EventFanout, Published};
use crate::registry::AgentRegistry;
use crate::scheduler::Scheduler;
use chrono::Utc;
use std::sync::Arc;
use streamspace_core::{
    AuditRecordBuilder, Clock, DesiredState, ObservedState, Platform, QuotaLimits, Session,
    SessionId, StreamingEndpoint,
};
use streamspace_storage::Store;
use streamspace_wire::api::{CreateSessionRequest, ResourceRequestDto};
use streamspace_wire::control::{ControlPlaneToAgent, SessionResourcesWire, TemplateWire};
use streamspace_wire::event::ViewerEvent;

pub struct LifecycleManager {
    store: Arc<dyn Store>,
    registry: AgentRegistry,
    scheduler: Arc<dyn Scheduler>,
    events: Arc<EventFanout>,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn Store>,
        registry: AgentRegistry,
        scheduler: Arc<dyn Scheduler>,
        events: Arc<EventFanout>,
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            scheduler,
            events,
            config,
            clock,
        }
    }

    /// The create flow from §4.4: validate, reserve quota + pick agent +
    /// insert + audit atomically, then dispatch `CreateSession`
    /// best-effort — the API response does not wait on the Agent's ack.
    pub async fn create_session(
        &self,
        ctx: &RequestContext,
        req: CreateSessionRequest,
    ) -> Result<Session, ApiError> {
        let scope = ctx.scope();
        let template = self
            .store
            .get_template_by_reference(&req.template)
            .await
            .map_err(|_| ApiError::Validation(format!("unknown template {}", req.template)))?;

        let resources = req.resources.unwrap_or(ResourceRequestDto {
            cpu_millicores: template.resource_defaults.cpu_millicores,
            memory_mib: template.resource_defaults.memory_mib,
            storage_mib: template.resource_defaults.storage_mib,
        });

        if let Err(err) = self
            .store
            .ensure_quota(&scope, &ctx.user_id, QuotaLimits::default())
            .await
        {
            self.audit(&ctx.organization_id, Some(&ctx.user_id), "session.create", req.template.clone(), false, Some("quota_exceeded".into()))
                .await;
            return Err(ApiError::from(err));
        }

        let platform = Platform::Kubernetes;
        let agent_id = match self
            .scheduler
            .select(&scope, platform, resources.cpu_millicores, resources.memory_mib)
            .await
        {
            Ok(Some(agent_id)) => agent_id,
            Ok(None) => {
                self.audit(&ctx.organization_id, Some(&ctx.user_id), "session.create", req.template.clone(), false, Some("no_candidates".into()))
                    .await;
                return Err(ApiError::NoCandidates);
            }
            Err(err) => {
                self.audit(&ctx.organization_id, Some(&ctx.user_id), "session.create", req.template.clone(), false, Some(err.to_string()))
                    .await;
                return Err(ApiError::from(err));
            }
        };

        let now = self.clock.now();
        let idle_timeout = req
            .idle_timeout_seconds
            .map(std::time::Duration::from_secs)
            .or(self.config.idle_timeout_default);

        let session = Session {
            id: SessionId::new(),
            organization_id: ctx.organization_id.clone(),
            owner_user_id: ctx.user_id.clone(),
            template_id: template.id.clone(),
            template_reference: template.reference(),
            agent_id: agent_id.clone(),
            desired_state: DesiredState::Running,
            observed_state: ObservedState::Pending,
            resources: streamspace_core::ResourceRequest {
                cpu_millicores: resources.cpu_millicores,
                memory_mib: resources.memory_mib,
                storage_mib: resources.storage_mib,
            },
            streaming_endpoint: None,
            idle_timeout,
            last_activity_at: now,
            created_at: now,
            updated_at: now,
            last_error: None,
        };

        let audit = AuditRecordBuilder::new(
            ctx.organization_id.clone(),
            "session.create",
            "session",
            session.id.to_string(),
        )
        .actor(ctx.user_id.clone())
        .after(serde_json::json!({"template": session.template_reference, "agent_id": agent_id.to_string()}))
        .build(now);

        let created = match self
            .store
            .reserve_and_create_session(&scope, &ctx.user_id, session, audit)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                self.audit(&ctx.organization_id, Some(&ctx.user_id), "session.create", req.template.clone(), false, Some(err.to_string()))
                    .await;
                return Err(ApiError::from(err));
            }
        };

        self.dispatch_create(&created, &template, req.persistent_home.unwrap_or(false))
            .await;

        Ok(created)
    }

    async fn dispatch_create(
        &self,
        session: &Session,
        template: &streamspace_core::Template,
        persistent_home: bool,
    ) {
        let Some(channel) = self.registry.get(&session.agent_id) else {
            tracing::warn!(session_id = %session.id, "agent offline at dispatch time, reconciler will retry");
            return;
        };
        let message = ControlPlaneToAgent::CreateSession {
            session_id: session.id.clone(),
            template: TemplateWire {
                name: template.name.clone(),
                version: template.version.clone(),
                container_image: template.container_image.clone(),
                port: template.port,
                path: template.path.clone(),
            },
            resources: SessionResourcesWire {
                cpu_millicores: session.resources.cpu_millicores,
                memory_mib: session.resources.memory_mib,
                storage_mib: session.resources.storage_mib,
            },
            persistent_home,
            user_id: session.owner_user_id.clone(),
            org_id: session.organization_id.clone(),
        };
        if let Err(err) = channel
            .send_awaiting_ack(message, self.config.command_ack_timeout)
            .await
        {
            tracing::warn!(session_id = %session.id, error = %err, "create_session dispatch did not ack in time");
        }
    }

    pub async fn get_session(
        &self,
        ctx: &RequestContext,
        session_id: &SessionId,
    ) -> Result<Session, ApiError> {
        match self.store.get_session_for_org(&ctx.scope(), session_id).await {
            Ok(session) => Ok(session),
            Err(err) => {
                self.audit(&ctx.organization_id, Some(&ctx.user_id), "session.read", session_id.to_string(), false, Some(err.to_string()))
                    .await;
                Err(ApiError::from(err))
            }
        }
    }

    pub async fn list_sessions(&self, ctx: &RequestContext) -> Result<Vec<Session>, ApiError> {
        self.store
            .list_sessions_for_user(&ctx.scope(), &ctx.user_id)
            .await
            .map_err(ApiError::from)
    }

    pub async fn delete_session(
        &self,
        ctx: &RequestContext,
        session_id: &SessionId,
    ) -> Result<Session, ApiError> {
        let scope = ctx.scope();
        let session = match self
            .store
            .set_desired_state(&scope, session_id, DesiredState::Terminated)
            .await
        {
            Ok(session) => session,
            Err(err) => {
                self.audit(&ctx.organization_id, Some(&ctx.user_id), "session.delete", session_id.to_string(), false, Some(err.to_string()))
                    .await;
                return Err(ApiError::from(err));
            }
        };

        self.audit(&ctx.organization_id, Some(&ctx.user_id), "session.delete", session_id.to_string(), true, None)
            .await;
        self.dispatch_simple(&session, ControlPlaneToAgent::DeleteSession {
            session_id: session_id.clone(),
        })
        .await;
        Ok(session)
    }

    pub async fn hibernate_session(
        &self,
        ctx: &RequestContext,
        session_id: &SessionId,
    ) -> Result<Session, ApiError> {
        self.mutate_desired(ctx, session_id, DesiredState::Hibernated, "session.hibernate", |id| {
            ControlPlaneToAgent::Hibernate { session_id: id }
        })
        .await
    }

    pub async fn wake_session(
        &self,
        ctx: &RequestContext,
        session_id: &SessionId,
    ) -> Result<Session, ApiError> {
        self.mutate_desired(ctx, session_id, DesiredState::Running, "session.wake", |id| {
            ControlPlaneToAgent::Wake { session_id: id }
        })
        .await
    }

    async fn mutate_desired(
        &self,
        ctx: &RequestContext,
        session_id: &SessionId,
        desired: DesiredState,
        action: &'static str,
        command: impl FnOnce(SessionId) -> ControlPlaneToAgent,
    ) -> Result<Session, ApiError> {
        let scope = ctx.scope();
        let session = match self.store.set_desired_state(&scope, session_id, desired).await {
            Ok(session) => session,
            Err(err) => {
                self.audit(&ctx.organization_id, Some(&ctx.user_id), action, session_id.to_string(), false, Some(err.to_string()))
                    .await;
                return Err(ApiError::from(err));
            }
        };
        self.audit(&ctx.organization_id, Some(&ctx.user_id), action, session_id.to_string(), true, None)
            .await;
        self.dispatch_simple(&session, command(session_id.clone())).await;
        Ok(session)
    }

    async fn dispatch_simple(&self, session: &Session, message: ControlPlaneToAgent) {
        let Some(channel) = self.registry.get(&session.agent_id) else {
            tracing::info!(session_id = %session.id, "agent offline, desired state recorded for reconciler");
            return;
        };
        if let Err(err) = channel.send(message) {
            tracing::warn!(session_id = %session.id, error = %err, "failed to dispatch command to agent");
        }
    }

    /// Applies a `SessionStatus` report from an Agent (§4.2/§4.4). Illegal
    /// transitions are dropped and logged, never propagated as an error to
    /// the Agent (the wire protocol has no ack for `SessionStatus`).
    pub async fn handle_session_status(
        &self,
        reporting_agent: &streamspace_core::AgentId,
        session_id: SessionId,
        observed_state: ObservedState,
        streaming_endpoint: Option<StreamingEndpoint>,
        last_activity_at: Option<chrono::DateTime<Utc>>,
        error: Option<String>,
    ) {
        let Ok(existing) = self.store.get_session_unscoped(&session_id).await else {
            tracing::warn!(%session_id, "status report for unknown session");
            return;
        };

        if &existing.agent_id != reporting_agent {
            tracing::warn!(%session_id, reporting_agent = %reporting_agent, owner = %existing.agent_id, "status report from non-owning agent ignored");
            return;
        }

        let scope = streamspace_core::OrgScope::new(existing.organization_id.clone());
        let now = self.clock.now();
        match self
            .store
            .apply_session_transition(
                &scope,
                &session_id,
                observed_state,
                now,
                streaming_endpoint,
                last_activity_at,
                error.clone(),
            )
            .await
        {
            Ok(session) => {
                self.events.publish(Published {
                    organization_id: session.organization_id.clone(),
                    target_user_id: Some(session.owner_user_id.clone()),
                    event: ViewerEvent::SessionStatus {
                        session_id: session.id.clone(),
                        observed_state: session.observed_state,
                        error: session.last_error.clone(),
                    },
                });
                if session.observed_state.is_terminal() {
                    self.audit(&session.organization_id, None, "session.status", session.id.to_string(), true, error)
                        .await;
                }
            }
            Err(err) => {
                tracing::debug!(%session_id, %err, "dropped illegal observed-state transition");
            }
        }
    }

    /// Agent Registry → Lifecycle Manager hook for a disconnect (§2/§4.2):
    /// every session hosted by `agent_id` moves to `disconnected`,
    /// preserving desired state.
    pub async fn handle_agent_disconnected(&self, agent_id: &streamspace_core::AgentId) {
        let now = self.clock.now();
        let Ok(sessions) = self.store.list_sessions_for_agent(agent_id).await else {
            return;
        };
        for session in sessions {
            if session.observed_state.is_terminal() {
                continue;
            }
            let scope = streamspace_core::OrgScope::new(session.organization_id.clone());
            if let Ok(updated) = self
                .store
                .apply_session_transition(&scope, &session.id, ObservedState::Disconnected, now, None, None, None)
                .await
            {
                self.events.publish(Published {
                    organization_id: updated.organization_id.clone(),
                    target_user_id: Some(updated.owner_user_id.clone()),
                    event: ViewerEvent::SessionStatus {
                        session_id: updated.id,
                        observed_state: updated.observed_state,
                        error: None,
                    },
                });
            }
        }
    }

    async fn audit(
        &self,
        organization_id: &streamspace_core::OrganizationId,
        actor: Option<&streamspace_core::UserId>,
        action: &'static str,
        resource_id: impl Into<String>,
        allowed: bool,
        reason: Option<String>,
    ) {
        let mut builder = AuditRecordBuilder::new(organization_id.clone(), action, "session", resource_id.into());
        if let Some(actor) = actor {
            builder = builder.actor(actor.clone());
        }
        if !allowed {
            builder = builder.denied(reason.unwrap_or_default());
        }
        let record = builder.build(self.clock.now());
        if let Err(err) = self.store.append_audit(record).await {
            tracing::error!(%err, "failed to append audit record");
        }
    }
}

impl From<ChannelError> for ApiError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => ApiError::AgentUnavailable,
            ChannelError::Timeout => ApiError::Timeout,
        }
    }
}
