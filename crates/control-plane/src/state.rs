//! Wires every long-lived component together once at startup. Handlers
//! reach all of it through a single `Arc<AppState>` axum `State`
//! extractor (§4.6).

use crate::channel::ChannelContext;
use crate::config::Config;
use crate::events::EventFanout;
use crate::lifecycle::LifecycleManager;
use crate::registry::AgentRegistry;
use crate::scheduler::{LeastLoadedScheduler, Scheduler};
use crate::vnc::VncProxy;
use std::sync::Arc;
use streamspace_core::{Clock, SystemClock};
use streamspace_storage::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: AgentRegistry,
    pub scheduler: Arc<dyn Scheduler>,
    pub events: Arc<EventFanout>,
    pub lifecycle: Arc<LifecycleManager>,
    pub vnc: VncProxy,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Arc<Self> {
        let config = Arc::new(config);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = AgentRegistry::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(LeastLoadedScheduler::new(store.clone()));
        let events = Arc::new(EventFanout::new());
        let vnc = VncProxy::new(config.vnc_buffer_frames);
        let lifecycle = Arc::new(LifecycleManager::new(
            store.clone(),
            registry.clone(),
            scheduler.clone(),
            events.clone(),
            config.clone(),
            clock.clone(),
        ));

        Arc::new(Self {
            store,
            registry,
            scheduler,
            events,
            lifecycle,
            vnc,
            config,
            clock,
        })
    }

    pub fn channel_context(&self) -> ChannelContext {
        ChannelContext {
            store: self.store.clone(),
            registry: self.registry.clone(),
            lifecycle: self.lifecycle.clone(),
            vnc: self.vnc.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}
