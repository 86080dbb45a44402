//! Agent selection (§4.3). Stateless: holds no reservations of its own —
//! quota and load correctness across concurrent selects is the Lifecycle
//! Manager's job, via the Store's transactional path. A pluggable
//! strategy is allowed but not required by §4.3; this crate ships the one
//! strategy the spec describes (least-loaded, tie-broken by most-recent
//! heartbeat) and leaves room for another `Scheduler` impl later.

use async_trait::async_trait;
use std::sync::Arc;
use streamspace_core::{AgentId, OrgScope, Platform};
use streamspace_storage::{Store, StoreError};

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Returns the Agent that should host a new session, or `None` if no
    /// eligible candidate exists (`NoCandidates`, §4.3).
    async fn select(
        &self,
        scope: &OrgScope,
        platform: Platform,
        required_cpu_millicores: u32,
        required_memory_mib: u32,
    ) -> Result<Option<AgentId>, StoreError>;
}

pub struct LeastLoadedScheduler {
    store: Arc<dyn Store>,
}

impl LeastLoadedScheduler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Scheduler for LeastLoadedScheduler {
    async fn select(
        &self,
        scope: &OrgScope,
        platform: Platform,
        required_cpu_millicores: u32,
        required_memory_mib: u32,
    ) -> Result<Option<AgentId>, StoreError> {
        // `list_eligible_agents` already orders by ascending load / most
        // recent heartbeat (§4.1); the admission check here only filters
        // out candidates whose last-reported capacity can't fit the
        // request (§4.3 step 2).
        let candidates = self.store.list_eligible_agents(scope, platform).await?;
        Ok(candidates
            .into_iter()
            .find(|agent| {
                agent
                    .capacity
                    .has_room_for(required_cpu_millicores, required_memory_mib)
            })
            .map(|agent| agent.agent_id))
    }
}
