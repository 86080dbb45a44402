//! Internal publish/subscribe fabric (§4.6/§4.7). Producers (Lifecycle
//! Manager, Scheduler callers, Agent Registry) publish a [`Published`]
//! event; delivery is best-effort, at-most-once per live subscriber — a
//! disconnected subscriber simply misses events and reloads state on
//! reconnect, per §4.7.

use dashmap::DashMap;
use std::sync::Arc;
use streamspace_core::{OrganizationId, UserId};
use streamspace_wire::{ViewerEvent, ViewerEventEnvelope};
use tokio::sync::mpsc;

const SUBSCRIBER_BUFFER: usize = 256;

/// An event plus the routing facts the fan-out needs that aren't part of
/// the wire payload itself.
pub struct Published {
    pub organization_id: OrganizationId,
    pub target_user_id: Option<UserId>,
    pub event: ViewerEvent,
}

struct Subscriber {
    organization_id: OrganizationId,
    is_admin: bool,
    tx: mpsc::Sender<ViewerEventEnvelope>,
}

/// One entry per open event WebSocket (`GET /ws`, §4.6). A user with
/// multiple tabs open has multiple entries under the same `user_id`.
#[derive(Clone, Default)]
pub struct EventFanout {
    subscribers: Arc<DashMap<(UserId, u64), Subscriber>>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
}

pub struct Subscription {
    pub user_id: UserId,
    key: u64,
    pub receiver: mpsc::Receiver<ViewerEventEnvelope>,
    fanout: EventFanout,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.fanout.subscribers.remove(&(self.user_id.clone(), self.key));
    }
}

impl EventFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        is_admin: bool,
    ) -> Subscription {
        let key = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.insert(
            (user_id.clone(), key),
            Subscriber {
                organization_id,
                is_admin,
                tx,
            },
        );
        Subscription {
            user_id,
            key,
            receiver: rx,
            fanout: self.clone(),
        }
    }

    /// Delivers `published` to every live subscriber in scope. Two-phase,
    /// per the slow-consumer design note (§9): collect doomed (full)
    /// subscribers while only holding read access to each shard, then
    /// remove them in a second pass — `DashMap`'s sharded locking already
    /// gives us this without a second explicit lock, since iteration here
    /// never mutates the map.
    pub fn publish(&self, published: Published) {
        let admin_only = published.event.admin_only();
        let mut overflowing = Vec::new();

        for entry in self.subscribers.iter() {
            let (user_id, key) = entry.key().clone();
            let subscriber = entry.value();
            if subscriber.organization_id != published.organization_id {
                continue;
            }
            if admin_only && !subscriber.is_admin {
                continue;
            }
            if let Some(target) = &published.target_user_id {
                if target != &user_id {
                    continue;
                }
            }

            let envelope = ViewerEventEnvelope {
                organization_id: published.organization_id.clone(),
                event: published.event.clone(),
            };
            if subscriber.tx.try_send(envelope).is_err() {
                overflowing.push((user_id, key));
            }
        }

        for key in overflowing {
            if self.subscribers.remove(&key).is_some() {
                tracing::warn!(user_id = %key.0, "dropping slow event subscriber, send buffer full");
            }
        }
    }
}
