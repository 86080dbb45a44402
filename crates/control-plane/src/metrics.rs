//! `GET /metrics` (§6): a handful of live gauges read straight from the
//! Store and the in-memory registries, rendered in the Prometheus text
//! exposition format. No metrics framework is pulled in for this — one
//! small first-party module, the way the teacher keeps its own health/status
//! surface a plain struct rather than reaching for an external crate.

use crate::registry::AgentRegistry;
use crate::vnc::VncProxy;
use std::fmt::Write as _;
use streamspace_core::AgentStatus;
use streamspace_storage::{Store, StoreError};

struct Gauge {
    name: &'static str,
    help: &'static str,
    value: u64,
}

/// Queries the Store and the process-local registries for their current
/// counts and renders them as Prometheus text exposition. Only gauges — no
/// counters are kept in-process, so a restart never needs to reconcile a
/// stale counter against what the Store actually holds.
pub async fn render(store: &dyn Store, registry: &AgentRegistry, vnc: &VncProxy) -> Result<String, StoreError> {
    let agents = store.list_all_agents_unscoped().await?;
    let agents_online = agents
        .iter()
        .filter(|a| a.status == AgentStatus::Online)
        .count() as u64;
    let sessions_active = store.list_active_sessions().await?.len() as u64;

    let gauges = [
        Gauge {
            name: "streamspace_agents_registered",
            help: "Agents known to the Store, any status.",
            value: agents.len() as u64,
        },
        Gauge {
            name: "streamspace_agents_online",
            help: "Agents the Store reports as online.",
            value: agents_online,
        },
        Gauge {
            name: "streamspace_agents_connected",
            help: "Agents with a live control channel on this process.",
            value: registry.len() as u64,
        },
        Gauge {
            name: "streamspace_sessions_active",
            help: "Sessions not yet in a terminal observed state.",
            value: sessions_active,
        },
        Gauge {
            name: "streamspace_vnc_streams_open",
            help: "VNC viewer streams currently multiplexed over Agent channels.",
            value: vnc.len() as u64,
        },
    ];

    let mut out = String::new();
    for gauge in gauges {
        let _ = writeln!(out, "# HELP {} {}", gauge.name, gauge.help);
        let _ = writeln!(out, "# TYPE {} gauge", gauge.name);
        let _ = writeln!(out, "{} {}", gauge.name, gauge.value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamspace_storage::MemoryStore;

    #[tokio::test]
    async fn renders_zeroed_gauges_against_an_empty_store() {
        let store = MemoryStore::new();
        let registry = AgentRegistry::new();
        let vnc = VncProxy::new(8);

        let text = render(&store, &registry, &vnc).await.unwrap();

        assert!(text.contains("streamspace_agents_online 0"));
        assert!(text.contains("streamspace_sessions_active 0"));
        assert!(text.contains("streamspace_vnc_streams_open 0"));
    }
}
