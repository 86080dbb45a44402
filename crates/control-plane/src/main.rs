//! Process entry point: load configuration, wire the Store and the rest
//! of the Control Plane together, serve HTTP, and shut down gracefully.

use std::sync::Arc;
use streamspace_control_plane::config::Config;
use streamspace_control_plane::lifecycle::run_reconciler;
use streamspace_control_plane::{build_router, AppState};
use streamspace_storage::{MemoryStore, Migrator, NoopMigrator, Store};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration, refusing to start");
            std::process::exit(1);
        }
    };

    // No `DB_*` settings are recognized yet (§6): the in-process store is
    // the only backend this binary ships. `NoopMigrator` documents the
    // seam a SQL-backed `Store` would plug a real migration runner into.
    if let Err(err) = NoopMigrator.migrate().await {
        tracing::error!(%err, "migration failed");
        std::process::exit(1);
    }
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

    let reconciler_interval = config.reconciler_interval;
    let agent_lost_grace = config.agent_lost_grace;
    let bind_addr = config.bind_addr;

    let state = AppState::new(store.clone(), config);

    tokio::spawn(run_reconciler(
        state.lifecycle.clone(),
        store,
        state.registry.clone(),
        state.clock.clone(),
        reconciler_interval,
        agent_lost_grace,
    ));

    let router = build_router(state.clone());
    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, %bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(%bind_addr, "streamspaced listening");
    let drain = state.config.graceful_shutdown_drain;
    if let Err(err) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(drain))
        .await
    {
        tracing::error!(%err, "server exited with an error");
    }
}

async fn shutdown_signal(drain: std::time::Duration) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!(?drain, "shutdown signal received, draining in-flight requests");
    tokio::time::sleep(drain).await;
}
