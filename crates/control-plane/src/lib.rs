//! The StreamSpace Control Plane (§2, §4): session dispatch, Agent
//! coordination, and the viewer-facing HTTP/WebSocket surface. The
//! `streamspaced` binary is a thin wrapper around [`build_router`] and
//! [`AppState`].

pub mod api;
pub mod auth;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod vnc;

pub use api::build_router;
pub use config::Config;
pub use state::AppState;
