//! Centralizes every `std::env::var` read in the crate, following the
//! teacher's `env.rs` idiom: nothing else in this crate touches `std::env`
//! directly, so the full set of recognized configuration is readable in
//! one place (§6).

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} is invalid: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: std::net::SocketAddr,
    pub jwt_secret: String,
    pub agent_shared_secret: String,
    pub cors_allowed_origins: Vec<String>,
    pub allowed_websocket_origins: Vec<String>,
    pub heartbeat_interval: Duration,
    pub heartbeat_grace_factor: u32,
    pub command_ack_timeout: Duration,
    pub idle_timeout_default: Option<Duration>,
    pub agent_lost_grace: Duration,
    pub reconciler_interval: Duration,
    pub max_request_bytes: usize,
    pub vnc_buffer_frames: usize,
    pub vnc_stream_keepalive: Duration,
    pub graceful_shutdown_drain: Duration,
}

fn env_var(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    match env_var(name) {
        None => Ok(Duration::from_secs(default_secs)),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid(name, e.to_string())),
    }
}

fn parse_list(name: &'static str) -> Vec<String> {
    env_var(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl Config {
    /// Reads configuration from the environment. Fatal errors here
    /// (missing `JWT_SECRET`, invalid bind address) should terminate the
    /// process with a clear message before anything else starts (§7).
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env_var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "JWT_SECRET",
                "must be at least 32 characters".into(),
            ));
        }

        let agent_shared_secret =
            env_var("AGENT_SHARED_SECRET").ok_or(ConfigError::Missing("AGENT_SHARED_SECRET"))?;

        let bind_addr = env_var("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid("BIND_ADDR", e.to_string()))?;

        let heartbeat_interval = parse_duration_secs("HEARTBEAT_INTERVAL_SECONDS", 30)?;
        let heartbeat_grace_factor = env_var("HEARTBEAT_GRACE_FACTOR")
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .map_err(|e| ConfigError::Invalid("HEARTBEAT_GRACE_FACTOR", e.to_string()))?
            .unwrap_or(2);

        let idle_timeout_default = match env_var("IDLE_TIMEOUT_DEFAULT") {
            None => None,
            Some(raw) if raw == "0" => None,
            Some(raw) => Some(Duration::from_secs(
                raw.parse::<u64>()
                    .map_err(|e| ConfigError::Invalid("IDLE_TIMEOUT_DEFAULT", e.to_string()))?,
            )),
        };

        let agent_lost_minutes = env_var("AGENT_LOST_MINUTES")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .map_err(|e| ConfigError::Invalid("AGENT_LOST_MINUTES", e.to_string()))?
            .unwrap_or(30);

        let max_request_bytes = env_var("MAX_REQUEST_BYTES")
            .map(|raw| raw.parse::<usize>())
            .transpose()
            .map_err(|e| ConfigError::Invalid("MAX_REQUEST_BYTES", e.to_string()))?
            .unwrap_or(10 * 1024 * 1024);

        Ok(Self {
            bind_addr,
            jwt_secret,
            agent_shared_secret,
            cors_allowed_origins: parse_list("CORS_ALLOWED_ORIGINS"),
            allowed_websocket_origins: parse_list("ALLOWED_WEBSOCKET_ORIGIN"),
            heartbeat_interval,
            heartbeat_grace_factor,
            command_ack_timeout: parse_duration_secs("COMMAND_ACK_TIMEOUT_SECONDS", 10)?,
            idle_timeout_default,
            agent_lost_grace: Duration::from_secs(agent_lost_minutes * 60),
            reconciler_interval: parse_duration_secs("RECONCILER_INTERVAL_SECONDS", 15)?,
            max_request_bytes,
            vnc_buffer_frames: 64,
            vnc_stream_keepalive: Duration::from_secs(30),
            graceful_shutdown_drain: Duration::from_secs(30),
        })
    }

    pub fn heartbeat_grace(&self) -> Duration {
        self.heartbeat_interval * self.heartbeat_grace_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_splits_and_trims() {
        std::env::set_var("TEST_LIST_VAR", "a, b ,c");
        assert_eq!(parse_list("TEST_LIST_VAR"), vec!["a", "b", "c"]);
        std::env::remove_var("TEST_LIST_VAR");
    }
}
