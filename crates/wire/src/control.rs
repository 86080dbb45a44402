//! The Agent↔Control-Plane wire protocol (§4.2, §6). Framed JSON: every
//! message is `{"type": "...", "correlation_id": "...", "payload": {...}}`.
//! `VncData` bytes travel base64-encoded inside the JSON payload; a real
//! deployment may additionally accept binary WebSocket frames with the
//! fixed `{stream_id(16B), flags(2B), bytes...}` header for that one
//! message type, but every message this crate defines has one canonical
//! JSON shape so tests never need two codecs.

use crate::CorrelationId;
use serde::{Deserialize, Serialize};
use streamspace_core::{AgentId, OrganizationId, SessionId, UserId};

/// Wraps a tagged message with the correlation ID used to match a later
/// response to the request that caused it. `correlation_id` is `None` for
/// fire-and-forget messages (e.g. `VncData`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<M> {
    pub correlation_id: Option<CorrelationId>,
    #[serde(flatten)]
    pub message: M,
}

impl<M> Envelope<M> {
    pub fn new(message: M) -> Self {
        Self {
            correlation_id: None,
            message,
        }
    }

    pub fn with_correlation(message: M, correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapacityReport {
    pub max_concurrent_sessions: u32,
    pub active_sessions_count: u32,
    pub cpu_millicores_total: u32,
    pub memory_mib_total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResourcesWire {
    pub cpu_millicores: u32,
    pub memory_mib: u32,
    pub storage_mib: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateWire {
    pub name: String,
    pub version: String,
    pub container_image: String,
    pub port: u16,
    pub path: String,
}

/// Messages the Control Plane sends to an Agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlPlaneToAgent {
    AuthChallenge,
    AuthAccept,
    AuthReject {
        reason: String,
    },
    CreateSession {
        session_id: SessionId,
        template: TemplateWire,
        resources: SessionResourcesWire,
        persistent_home: bool,
        user_id: UserId,
        org_id: OrganizationId,
    },
    DeleteSession {
        session_id: SessionId,
    },
    Hibernate {
        session_id: SessionId,
    },
    Wake {
        session_id: SessionId,
    },
    VncOpen {
        stream_id: String,
        session_id: SessionId,
    },
    VncClose {
        stream_id: String,
    },
    VncData {
        stream_id: String,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
}

/// Messages an Agent sends to the Control Plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AgentToControlPlane {
    Register {
        agent_id: AgentId,
        platform: streamspace_core::Platform,
        region: String,
        capacity: CapacityReport,
        credential: String,
        /// Sessions the Agent currently believes it owns, re-reported on
        /// every (re)connect so the Lifecycle Manager can reconcile (§4.2).
        known_session_ids: Vec<SessionId>,
    },
    Heartbeat {
        status: streamspace_core::AgentStatus,
        capacity: CapacityReport,
        active_sessions_count: u32,
    },
    SessionStatus {
        session_id: SessionId,
        observed_state: streamspace_core::ObservedState,
        streaming_endpoint: Option<StreamingEndpointWire>,
        last_activity_at: Option<chrono::DateTime<chrono::Utc>>,
        error: Option<String>,
    },
    VncOpenAck {
        stream_id: String,
        ok: bool,
        error: Option<String>,
    },
    VncData {
        stream_id: String,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
    VncClose {
        stream_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingEndpointWire {
    pub protocol: streamspace_core::StreamingProtocol,
    pub port: u16,
    pub path: String,
}

mod base64_bytes {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_round_trips_through_json() {
        let msg = ControlPlaneToAgent::CreateSession {
            session_id: SessionId::new(),
            template: TemplateWire {
                name: "firefox-browser".into(),
                version: "1".into(),
                container_image: "ghcr.io/streamspace/firefox:1".into(),
                port: 5900,
                path: "/".into(),
            },
            resources: SessionResourcesWire {
                cpu_millicores: 500,
                memory_mib: 2048,
                storage_mib: 1024,
            },
            persistent_home: false,
            user_id: UserId::new(),
            org_id: OrganizationId::new(),
        };
        let envelope = Envelope::with_correlation(msg, CorrelationId::new());
        let json = serde_json::to_string(&envelope).expect("serializable");
        assert!(json.contains("\"type\":\"create_session\""));
        let decoded: Envelope<ControlPlaneToAgent> =
            serde_json::from_str(&json).expect("deserializable");
        assert!(decoded.correlation_id.is_some());
    }

    #[test]
    fn vnc_data_bytes_round_trip_through_base64() {
        let msg = AgentToControlPlane::VncData {
            stream_id: "abc".into(),
            bytes: vec![0, 1, 2, 255],
        };
        let json = serde_json::to_string(&msg).expect("serializable");
        let decoded: AgentToControlPlane = serde_json::from_str(&json).expect("deserializable");
        let AgentToControlPlane::VncData { bytes, .. } = decoded else {
            unreachable!("decoded value must be the variant just encoded");
        };
        assert_eq!(bytes, vec![0, 1, 2, 255]);
    }
}
