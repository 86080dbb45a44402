use crate::id::TemplateId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingProtocol {
    Vnc,
}

impl Default for StreamingProtocol {
    fn default() -> Self {
        Self::Vnc
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceDefaults {
    pub cpu_millicores: u32,
    pub memory_mib: u32,
    pub storage_mib: u32,
}

/// Immutable catalog descriptor. Referenced by `name@version` at session
/// create time and copied verbatim into the session record, so later
/// template edits never affect already-running sessions (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub version: String,
    pub container_image: String,
    pub resource_defaults: ResourceDefaults,
    pub protocol: StreamingProtocol,
    pub port: u16,
    pub path: String,
}

impl Template {
    pub fn reference(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}
