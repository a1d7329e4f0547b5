//! Azure Container App model
//!
//! The structural form of the `properties` block of a container app. Built
//! fresh per conversion and consumed by the renderer. Optional fields are
//! serialized as `null` rather than skipped so templates can test them.

use serde::{Deserialize, Serialize};

pub const DEFAULT_CPU: f64 = 0.25;
pub const DEFAULT_MEMORY: &str = "0.5Gi";
pub const ACTIVE_REVISIONS_MODE: &str = "Single";
pub const INGRESS_TRANSPORT: &str = "auto";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppProperties {
    pub configuration: ContainerAppConfiguration,
    pub template: ContainerAppTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppConfiguration {
    pub active_revisions_mode: String,
    pub ingress: Option<ContainerAppIngress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppIngress {
    pub external: bool,
    pub target_port: u16,
    pub transport: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerAppTemplate {
    pub containers: Vec<ContainerAppContainer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerAppContainer {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: Vec<ContainerAppEnv>,
    pub resources: ContainerAppResources,
    pub probes: Vec<ContainerAppProbe>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerAppEnv {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerAppResources {
    pub cpu: f64,
    pub memory: String,
}

impl Default for ContainerAppResources {
    fn default() -> Self {
        Self {
            cpu: DEFAULT_CPU,
            memory: DEFAULT_MEMORY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeType {
    Liveness,
    Readiness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppProbe {
    #[serde(rename = "type")]
    pub probe_type: ProbeType,
    pub http_get: ContainerAppHttpGet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppHttpGet {
    pub path: String,
    pub port: u16,
    /// `HTTP` or `HTTPS`; `None` leaves the platform default.
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub http_headers: Vec<ContainerAppHttpHeader>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerAppHttpHeader {
    pub name: String,
    pub value: String,
}
