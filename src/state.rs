//! Provisioning State - Read-Only Input
//!
//! Workloads and the resources primed for them, as recorded by whatever ran
//! provisioning before conversion. Nothing here is ever written back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::workload::{ResourceSpec, Workload};

pub const DEFAULT_RESOURCE_CLASS: &str = "default";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse state file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Deterministic identifier of a primed resource: `<type>.<class>#<id>`.
///
/// Resources without an explicit id are scoped to their workload, so the id
/// falls back to `<workload>.<resource>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUid(String);

impl ResourceUid {
    pub fn new(
        workload_name: &str,
        resource_name: &str,
        kind: &str,
        class: Option<&str>,
        id: Option<&str>,
    ) -> Self {
        let class = class.unwrap_or(DEFAULT_RESOURCE_CLASS);
        match id {
            Some(id) => Self(format!("{kind}.{class}#{id}")),
            None => Self(format!("{kind}.{class}#{workload_name}.{resource_name}")),
        }
    }

    pub fn for_resource(workload_name: &str, resource_name: &str, spec: &ResourceSpec) -> Self {
        Self::new(
            workload_name,
            resource_name,
            &spec.kind,
            spec.class.as_deref(),
            spec.id.as_deref(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resource after priming: its final params and the outputs that
/// `${resources.<name>.*}` references resolve against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimedResource {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(default)]
    pub outputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_workload: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    pub spec: Workload,
    /// File the workload was loaded from; relative file sources resolve
    /// against its directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub workloads: BTreeMap<String, WorkloadRecord>,
    #[serde(default)]
    pub resources: BTreeMap<ResourceUid, PrimedResource>,
}

impl State {
    /// Load a state document. JSON is accepted as well, being a YAML subset.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let content = fs::read_to_string(path).map_err(|source| StateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn workload(&self, name: &str) -> Option<&WorkloadRecord> {
        self.workloads.get(name)
    }

    pub fn workload_names(&self) -> impl Iterator<Item = &str> {
        self.workloads.keys().map(String::as_str)
    }
}

/// Lookup from resource identifier to primed resource.
pub trait ResourceLookup {
    fn primed(&self, uid: &ResourceUid) -> Option<&PrimedResource>;
}

impl ResourceLookup for State {
    fn primed(&self, uid: &ResourceUid) -> Option<&PrimedResource> {
        self.resources.get(uid)
    }
}

impl ResourceLookup for BTreeMap<ResourceUid, PrimedResource> {
    fn primed(&self, uid: &ResourceUid) -> Option<&PrimedResource> {
        self.get(uid)
    }
}
