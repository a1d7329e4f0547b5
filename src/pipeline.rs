//! Conversion Pipeline - Single Entry Point
//!
//! Normalize, inspect, map, render. Every stage runs for every conversion and
//! any fatal error aborts the workload with no partial manifest.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::hashing::{compute_input_hash, compute_manifest_hash};
use crate::mapping::create_container_app_properties;
use crate::normalize::{normalize_workload, FsReader, NormalizeError, SourceReader};
use crate::render::{ManifestRenderer, RenderError};
use crate::state::State;
use crate::validation::{Finding, FindingSeverity, Validator};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("workload '{0}' not found in state")]
    UnknownWorkload(String),

    #[error("workload: {workload}: {source}")]
    Normalize {
        workload: String,
        #[source]
        source: NormalizeError,
    },

    #[error("workload: {workload}: failed to convert to Bicep: {source}")]
    Render {
        workload: String,
        #[source]
        source: RenderError,
    },

    #[error("workload: {workload}: failed to hash normalized input: {source}")]
    Hash {
        workload: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConvertError {
    pub fn workload(&self) -> &str {
        match self {
            Self::UnknownWorkload(workload)
            | Self::Normalize { workload, .. }
            | Self::Render { workload, .. }
            | Self::Hash { workload, .. } => workload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedManifest {
    pub workload_name: String,
    pub engine_version: String,
    pub manifest: String,
    pub manifest_hash: String,
    pub input_hash: String,
    pub findings: Vec<Finding>,
}

/// The conversion pipeline - single entry point for turning workloads into manifests
pub struct ConversionPipeline {
    reader: Box<dyn SourceReader + Send + Sync>,
    validator: Validator,
    renderer: ManifestRenderer,
}

impl ConversionPipeline {
    pub fn new() -> Self {
        Self::with_reader(FsReader)
    }

    /// Use a custom byte source for file mounts that reference external files.
    pub fn with_reader(reader: impl SourceReader + Send + Sync + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            validator: Validator::new(),
            renderer: ManifestRenderer::new(),
        }
    }

    /// Convert one workload from the state into a Bicep manifest.
    pub fn convert_workload(
        &self,
        state: &State,
        workload_name: &str,
    ) -> Result<ConvertedManifest, ConvertError> {
        let record = state
            .workload(workload_name)
            .ok_or_else(|| ConvertError::UnknownWorkload(workload_name.to_string()))?;

        let normalized = normalize_workload(workload_name, record, state, self.reader.as_ref())
            .map_err(|source| ConvertError::Normalize {
                workload: workload_name.to_string(),
                source,
            })?;

        let findings = self.validator.inspect(&normalized);
        for finding in &findings {
            match finding.severity {
                FindingSeverity::Warning => {
                    warn!(workload = workload_name, rule = %finding.rule, "{}", finding.message)
                }
                FindingSeverity::Info => {
                    info!(workload = workload_name, rule = %finding.rule, "{}", finding.message)
                }
            }
        }

        let properties = create_container_app_properties(&normalized);
        let manifest = self
            .renderer
            .render_manifest(workload_name, &properties)
            .map_err(|source| ConvertError::Render {
                workload: workload_name.to_string(),
                source,
            })?;

        let input_hash = compute_input_hash(workload_name, &normalized, ENGINE_VERSION)
            .map_err(|source| ConvertError::Hash {
                workload: workload_name.to_string(),
                source,
            })?;
        let manifest_hash = compute_manifest_hash(&manifest);

        debug!(
            workload = workload_name,
            containers = properties.template.containers.len(),
            manifest_hash = %manifest_hash,
            "converted workload"
        );

        Ok(ConvertedManifest {
            workload_name: workload_name.to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            manifest,
            manifest_hash,
            input_hash,
            findings,
        })
    }

    /// Convert every workload in name order. A failing workload does not
    /// stop the others.
    pub fn convert_all(&self, state: &State) -> Vec<Result<ConvertedManifest, ConvertError>> {
        state
            .workload_names()
            .map(|name| self.convert_workload(state, name))
            .collect()
    }
}

impl Default for ConversionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert one workload with the default pipeline and return the manifest text.
pub fn convert_workload(state: &State, workload_name: &str) -> Result<String, ConvertError> {
    ConversionPipeline::new()
        .convert_workload(state, workload_name)
        .map(|converted| converted.manifest)
}
