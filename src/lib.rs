//! score-aca Core - Score Workloads to Azure Container Apps
//!
//! # Conversion Guarantees
//! 1. References Resolve Before Mapping
//! 2. Resources Must Be Primed
//! 3. Unsupported Input Is Reported, Never Silently Fatal
//! 4. Deterministic Output
//! 5. The Input Specification Is Never Mutated

pub mod workload;
pub mod state;
pub mod substitution;
pub mod normalize;
pub mod container_app;
pub mod mapping;
pub mod validation;
pub mod templates;
pub mod render;
pub mod hashing;
pub mod pipeline;

pub use workload::{Container, FileMount, ServicePort, Workload, WorkloadService};
pub use state::{PrimedResource, ResourceLookup, ResourceUid, State, StateError, WorkloadRecord};
pub use substitution::{substitute_string, Resolver, SubstitutionError, WorkloadResolver};
pub use normalize::{normalize_workload, FsReader, NormalizeError, SourceReader};
pub use container_app::ContainerAppProperties;
pub use mapping::{create_container_app_properties, parse_cpu, CpuParseError};
pub use validation::{Finding, FindingSeverity, Validator};
pub use render::{ManifestRenderer, NamingParameters, RenderError};
pub use hashing::{canonical_json, compute_input_hash, compute_manifest_hash};
pub use pipeline::{convert_workload, ConversionPipeline, ConvertError, ConvertedManifest};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
