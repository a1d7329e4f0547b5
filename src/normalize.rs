//! Spec Normalizer
//!
//! Produces a fully resolved copy of a workload: resources checked against
//! their primed state, every variable and file content substituted, every
//! file source read into inline content. The input is never modified.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::state::{PrimedResource, ResourceLookup, ResourceUid, WorkloadRecord};
use crate::substitution::{substitute_string, Resolver, SubstitutionError, WorkloadResolver};
use crate::workload::{FileMount, ResourceSpec, Workload};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("resource '{resource}' ({uid}) is not primed")]
    NotPrimed { resource: String, uid: ResourceUid },

    #[error("no containers defined")]
    NoContainers,

    #[error("container: {container}: image must not be empty")]
    EmptyImage { container: String },

    #[error("container: {container}: variables: {key}: {source}")]
    Variable {
        container: String,
        key: String,
        #[source]
        source: SubstitutionError,
    },

    #[error("container: {container}: files: {index}: missing 'content' or 'source'")]
    FileContentMissing { container: String, index: usize },

    #[error("container: {container}: files: {index}: 'content' and 'source' are mutually exclusive")]
    FileContentConflict { container: String, index: usize },

    #[error(
        "container: {}: files: {}: source: failed to read file '{}': {}",
        .container, .index, .path.display(), .source
    )]
    FileRead {
        container: String,
        index: usize,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("container: {container}: files: {index}: failed to substitute in content: {source}")]
    FileSubstitution {
        container: String,
        index: usize,
        #[source]
        source: SubstitutionError,
    },
}

/// Byte source for file mounts that reference external content.
pub trait SourceReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads sources straight from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

/// Normalize one workload against its primed resources.
pub fn normalize_workload(
    workload_name: &str,
    record: &WorkloadRecord,
    resources: &dyn ResourceLookup,
    reader: &dyn SourceReader,
) -> Result<Workload, NormalizeError> {
    let spec = &record.spec;
    if spec.containers.is_empty() {
        return Err(NormalizeError::NoContainers);
    }

    let primed = prime_resources(workload_name, &spec.resources, resources)?;
    let outputs = primed
        .iter()
        .map(|(name, resource)| (*name, &resource.outputs))
        .collect();
    let resolver = WorkloadResolver::new(&spec.metadata, outputs);

    let mut containers = BTreeMap::new();
    for (name, container) in &spec.containers {
        if container.image.trim().is_empty() {
            return Err(NormalizeError::EmptyImage { container: name.clone() });
        }
        let mut container = container.clone();
        container.variables = convert_container_variables(name, &container.variables, &resolver)?;
        container.files = convert_container_files(
            name,
            &container.files,
            record.file.as_deref(),
            &resolver,
            reader,
        )?;
        containers.insert(name.clone(), container);
    }

    // Declared params are placeholders until priming; the primed set wins.
    let resources = spec
        .resources
        .iter()
        .map(|(name, resource)| {
            let mut resource = resource.clone();
            resource.params = primed[name.as_str()].params.clone();
            (name.clone(), resource)
        })
        .collect();

    debug!(
        workload = workload_name,
        containers = spec.containers.len(),
        resources = spec.resources.len(),
        "normalized workload"
    );

    Ok(Workload {
        containers,
        resources,
        ..spec.clone()
    })
}

fn prime_resources<'a>(
    workload_name: &str,
    declared: &'a BTreeMap<String, ResourceSpec>,
    lookup: &'a dyn ResourceLookup,
) -> Result<BTreeMap<&'a str, &'a PrimedResource>, NormalizeError> {
    let mut primed = BTreeMap::new();
    for (name, spec) in declared {
        let uid = ResourceUid::for_resource(workload_name, name, spec);
        let resource = lookup.primed(&uid).ok_or_else(|| NormalizeError::NotPrimed {
            resource: name.clone(),
            uid: uid.clone(),
        })?;
        primed.insert(name.as_str(), resource);
    }
    Ok(primed)
}

pub fn convert_container_variables(
    container_name: &str,
    variables: &BTreeMap<String, String>,
    resolver: &dyn Resolver,
) -> Result<BTreeMap<String, String>, NormalizeError> {
    variables
        .iter()
        .map(|(key, value)| {
            substitute_string(value, resolver)
                .map(|out| (key.clone(), out))
                .map_err(|source| NormalizeError::Variable {
                    container: container_name.to_string(),
                    key: key.clone(),
                    source,
                })
        })
        .collect()
}

/// Resolve every mount to inline, already substituted content.
///
/// Relative sources are read from the directory of `workload_file`.
pub fn convert_container_files(
    container_name: &str,
    files: &[FileMount],
    workload_file: Option<&Path>,
    resolver: &dyn Resolver,
    reader: &dyn SourceReader,
) -> Result<Vec<FileMount>, NormalizeError> {
    let mut out = Vec::with_capacity(files.len());

    for (index, file) in files.iter().enumerate() {
        let raw = match (&file.content, &file.source) {
            (Some(content), None) => content.clone(),
            (None, Some(source)) => {
                let path = resolve_source_path(source, workload_file);
                let read_error = |source: io::Error| NormalizeError::FileRead {
                    container: container_name.to_string(),
                    index,
                    path: path.clone(),
                    source,
                };
                let bytes = reader.read(&path).map_err(&read_error)?;
                if file.expands() {
                    String::from_utf8(bytes)
                        .map_err(|e| read_error(io::Error::new(io::ErrorKind::InvalidData, e)))?
                } else {
                    String::from_utf8_lossy(&bytes).into_owned()
                }
            }
            (Some(_), Some(_)) => {
                return Err(NormalizeError::FileContentConflict {
                    container: container_name.to_string(),
                    index,
                })
            }
            (None, None) => {
                return Err(NormalizeError::FileContentMissing {
                    container: container_name.to_string(),
                    index,
                })
            }
        };

        let content = if file.expands() {
            substitute_string(&raw, resolver).map_err(|source| {
                NormalizeError::FileSubstitution {
                    container: container_name.to_string(),
                    index,
                    source,
                }
            })?
        } else {
            raw
        };

        out.push(FileMount {
            target: file.target.clone(),
            mode: file.mode.clone(),
            source: None,
            content: Some(content),
            no_expand: Some(true),
        });
    }

    Ok(out)
}

fn resolve_source_path(source: &Path, workload_file: Option<&Path>) -> PathBuf {
    match workload_file.and_then(Path::parent) {
        Some(dir) if source.is_relative() => dir.join(source),
        _ => source.to_path_buf(),
    }
}
