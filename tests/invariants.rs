//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable conversion guarantees.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use scoreaca_core::{
    normalize::convert_container_files,
    state::{PrimedResource, ResourceUid, State, WorkloadRecord},
    substitution::SubstitutionError,
    workload::{
        Container, ContainerProbe, ContainerResources, FileMount, HttpProbe, ResourceQuantities,
        ResourceSpec, ServicePort, Workload, WorkloadService,
    },
    ConversionPipeline, ConvertError, FindingSeverity, NormalizeError, SourceReader,
};

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

fn create_test_workload() -> Workload {
    let mut variables = BTreeMap::new();
    variables.insert("DB_HOST".to_string(), "${resources.db.host}".to_string());
    variables.insert("DB_PORT".to_string(), "${resources.db.port}".to_string());
    variables.insert("APP_NAME".to_string(), "${metadata.name}".to_string());
    variables.insert("LITERAL".to_string(), "$${not-a-ref}".to_string());

    let mut containers = BTreeMap::new();
    containers.insert(
        "main".to_string(),
        Container {
            image: "ghcr.io/example/web:1.0".to_string(),
            variables,
            files: vec![FileMount {
                target: "/etc/app.conf".to_string(),
                content: Some("host=${resources.db.host}".to_string()),
                ..Default::default()
            }],
            liveness_probe: Some(ContainerProbe {
                http_get: Some(HttpProbe {
                    path: "/health".to_string(),
                    port: 8080,
                    ..Default::default()
                }),
                exec: None,
            }),
            ..Default::default()
        },
    );
    containers.insert(
        "sidecar".to_string(),
        Container {
            image: "redis:alpine".to_string(),
            command: vec!["redis-server".to_string()],
            args: vec!["--appendonly".to_string(), "yes".to_string()],
            ..Default::default()
        },
    );

    let mut ports = BTreeMap::new();
    ports.insert(
        "http".to_string(),
        ServicePort {
            port: 80,
            target_port: Some(8080),
            ..Default::default()
        },
    );

    let mut resources = BTreeMap::new();
    resources.insert(
        "db".to_string(),
        ResourceSpec {
            kind: "postgres".to_string(),
            ..Default::default()
        },
    );

    Workload {
        api_version: "score.dev/v1b1".to_string(),
        metadata: as_map(json!({"name": "web"})),
        containers,
        service: Some(WorkloadService { ports }),
        resources,
    }
}

fn create_test_state() -> State {
    let mut state = State::default();
    state.workloads.insert(
        "web".to_string(),
        WorkloadRecord {
            spec: create_test_workload(),
            file: None,
        },
    );
    state.resources.insert(
        ResourceUid::new("web", "db", "postgres", None, None),
        PrimedResource {
            kind: "postgres".to_string(),
            class: "default".to_string(),
            id: "web.db".to_string(),
            params: None,
            outputs: as_map(json!({"host": "db.internal", "port": 5432})),
            source_workload: Some("web".to_string()),
        },
    );
    state
}

#[test]
fn invariant_conversion_is_deterministic() {
    let state = create_test_state();
    let pipeline = ConversionPipeline::new();

    let first = pipeline.convert_workload(&state, "web").unwrap();
    let second = pipeline.convert_workload(&state, "web").unwrap();

    assert_eq!(first.manifest, second.manifest);
    assert_eq!(first.manifest_hash, second.manifest_hash);
    assert_eq!(first.input_hash, second.input_hash);
}

#[test]
fn invariant_manifest_content() {
    let converted = ConversionPipeline::new()
        .convert_workload(&create_test_state(), "web")
        .unwrap();
    let manifest = &converted.manifest;

    assert!(manifest.starts_with("// Generated by score-aca"));
    assert!(manifest.contains("param environmentName string = 'web-environment'"));
    assert!(manifest.contains("param containerAppName string = 'web-container-app'"));
    assert!(manifest.contains("external: true\n"));
    assert!(manifest.contains("targetPort: 8080"));
    assert!(manifest.contains("transport: 'auto'"));
    assert!(manifest.contains("command: ['redis-server']"));
    assert!(manifest.contains("args: ['--appendonly', 'yes']"));
    assert!(manifest.contains("type: 'Liveness'"));
    assert!(manifest.contains("value: 'db.internal'"));
    assert!(manifest.contains("value: '5432'"));

    // containers appear sorted by name, env entries sorted by key
    let main = manifest.find("name: 'main'").unwrap();
    let sidecar = manifest.find("name: 'sidecar'").unwrap();
    assert!(main < sidecar);
    let app_name = manifest.find("name: 'APP_NAME'").unwrap();
    let db_host = manifest.find("name: 'DB_HOST'").unwrap();
    let literal = manifest.find("name: 'LITERAL'").unwrap();
    assert!(app_name < db_host && db_host < literal);
}

#[test]
fn invariant_no_unresolved_placeholders() {
    let converted = ConversionPipeline::new()
        .convert_workload(&create_test_state(), "web")
        .unwrap();

    // `$${...}` is the only way a literal placeholder survives, and it is
    // escaped for Bicep on the way out.
    assert!(converted.manifest.contains("value: '\\${not-a-ref}'"));
    assert!(!converted.manifest.contains("'${"));
    assert!(!converted.manifest.contains("${resources"));
    assert!(!converted.manifest.contains("${metadata"));
}

#[test]
fn invariant_unprimed_resource_aborts() {
    let mut state = create_test_state();
    state.resources.clear();

    let err = ConversionPipeline::new()
        .convert_workload(&state, "web")
        .unwrap_err();

    assert_eq!(err.workload(), "web");
    assert!(matches!(
        err,
        ConvertError::Normalize {
            source: NormalizeError::NotPrimed { .. },
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "workload: web: resource 'db' (postgres.default#web.db) is not primed"
    );
}

#[test]
fn invariant_unresolvable_reference_names_path() {
    let mut state = create_test_state();
    if let Some(record) = state.workloads.get_mut("web") {
        if let Some(main) = record.spec.containers.get_mut("main") {
            main.variables
                .insert("BROKEN".to_string(), "${resources.db.password}".to_string());
        }
    }

    let err = ConversionPipeline::new()
        .convert_workload(&state, "web")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "workload: web: container: main: variables: BROKEN: invalid ref 'resources.db.password': key 'password' not found"
    );
}

#[test]
fn invariant_input_is_never_mutated() {
    let state = create_test_state();
    let before = state.clone();

    ConversionPipeline::new()
        .convert_workload(&state, "web")
        .unwrap();

    assert_eq!(state, before);
}

#[test]
fn invariant_limits_warn_but_convert() {
    let mut state = create_test_state();
    if let Some(record) = state.workloads.get_mut("web") {
        if let Some(sidecar) = record.spec.containers.get_mut("sidecar") {
            sidecar.resources = Some(ContainerResources {
                limits: Some(ResourceQuantities {
                    cpu: Some("1".to_string()),
                    memory: Some("1Gi".to_string()),
                }),
                requests: None,
            });
        }
    }

    let converted = ConversionPipeline::new()
        .convert_workload(&state, "web")
        .unwrap();

    let limits: Vec<_> = converted
        .findings
        .iter()
        .filter(|f| f.rule == "resource_limits")
        .collect();
    assert_eq!(limits.len(), 1);
    assert_eq!(limits[0].severity, FindingSeverity::Warning);
    assert_eq!(limits[0].container.as_deref(), Some("sidecar"));
    assert!(!converted.manifest.contains("'1Gi'"));
    assert_eq!(converted.manifest.matches("cpu: json('0.25')").count(), 2);
}

#[test]
fn invariant_malformed_cpu_defaults() {
    let mut state = create_test_state();
    if let Some(record) = state.workloads.get_mut("web") {
        if let Some(main) = record.spec.containers.get_mut("main") {
            main.resources = Some(ContainerResources {
                limits: None,
                requests: Some(ResourceQuantities {
                    cpu: Some("one core".to_string()),
                    memory: Some("2Gi".to_string()),
                }),
            });
        }
    }

    let converted = ConversionPipeline::new()
        .convert_workload(&state, "web")
        .unwrap();

    assert!(converted.manifest.contains("memory: '2Gi'"));
    assert_eq!(converted.manifest.matches("cpu: json('0.25')").count(), 2);
    assert!(converted
        .findings
        .iter()
        .any(|f| f.rule == "cpu_request" && f.severity == FindingSeverity::Info));
}

#[test]
fn invariant_no_service_no_ingress() {
    let mut state = create_test_state();
    if let Some(record) = state.workloads.get_mut("web") {
        record.spec.service = Some(WorkloadService::default());
    }

    let converted = ConversionPipeline::new()
        .convert_workload(&state, "web")
        .unwrap();
    assert!(!converted.manifest.contains("ingress"));
}

#[test]
fn invariant_file_mount_source_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("greeting.txt");
    fs::write(&source, "hello ${X}").unwrap();

    let resolver = |reference: &str| match reference {
        "X" => Ok("world".to_string()),
        other => Err(SubstitutionError::unresolvable(other, "unknown")),
    };
    let files = vec![FileMount {
        target: "/greeting.txt".to_string(),
        source: Some(source),
        ..Default::default()
    }];

    let out = convert_container_files(
        "main",
        &files,
        None,
        &resolver,
        &scoreaca_core::FsReader,
    )
    .unwrap();

    assert_eq!(out[0].content.as_deref(), Some("hello world"));
    assert_eq!(out[0].no_expand, Some(true));
    assert_eq!(out[0].source, None);
}

struct MemoryReader(BTreeMap<PathBuf, String>);

impl SourceReader for MemoryReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.0
            .get(path)
            .map(|content| content.clone().into_bytes())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not in memory"))
    }
}

#[test]
fn invariant_relative_sources_follow_workload_file() {
    let mut state = create_test_state();
    if let Some(record) = state.workloads.get_mut("web") {
        record.file = Some(PathBuf::from("/work/apps/score.yaml"));
        if let Some(main) = record.spec.containers.get_mut("main") {
            main.files = vec![FileMount {
                target: "/etc/app.conf".to_string(),
                source: Some(PathBuf::from("conf/app.conf")),
                ..Default::default()
            }];
        }
    }

    let mut files = BTreeMap::new();
    files.insert(
        PathBuf::from("/work/apps/conf/app.conf"),
        "db=${resources.db.host}".to_string(),
    );
    let pipeline = ConversionPipeline::with_reader(MemoryReader(files));

    let converted = pipeline.convert_workload(&state, "web").unwrap();
    assert!(converted
        .findings
        .iter()
        .any(|f| f.rule == "file_mounts" && f.message.contains("/etc/app.conf")));

    let mut missing = state.clone();
    if let Some(record) = missing.workloads.get_mut("web") {
        record.file = Some(PathBuf::from("/elsewhere/score.yaml"));
    }
    let err = pipeline.convert_workload(&missing, "web").unwrap_err();
    assert!(err
        .to_string()
        .contains("failed to read file '/elsewhere/conf/app.conf'"));
}

#[test]
fn invariant_unknown_workload_error() {
    let err = ConversionPipeline::new()
        .convert_workload(&create_test_state(), "nonexistent")
        .unwrap_err();
    assert!(matches!(err, ConvertError::UnknownWorkload(_)));
    assert!(err.to_string().contains("not found"));
}

#[test]
fn invariant_convert_all_isolates_failures() {
    let mut state = create_test_state();
    let mut broken = create_test_workload();
    broken.metadata = as_map(json!({"name": "api"}));
    state.workloads.insert(
        "api".to_string(),
        WorkloadRecord {
            spec: broken,
            file: None,
        },
    );

    let results = ConversionPipeline::new().convert_all(&state);
    assert_eq!(results.len(), 2);

    // name order: api (its db is not primed) then web
    let api = results[0].as_ref().unwrap_err();
    assert_eq!(api.workload(), "api");
    assert!(api.to_string().contains("postgres.default#api.db"));
    assert_eq!(results[1].as_ref().unwrap().workload_name, "web");
}
