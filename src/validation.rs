//! Support Findings - Rule/Policy Separation
//!
//! Rules inspect a normalized workload and report what the target platform
//! cannot represent. Findings never block a conversion; the pipeline logs
//! them and hands them back with the manifest.

use serde::{Deserialize, Serialize};

use crate::mapping::parse_cpu;
use crate::workload::{Container, Workload};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    /// Input was dropped or changed in a way the author should know about.
    Warning,
    /// Input was interpreted leniently.
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub rule: String,
    pub severity: FindingSeverity,
    #[serde(default)]
    pub container: Option<String>,
    pub message: String,
}

impl Finding {
    fn for_container(rule: &str, severity: FindingSeverity, container: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            severity,
            container: Some(container.to_string()),
            message,
        }
    }
}

/// Support rule trait - produces findings
pub trait SupportRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn inspect(&self, workload: &Workload) -> Vec<Finding>;
}

/// Runs a per-container check over every container in name order.
fn per_container(
    workload: &Workload,
    mut check: impl FnMut(&str, &Container) -> Option<Finding>,
) -> Vec<Finding> {
    workload
        .containers
        .iter()
        .filter_map(|(name, container)| check(name, container))
        .collect()
}

// --- Concrete Rules ---

pub struct ResourceLimitsRule;

impl SupportRule for ResourceLimitsRule {
    fn name(&self) -> &'static str { "resource_limits" }

    fn inspect(&self, workload: &Workload) -> Vec<Finding> {
        per_container(workload, |name, container| {
            container.resources.as_ref()?.limits.as_ref()?;
            Some(Finding::for_container(
                self.name(),
                FindingSeverity::Warning,
                name,
                format!(
                    "{name}: resource limits are not supported in Azure Container Apps, set the wanted values in the requests section"
                ),
            ))
        })
    }
}

pub struct CpuRequestRule;

impl SupportRule for CpuRequestRule {
    fn name(&self) -> &'static str { "cpu_request" }

    fn inspect(&self, workload: &Workload) -> Vec<Finding> {
        per_container(workload, |name, container| {
            let cpu = container.resources.as_ref()?.requests.as_ref()?.cpu.as_deref()?;
            let err = parse_cpu(cpu).err()?;
            Some(Finding::for_container(
                self.name(),
                FindingSeverity::Info,
                name,
                format!("{name}: {err}, keeping the default cpu"),
            ))
        })
    }
}

pub struct FileMountRule;

impl SupportRule for FileMountRule {
    fn name(&self) -> &'static str { "file_mounts" }

    fn inspect(&self, workload: &Workload) -> Vec<Finding> {
        per_container(workload, |name, container| {
            if container.files.is_empty() {
                return None;
            }
            let targets: Vec<_> = container.files.iter().map(|f| f.target.as_str()).collect();
            Some(Finding::for_container(
                self.name(),
                FindingSeverity::Warning,
                name,
                format!(
                    "{name}: file mounts are not rendered into the manifest: {}",
                    targets.join(", ")
                ),
            ))
        })
    }
}

pub struct ProbeRule;

impl SupportRule for ProbeRule {
    fn name(&self) -> &'static str { "probes" }

    fn inspect(&self, workload: &Workload) -> Vec<Finding> {
        let mut findings = vec![];
        for (name, container) in &workload.containers {
            let probes = [
                ("liveness", container.liveness_probe.as_ref()),
                ("readiness", container.readiness_probe.as_ref()),
            ];
            for (kind, probe) in probes {
                let Some(probe) = probe else { continue };
                if probe.http_get.as_ref().is_some_and(|http| !http.is_empty()) {
                    continue;
                }
                findings.push(Finding::for_container(
                    self.name(),
                    FindingSeverity::Info,
                    name,
                    format!("{name}: {kind} probe has no httpGet check and is not emitted"),
                ));
            }
        }
        findings
    }
}

pub struct ServicePortRule;

impl SupportRule for ServicePortRule {
    fn name(&self) -> &'static str { "service_ports" }

    fn inspect(&self, workload: &Workload) -> Vec<Finding> {
        let Some(service) = &workload.service else {
            return vec![];
        };
        let mut ports = service.ports.keys();
        let Some(exposed) = ports.next() else {
            return vec![];
        };
        let dropped: Vec<_> = ports.map(String::as_str).collect();
        if dropped.is_empty() {
            return vec![];
        }
        vec![Finding {
            rule: self.name().to_string(),
            severity: FindingSeverity::Info,
            container: None,
            message: format!(
                "only port '{exposed}' is exposed through ingress, ignoring: {}",
                dropped.join(", ")
            ),
        }]
    }
}

/// Validator runs every rule in a fixed order
pub struct Validator {
    rules: Vec<Box<dyn SupportRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ResourceLimitsRule),
                Box::new(CpuRequestRule),
                Box::new(FileMountRule),
                Box::new(ProbeRule),
                Box::new(ServicePortRule),
            ],
        }
    }

    pub fn inspect(&self, workload: &Workload) -> Vec<Finding> {
        self.rules
            .iter()
            .flat_map(|rule| rule.inspect(workload))
            .collect()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{
        ContainerProbe, ContainerResources, FileMount, ResourceQuantities, ServicePort,
        WorkloadService,
    };

    fn workload_with(container: Container) -> Workload {
        let mut spec = Workload::default();
        spec.containers.insert("main".to_string(), container);
        spec
    }

    fn nginx() -> Container {
        Container {
            image: "nginx".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_workload_has_no_findings() {
        assert!(Validator::new().inspect(&workload_with(nginx())).is_empty());
    }

    #[test]
    fn test_limits_warn() {
        let container = Container {
            resources: Some(ContainerResources {
                limits: Some(ResourceQuantities {
                    cpu: Some("1".to_string()),
                    memory: None,
                }),
                requests: None,
            }),
            ..nginx()
        };
        let findings = Validator::new().inspect(&workload_with(container));

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "resource_limits");
        assert_eq!(findings[0].severity, FindingSeverity::Warning);
        assert_eq!(findings[0].container.as_deref(), Some("main"));
        assert!(findings[0].message.contains("not supported"));
    }

    #[test]
    fn test_bad_cpu_is_informational() {
        let container = Container {
            resources: Some(ContainerResources {
                limits: None,
                requests: Some(ResourceQuantities {
                    cpu: Some("fast".to_string()),
                    memory: None,
                }),
            }),
            ..nginx()
        };
        let findings = CpuRequestRule.inspect(&workload_with(container));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, FindingSeverity::Info);
        assert!(findings[0].message.contains("'fast'"));
    }

    #[test]
    fn test_file_mounts_warn() {
        let container = Container {
            files: vec![FileMount {
                target: "/etc/app.conf".to_string(),
                content: Some("x".to_string()),
                ..Default::default()
            }],
            ..nginx()
        };
        let findings = FileMountRule.inspect(&workload_with(container));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("/etc/app.conf"));
    }

    #[test]
    fn test_probe_without_http_get() {
        let container = Container {
            readiness_probe: Some(ContainerProbe::default()),
            ..nginx()
        };
        let findings = ProbeRule.inspect(&workload_with(container));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("readiness probe"));
    }

    #[test]
    fn test_extra_service_ports() {
        let mut spec = workload_with(nginx());
        let mut service = WorkloadService::default();
        for (name, port) in [("web", 80), ("admin", 9000)] {
            service.ports.insert(
                name.to_string(),
                ServicePort {
                    port,
                    ..Default::default()
                },
            );
        }
        spec.service = Some(service);

        let findings = ServicePortRule.inspect(&spec);
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "only port 'admin' is exposed through ingress, ignoring: web"
        );
    }
}
