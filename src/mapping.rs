//! Platform Mapper - Workload to Container App
//!
//! Total over normalized workloads. Unsupported settings are dropped here and
//! reported by the validator; malformed CPU requests keep the default.

use thiserror::Error;

use crate::container_app::{
    ContainerAppConfiguration, ContainerAppContainer, ContainerAppEnv, ContainerAppHttpGet,
    ContainerAppHttpHeader, ContainerAppIngress, ContainerAppProbe, ContainerAppProperties,
    ContainerAppResources, ContainerAppTemplate, ProbeType, ACTIVE_REVISIONS_MODE,
    INGRESS_TRANSPORT,
};
use crate::workload::{Container, ContainerProbe, Workload, WorkloadService};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cpu quantity '{value}': expected cores like '0.5' or millicores like '500m'")]
pub struct CpuParseError {
    pub value: String,
}

/// Build the container app properties for a normalized workload.
pub fn create_container_app_properties(spec: &Workload) -> ContainerAppProperties {
    let containers = spec
        .containers
        .iter()
        .map(|(name, container)| map_container(name, container))
        .collect();

    ContainerAppProperties {
        configuration: ContainerAppConfiguration {
            active_revisions_mode: ACTIVE_REVISIONS_MODE.to_string(),
            ingress: select_ingress(spec.service.as_ref()),
        },
        template: ContainerAppTemplate { containers },
    }
}

/// External ingress on the first service port by name, if there is one.
pub fn select_ingress(service: Option<&WorkloadService>) -> Option<ContainerAppIngress> {
    let (_, port) = service?.ports.iter().next()?;
    Some(ContainerAppIngress {
        external: true,
        target_port: port.effective_port(),
        transport: INGRESS_TRANSPORT.to_string(),
    })
}

pub fn map_container(name: &str, container: &Container) -> ContainerAppContainer {
    let env = container
        .variables
        .iter()
        .map(|(name, value)| ContainerAppEnv {
            name: name.clone(),
            value: value.clone(),
        })
        .collect();

    let probes = [
        (ProbeType::Liveness, container.liveness_probe.as_ref()),
        (ProbeType::Readiness, container.readiness_probe.as_ref()),
    ]
    .into_iter()
    .filter_map(|(probe_type, probe)| map_probe(probe_type, probe?))
    .collect();

    ContainerAppContainer {
        name: name.to_string(),
        image: container.image.clone(),
        command: container.command.clone(),
        args: container.args.clone(),
        env,
        resources: map_resources(container),
        probes,
    }
}

/// Requests override the defaults; limits are ignored.
pub fn map_resources(container: &Container) -> ContainerAppResources {
    let mut resources = ContainerAppResources::default();
    let Some(requests) = container
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref())
    else {
        return resources;
    };

    // A bad CPU string must not fail the conversion; the default stays.
    if let Some(cpu) = requests.cpu.as_deref().and_then(|cpu| parse_cpu(cpu).ok()) {
        resources.cpu = cpu;
    }
    if let Some(memory) = &requests.memory {
        resources.memory = memory.clone();
    }
    resources
}

/// Only HTTP-GET checks are emitted; anything else yields `None`.
pub fn map_probe(probe_type: ProbeType, probe: &ContainerProbe) -> Option<ContainerAppProbe> {
    let http = probe.http_get.as_ref().filter(|http| !http.is_empty())?;
    Some(ContainerAppProbe {
        probe_type,
        http_get: ContainerAppHttpGet {
            path: http.path.clone(),
            port: http.port,
            scheme: http.scheme.map(|s| s.as_str().to_string()),
            host: http.host.clone(),
            http_headers: http
                .http_headers
                .iter()
                .map(|h| ContainerAppHttpHeader {
                    name: h.name.clone(),
                    value: h.value.clone(),
                })
                .collect(),
        },
    })
}

/// Parse a CPU quantity into cores: `500m` is `0.5`, `2` is `2.0`.
pub fn parse_cpu(cpu: &str) -> Result<f64, CpuParseError> {
    let invalid = || CpuParseError {
        value: cpu.to_string(),
    };
    let (number, divisor) = match cpu.strip_suffix('m') {
        Some(millis) => (millis, 1000.0),
        None => (cpu, 1.0),
    };
    let value: f64 = number.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(value / divisor)
}
