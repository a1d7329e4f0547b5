//! Bicep Fragments - Fixed Output Contract
//!
//! The manifest is the concatenation of these fragments in [`Fragment::ALL`]
//! order. Templates run with `trim_blocks` and `lstrip_blocks`, so a line
//! holding only a block tag disappears from the output.

/// One independently rendered piece of the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    Header,
    Parameters,
    Environment,
    ContainerApp,
    Outputs,
}

impl Fragment {
    pub const ALL: [Fragment; 5] = [
        Fragment::Header,
        Fragment::Parameters,
        Fragment::Environment,
        Fragment::ContainerApp,
        Fragment::Outputs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Fragment::Header => "header",
            Fragment::Parameters => "parameters",
            Fragment::Environment => "environment",
            Fragment::ContainerApp => "container_app",
            Fragment::Outputs => "outputs",
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            Fragment::Header => BICEP_HEADER,
            Fragment::Parameters => BICEP_PARAMETERS,
            Fragment::Environment => BICEP_ENVIRONMENT,
            Fragment::ContainerApp => BICEP_CONTAINER_APP,
            Fragment::Outputs => BICEP_OUTPUTS,
        }
    }
}

const BICEP_HEADER: &str = "// Generated by score-aca
// Azure Container Apps Bicep manifest

";

const BICEP_PARAMETERS: &str = "// Parameters
param environmentName string = '{{ environment_name | bicep_string }}'
param containerAppName string = '{{ container_app_name | bicep_string }}'
param location string = resourceGroup().location

";

const BICEP_ENVIRONMENT: &str = "// Container App Environment
resource containerAppEnvironment 'Microsoft.App/managedEnvironments@2024-03-01' = {
  name: environmentName
  location: location
  properties: {
    appLogsConfiguration: {
      destination: 'azure-monitor'
    }
  }
}
";

// TODO: track the newest GA Microsoft.App API version instead of pinning 2024-03-01.
const BICEP_CONTAINER_APP: &str = "
// Container App
resource containerApp 'Microsoft.App/containerApps@2024-03-01' = {
  name: containerAppName
  location: location
  properties: {
    environmentId: containerAppEnvironment.id
    configuration: {
      activeRevisionsMode: '{{ properties.configuration.activeRevisionsMode }}'
{% if properties.configuration.ingress %}
      ingress: {
        external: {{ properties.configuration.ingress.external | bicep_bool }}
        targetPort: {{ properties.configuration.ingress.targetPort }}
        transport: '{{ properties.configuration.ingress.transport }}'
      }
{% endif %}
    }
    template: {
      containers: [
{% for container in properties.template.containers %}
        {
          name: '{{ container.name | bicep_string }}'
          image: '{{ container.image | bicep_string }}'
{% if container.command %}
          command: {{ container.command | bicep_list }}
{% endif %}
{% if container.args %}
          args: {{ container.args | bicep_list }}
{% endif %}
          resources: {
            cpu: json('{{ container.resources.cpu | decimal }}')
            memory: '{{ container.resources.memory | bicep_string }}'
          }
{% if container.probes %}
          probes: [
{% for probe in container.probes %}
            {
              type: '{{ probe.type }}'
              httpGet: {
{% if probe.httpGet.path %}
                path: '{{ probe.httpGet.path | bicep_string }}'
{% endif %}
{% if probe.httpGet.port %}
                port: {{ probe.httpGet.port }}
{% endif %}
{% if probe.httpGet.scheme %}
                scheme: '{{ probe.httpGet.scheme }}'
{% endif %}
{% if probe.httpGet.host %}
                host: '{{ probe.httpGet.host | bicep_string }}'
{% endif %}
{% if probe.httpGet.httpHeaders %}
                httpHeaders: [
{% for header in probe.httpGet.httpHeaders %}
                  {
                    name: '{{ header.name | bicep_string }}'
                    value: '{{ header.value | bicep_string }}'
                  }
{% endfor %}
                ]
{% endif %}
              }
            }
{% endfor %}
          ]
{% endif %}
{% if container.env %}
          env: [
{% for variable in container.env %}
            {
              name: '{{ variable.name | bicep_string }}'
              value: '{{ variable.value | bicep_string }}'
            }
{% endfor %}
          ]
{% endif %}
        }
{% endfor %}
      ]
    }
  }
}
";

const BICEP_OUTPUTS: &str = "
// Outputs
output containerAppId string = containerApp.id
output environmentId string = containerAppEnvironment.id
output latestRevisionName string = containerApp.properties.latestRevisionName
";
