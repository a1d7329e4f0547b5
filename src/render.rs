//! Manifest Renderer
//!
//! Evaluates each Bicep fragment as a stateless minijinja template and
//! concatenates the results. Any template failure aborts the whole render.

use std::fmt::Write;

use minijinja::{context, Environment, Error, UndefinedBehavior, Value};
use serde::Serialize;
use thiserror::Error as ThisError;

use crate::container_app::ContainerAppProperties;
use crate::templates::Fragment;

#[derive(Debug, ThisError)]
#[error("failed to render {fragment} fragment: {source}")]
pub struct RenderError {
    pub fragment: &'static str,
    #[source]
    pub source: Error,
}

/// Resource names derived from the workload name. Uniqueness across
/// workloads is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingParameters {
    pub environment_name: String,
    pub container_app_name: String,
}

impl NamingParameters {
    pub fn for_workload(workload_name: &str) -> Self {
        Self {
            environment_name: format!("{workload_name}-environment"),
            container_app_name: format!("{workload_name}-container-app"),
        }
    }
}

pub struct ManifestRenderer {
    env: Environment<'static>,
}

impl Default for ManifestRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_filter("bicep_string", bicep_string);
        env.add_filter("bicep_list", bicep_list);
        env.add_filter("bicep_bool", bicep_bool);
        env.add_filter("decimal", decimal);

        Self { env }
    }

    /// Render the complete manifest for one workload.
    pub fn render_manifest(
        &self,
        workload_name: &str,
        properties: &ContainerAppProperties,
    ) -> Result<String, RenderError> {
        let naming = NamingParameters::for_workload(workload_name);
        let mut manifest = String::new();

        for fragment in Fragment::ALL {
            let ctx = match fragment {
                Fragment::Parameters => Value::from_serialize(&naming),
                Fragment::ContainerApp => context! { properties => properties },
                Fragment::Header | Fragment::Environment | Fragment::Outputs => context! {},
            };
            manifest.push_str(&self.render_fragment(fragment, ctx)?);
        }

        Ok(manifest)
    }

    pub fn render_fragment(&self, fragment: Fragment, ctx: Value) -> Result<String, RenderError> {
        self.render_source(fragment.name(), fragment.source(), ctx)
    }

    fn render_source(
        &self,
        name: &'static str,
        source: &str,
        ctx: Value,
    ) -> Result<String, RenderError> {
        self.env
            .render_named_str(name, source, ctx)
            .map_err(|source| RenderError {
                fragment: name,
                source,
            })
    }
}

/// Escape text for a single-quoted Bicep string literal.
pub fn escape_bicep(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:X}}}", u32::from(c));
            }
            // Bicep would interpolate `${`
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            _ => out.push(ch),
        }
    }
    out
}

fn bicep_string(value: String) -> String {
    escape_bicep(&value)
}

fn bicep_list(values: Value) -> Result<String, Error> {
    let items: Vec<String> = values
        .try_iter()?
        .map(|item| format!("'{}'", escape_bicep(&item.to_string())))
        .collect();
    Ok(format!("[{}]", items.join(", ")))
}

fn bicep_bool(value: bool) -> String {
    value.to_string()
}

fn decimal(value: f64) -> String {
    format!("{value}")
}
