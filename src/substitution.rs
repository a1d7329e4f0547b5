//! Deferred Value Substitution
//!
//! `${ref}` placeholders are resolved through a [`Resolver`], `$$` produces a
//! literal `$`. An unterminated `${` is left as it is.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstitutionError {
    #[error("invalid ref '{reference}': unknown reference root, use $$ to escape the substitution")]
    UnknownRoot { reference: String },

    #[error("invalid ref '{reference}': requires at least a {what} to lookup")]
    Incomplete { reference: String, what: &'static str },

    #[error("invalid ref '{reference}': no known resource '{resource}'")]
    UnknownResource { reference: String, resource: String },

    #[error("invalid ref '{reference}': key '{key}' not found")]
    KeyNotFound { reference: String, key: String },

    #[error("invalid ref '{reference}': cannot lookup key '{key}', context is not a map")]
    NotAMap { reference: String, key: String },

    #[error("invalid ref '{reference}': {message}")]
    Unresolvable { reference: String, message: String },
}

impl SubstitutionError {
    pub fn unresolvable(reference: &str, message: impl Into<String>) -> Self {
        Self::Unresolvable {
            reference: reference.to_string(),
            message: message.into(),
        }
    }
}

/// Resolves the inside of a `${...}` placeholder to its final text.
pub trait Resolver {
    fn resolve(&self, reference: &str) -> Result<String, SubstitutionError>;
}

impl<F> Resolver for F
where
    F: Fn(&str) -> Result<String, SubstitutionError>,
{
    fn resolve(&self, reference: &str) -> Result<String, SubstitutionError> {
        self(reference)
    }
}

/// Resolver over one workload's metadata and its primed resource outputs.
///
/// Supported references:
/// - `metadata.KEY[.KEY...]`
/// - `resources.NAME` (the resource name itself)
/// - `resources.NAME.KEY[.KEY...]`
///
/// A literal dot inside a key is written `\.`.
#[derive(Debug, Clone)]
pub struct WorkloadResolver<'a> {
    metadata: &'a Map<String, Value>,
    resources: BTreeMap<&'a str, &'a Map<String, Value>>,
}

impl<'a> WorkloadResolver<'a> {
    pub fn new(
        metadata: &'a Map<String, Value>,
        resources: BTreeMap<&'a str, &'a Map<String, Value>>,
    ) -> Self {
        Self { metadata, resources }
    }
}

impl Resolver for WorkloadResolver<'_> {
    fn resolve(&self, reference: &str) -> Result<String, SubstitutionError> {
        let parts = split_ref_parts(reference);
        let value = match parts[0].as_str() {
            "metadata" => {
                if parts.len() < 2 {
                    return Err(SubstitutionError::Incomplete {
                        reference: reference.to_string(),
                        what: "metadata key",
                    });
                }
                lookup(reference, self.metadata, &parts[1..])?
            }
            "resources" => {
                if parts.len() < 2 {
                    return Err(SubstitutionError::Incomplete {
                        reference: reference.to_string(),
                        what: "resource name",
                    });
                }
                let outputs = self.resources.get(parts[1].as_str()).ok_or_else(|| {
                    SubstitutionError::UnknownResource {
                        reference: reference.to_string(),
                        resource: parts[1].clone(),
                    }
                })?;
                if parts.len() == 2 {
                    return Ok(parts[1].clone());
                }
                lookup(reference, outputs, &parts[2..])?
            }
            _ => {
                return Err(SubstitutionError::UnknownRoot {
                    reference: reference.to_string(),
                })
            }
        };
        Ok(value_to_text(value))
    }
}

/// Replace every placeholder in `input`.
pub fn substitute_string(input: &str, resolver: &dyn Resolver) -> Result<String, SubstitutionError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
        } else if let Some(body) = after.strip_prefix('{') {
            match body.find('}') {
                Some(end) => {
                    out.push_str(&resolver.resolve(&body[..end])?);
                    rest = &body[end + 1..];
                }
                None => {
                    out.push_str(&rest[pos..]);
                    rest = "";
                }
            }
        } else {
            out.push('$');
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Split a reference on `.`, honouring `\.` as a literal dot.
pub fn split_ref_parts(reference: &str) -> Vec<String> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut chars = reference.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'.') => {
                current.push('.');
                chars.next();
            }
            '.' => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

fn lookup<'v>(
    reference: &str,
    root: &'v Map<String, Value>,
    keys: &[String],
) -> Result<&'v Value, SubstitutionError> {
    let not_found = |key: &str| SubstitutionError::KeyNotFound {
        reference: reference.to_string(),
        key: key.to_string(),
    };

    let (first, rest) = keys
        .split_first()
        .ok_or_else(|| not_found(""))?;
    let mut value = root.get(first).ok_or_else(|| not_found(first))?;

    for key in rest {
        value = match value {
            Value::Object(map) => map.get(key).ok_or_else(|| not_found(key))?,
            _ => {
                return Err(SubstitutionError::NotAMap {
                    reference: reference.to_string(),
                    key: key.clone(),
                })
            }
        };
    }
    Ok(value)
}

/// Strings are used verbatim, everything else as compact JSON.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
