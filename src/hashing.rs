//! Hashing - SHA-256 Digests for Reproducibility
//!
//! Identical input must give identical digests, so JSON is canonicalized
//! (sorted keys, no whitespace) before hashing.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// Serialize with object keys in sorted order and no whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    to_string(&sorted_keys(serde_json::to_value(value)?))
}

fn sorted_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, inner)| (key, sorted_keys(inner)))
                .collect();
            Value::Object(ordered.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted_keys).collect()),
        other => other,
    }
}

/// Digest of the rendered manifest text.
pub fn compute_manifest_hash(manifest: &str) -> String {
    sha256_hex(manifest.as_bytes())
}

/// Digest of everything that determines a conversion's output:
/// sha256(workload_name + canonical normalized workload + engine_version)
pub fn compute_input_hash(
    workload_name: &str,
    normalized: &impl Serialize,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(normalized)?;
    Ok(sha256_hex(
        format!("{workload_name}:{canonical}:{engine_version}").as_bytes(),
    ))
}
