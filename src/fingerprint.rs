// src/fingerprint.rs

//! Deterministic bundle fingerprints
//!
//! A fingerprint is the SHA-256 of a canonical serialization of the
//! manifest's dependency maps, the lockfile (or its absence), and the
//! configured salt. Identical inputs produce the identical fingerprint on
//! any machine, which is what lets backends be shared across a cluster.
//!
//! Canonical form: JSON with object keys sorted at every level, no
//! whitespace. An absent lockfile serializes as `null`, which keeps it
//! distinct from a present-but-empty lockfile (`{}`).

use crate::error::{Error, Result};
use crate::manifest::{Lockfile, Manifest};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex length of a SHA-256 fingerprint
pub const FINGERPRINT_LEN: usize = 64;

/// A computed bundle fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Validate an externally supplied fingerprint string.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != FINGERPRINT_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Internal(format!("malformed fingerprint '{s}'")));
        }
        Ok(Fingerprint(s.to_lowercase()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the fingerprint for a manifest, an optional lockfile, and a salt.
pub fn fingerprint(manifest: &Manifest, lockfile: Option<&Lockfile>, salt: &Value) -> Fingerprint {
    let input = serde_json::json!({
        "dependencies": manifest.dependencies,
        "devDependencies": manifest.dev_dependencies,
        "lockfile": lockfile.map(|l| l.document.clone()).unwrap_or(Value::Null),
        "salt": salt,
    });

    let mut canonical = String::new();
    write_canonical(&input, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Fingerprint(format!("{:x}", hasher.finalize()))
}

/// Serialize a JSON value with keys sorted at every level.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json string rendering handles escaping
                out.push_str(&serde_json::to_string(key).expect("string serialization"));
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            out.push_str(&serde_json::to_string(scalar).expect("scalar serialization"));
        }
    }
}
