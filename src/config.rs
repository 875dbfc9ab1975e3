// src/config.rs

//! Configuration loading and startup validation
//!
//! The engine's input is a `stockpile.toml` at the project root:
//!
//! ```toml
//! [install]
//! fallback_to_npm = true
//!
//! [history]
//! depth = 5
//!
//! [hash]
//! salt = { epoch = 1 }
//!
//! [[backend]]
//! alias = "store"
//! kind = "local"
//! push = true
//! options = { directory = "/mnt/bundles" }
//!
//! [[backend]]
//! alias = "cdn"
//! kind = "http"
//! options = { url = "https://bundles.example.com" }
//! ```
//!
//! All validation happens here, before any install work starts: backend
//! options are normalized via each backend's `validate()`, aliases are
//! checked for uniqueness, and the push flag is refused on backends that
//! cannot accept uploads.

use crate::backend::{Backend, BackendDescriptor, Chain, GitBackend, HttpBackend, LocalBackend};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::time::Duration;

/// Well-known configuration name at the project root
pub const CONFIG_FILE: &str = "stockpile.toml";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    install: RawInstall,
    history: Option<RawHistory>,
    hash: Option<RawHash>,
    #[serde(default)]
    tools: RawTools,
    #[serde(default)]
    backend: Vec<RawBackend>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawInstall {
    #[serde(default)]
    fallback_to_npm: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHistory {
    depth: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHash {
    salt: Option<toml::Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawTools {
    npm_timeout_secs: Option<u64>,
    git_timeout_secs: Option<u64>,
    rsync_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBackend {
    alias: String,
    kind: String,
    #[serde(default)]
    push: bool,
    #[serde(default)]
    push_may_fail: bool,
    options: Option<toml::Value>,
}

/// External tool timeouts
#[derive(Debug, Clone, Copy)]
pub struct ToolTimeouts {
    pub npm: Duration,
    pub git: Duration,
    pub rsync: Duration,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            npm: crate::tools::npm::NPM_TIMEOUT,
            git: crate::tools::git::GIT_TIMEOUT,
            rsync: crate::tools::rsync::RSYNC_TIMEOUT,
        }
    }
}

/// Validated engine configuration
#[derive(Debug)]
pub struct Config {
    /// Ordered backend chain; earlier entries are preferred
    pub chain: Chain,
    /// History-walk depth; 0 disables the walker
    pub history_depth: u32,
    /// Whether a full npm install is the last resort
    pub fallback_to_npm: bool,
    /// Operator-controlled salt folded into every fingerprint
    pub salt: JsonValue,
    pub timeouts: ToolTimeouts,
}

impl Config {
    /// Load and validate `stockpile.toml` from a project root.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        Self::load_file(&path)
    }

    /// Load and validate a configuration file at an explicit path.
    pub fn load_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigInvalid(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(text).map_err(|e| Error::ConfigInvalid(e.to_string()))?;

        if raw.backend.is_empty() {
            return Err(Error::ConfigInvalid(
                "at least one [[backend]] is required".to_string(),
            ));
        }

        let timeouts = ToolTimeouts {
            npm: raw
                .tools
                .npm_timeout_secs
                .map_or(ToolTimeouts::default().npm, Duration::from_secs),
            git: raw
                .tools
                .git_timeout_secs
                .map_or(ToolTimeouts::default().git, Duration::from_secs),
            rsync: raw
                .tools
                .rsync_timeout_secs
                .map_or(ToolTimeouts::default().rsync, Duration::from_secs),
        };

        let mut chain = Chain::new();
        for entry in raw.backend {
            if chain.iter().any(|d| d.alias == entry.alias) {
                return Err(Error::ConfigInvalid(format!(
                    "duplicate backend alias '{}'",
                    entry.alias
                )));
            }
            chain.push(build_descriptor(entry)?);
        }

        let salt = raw
            .hash
            .and_then(|h| h.salt)
            .map(toml_to_json)
            .unwrap_or_else(|| JsonValue::Object(Default::default()));

        Ok(Config {
            chain,
            history_depth: raw.history.map_or(0, |h| h.depth),
            fallback_to_npm: raw.install.fallback_to_npm,
            salt,
            timeouts,
        })
    }
}

fn build_descriptor(entry: RawBackend) -> Result<BackendDescriptor> {
    let options = entry
        .options
        .unwrap_or_else(|| toml::Value::Table(Default::default()));

    let mut backend: Box<dyn Backend> = match entry.kind.as_str() {
        "local" => Box::new(LocalBackend::from_options(&entry.alias, options)?),
        "http" => Box::new(HttpBackend::from_options(&entry.alias, options)?),
        "git" => Box::new(GitBackend::from_options(&entry.alias, options)?),
        other => {
            return Err(Error::ConfigInvalid(format!(
                "backend '{}' has unknown kind '{other}'",
                entry.alias
            )))
        }
    };

    backend.validate()?;

    if entry.push && !backend.supports_push() {
        return Err(Error::InvalidOptions {
            backend: entry.alias,
            reason: format!("kind '{}' cannot accept pushes", entry.kind),
        });
    }

    Ok(BackendDescriptor {
        alias: entry.alias,
        push: entry.push,
        push_may_fail: entry.push_may_fail,
        backend,
    })
}

/// Fold a TOML value into the JSON domain the fingerprint works in.
fn toml_to_json(value: toml::Value) -> JsonValue {
    match value {
        toml::Value::String(s) => JsonValue::String(s),
        toml::Value::Integer(i) => JsonValue::from(i),
        toml::Value::Float(f) => {
            JsonValue::Number(serde_json::Number::from_f64(f).unwrap_or_else(|| 0.into()))
        }
        toml::Value::Boolean(b) => JsonValue::Bool(b),
        toml::Value::Datetime(dt) => JsonValue::String(dt.to_string()),
        toml::Value::Array(items) => {
            JsonValue::Array(items.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => JsonValue::Object(
            table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect(),
        ),
    }
}
