// src/backend/mod.rs

//! Artifact backends
//!
//! A backend stores bundles keyed by fingerprint. The engine only ever
//! speaks the three-operation contract below; how bundles travel on the
//! wire is each backend's own concern. Three implementations ship:
//!
//! - `local`: a directory of tarballs on a shared filesystem
//! - `http`: pull-only GET from an artifact server
//! - `git`: one tag per bundle in a remote repository

mod git;
mod http;
mod local;

pub use git::GitBackend;
pub use http::HttpBackend;
pub use local::LocalBackend;

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use std::path::Path;

/// The contract every backend satisfies.
///
/// Backends are fingerprint-idempotent: pulling the same fingerprint twice
/// yields byte-identical trees.
pub trait Backend {
    /// Normalize options and populate defaults at startup. Invalid values
    /// surface as `InvalidOptions`; this is the only point where a backend
    /// may probe for external tools.
    fn validate(&mut self) -> Result<()>;

    /// Materialize the bundle as `workdir/node_modules`, using `cache_dir`
    /// as scratch. `BundleNotFound` when the backend has no such
    /// fingerprint; anything else is a `BackendError`.
    fn pull(&self, fingerprint: &Fingerprint, workdir: &Path, cache_dir: &Path) -> Result<()>;

    /// Upload the tree rooted at `project_root/node_modules` under this
    /// fingerprint. `BundleAlreadyExists` when another writer got there
    /// first.
    fn push(&self, fingerprint: &Fingerprint, project_root: &Path, cache_dir: &Path)
        -> Result<()>;

    /// Whether this backend can accept pushes at all.
    fn supports_push(&self) -> bool {
        true
    }
}

/// A configured backend with its chain-level flags
pub struct BackendDescriptor {
    /// Unique, human-readable name used in logs and errors
    pub alias: String,
    /// Whether this backend is a push candidate when it misses
    pub push: bool,
    /// Whether a failed push is tolerated (logged and skipped)
    pub push_may_fail: bool,
    pub backend: Box<dyn Backend>,
}

/// The ordered backend chain. Earlier entries are preferred for pull and
/// are the candidates for push-on-miss.
pub type Chain = Vec<BackendDescriptor>;

impl std::fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("alias", &self.alias)
            .field("push", &self.push)
            .field("push_may_fail", &self.push_may_fail)
            .finish_non_exhaustive()
    }
}

/// Wrap any error that is not part of the pull/push vocabulary into an
/// opaque `BackendError` carrying the backend alias.
pub(crate) fn opaque(alias: &str, err: Error) -> Error {
    match err {
        e @ (Error::BundleNotFound { .. } | Error::BundleAlreadyExists { .. }) => e,
        other => Error::backend(alias, other.to_string()),
    }
}
