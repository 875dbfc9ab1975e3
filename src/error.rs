// src/error.rs

//! Error types for stockpile
//!
//! One closed set of error kinds covers the whole install pipeline. The
//! install orchestrator recovers locally from exactly three of them
//! (`BundleNotFound` inside the pull chain, `BundlesNotFound` via the
//! fallbacks, `BundleAlreadyExists` via a single re-pull); everything else
//! propagates to the CLI and becomes the process exit reason.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for stockpile operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during an install
#[derive(Debug, Error)]
pub enum Error {
    #[error("manifest not found at {0}")]
    ManifestNotFound(PathBuf),

    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("node_modules already exists; re-run with --force to replace it")]
    NodeModulesAlreadyExist,

    /// A single backend has no bundle for this fingerprint. The pull chain
    /// records the miss and moves on to the next backend.
    #[error("backend '{backend}' has no bundle {fingerprint}")]
    BundleNotFound { backend: String, fingerprint: String },

    /// Every configured backend missed.
    #[error("no backend has a bundle for {0}")]
    BundlesNotFound(String),

    /// Another writer pushed this fingerprint first.
    #[error("backend '{backend}' already holds bundle {fingerprint}")]
    BundleAlreadyExists { backend: String, fingerprint: String },

    /// Raised out of the push fanout on a writer race; consumed by the
    /// orchestrator, which re-enters the install with the fingerprint pinned.
    #[error("bundle {0} appeared on a backend mid-push, re-pull required")]
    RePullNeeded(String),

    #[error("invalid options for backend '{backend}': {reason}")]
    InvalidOptions { backend: String, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Opaque backend failure. The pull chain aborts on it; the push fanout
    /// consults the descriptor's `push_may_fail` flag.
    #[error("backend '{backend}' failed: {reason}")]
    BackendError { backend: String, reason: String },

    #[error("external command '{tool}' failed: {reason}")]
    CommandFailed { tool: String, reason: String },

    #[error("install was cancelled")]
    Cancelled,

    /// A precondition the orchestrator is supposed to uphold was violated.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code surfaced to the CLI.
    ///
    /// 0 is reserved for success; any kind without a dedicated code exits 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NodeModulesAlreadyExist => 2,
            Error::ManifestNotFound(_) => 3,
            Error::BundlesNotFound(_) => 4,
            _ => 1,
        }
    }

    /// Shorthand for an opaque backend failure.
    pub fn backend(alias: &str, reason: impl Into<String>) -> Self {
        Error::BackendError {
            backend: alias.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::NodeModulesAlreadyExist.exit_code(), 2);
        assert_eq!(Error::ManifestNotFound(PathBuf::from("package.json")).exit_code(), 3);
        assert_eq!(Error::BundlesNotFound("abc".to_string()).exit_code(), 4);
        assert_eq!(Error::Cancelled.exit_code(), 1);
        assert_eq!(
            Error::backend("local", "disk on fire").exit_code(),
            1
        );
    }

    #[test]
    fn test_display_carries_context() {
        let err = Error::BundleAlreadyExists {
            backend: "origin".to_string(),
            fingerprint: "deadbeef".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("origin"));
        assert!(msg.contains("deadbeef"));
    }
}
