// src/install/pull.rs

//! Ordered pull across the backend chain

use crate::backend::Chain;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::workspace::{PendingRemoval, Workspace};
use tracing::{debug, info, warn};

/// A successful chain pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    /// Index of the backend that served the bundle
    pub hit: usize,
    /// Indices of the backends that missed; always the strict prefix of the
    /// chain before `hit`. Backends after the hit were never consulted.
    pub missed: Vec<usize>,
}

/// Try each backend in order until one produces the bundle.
///
/// On success the pulled tree is already placed into the project root (any
/// pending node_modules removal is awaited first). A `BundleNotFound` is a
/// silent miss; an opaque `BackendError` (a timed-out tool, an unreachable
/// remote) is a warned miss — either way the next backend is tried, and
/// both count toward the missed prefix. Exhaustion is `BundlesNotFound`.
pub fn pull_chain(
    chain: &Chain,
    fingerprint: &Fingerprint,
    workspace: &Workspace,
    removal: &mut PendingRemoval,
) -> Result<ChainOutcome> {
    for (index, descriptor) in chain.iter().enumerate() {
        let workdir = workspace.scratch_dir()?;
        let cache_dir = workspace.scratch_dir()?;

        debug!("pulling {} from '{}'", fingerprint.short(), descriptor.alias);
        match descriptor
            .backend
            .pull(fingerprint, workdir.path(), cache_dir.path())
        {
            Ok(()) => {
                workspace.place_tree(workdir.path(), removal)?;
                info!(
                    "pulled bundle {} from '{}'",
                    fingerprint.short(),
                    descriptor.alias
                );
                return Ok(ChainOutcome {
                    hit: index,
                    missed: (0..index).collect(),
                });
            }
            Err(Error::BundleNotFound { .. }) => {
                info!("'{}' has no bundle {}", descriptor.alias, fingerprint.short());
            }
            Err(Error::BackendError { backend, reason }) => {
                warn!("'{backend}' failed to pull ({reason}), trying the next backend");
            }
            Err(other) => return Err(other),
        }
    }

    Err(Error::BundlesNotFound(fingerprint.to_string()))
}
