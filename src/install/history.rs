// src/install/history.rs

//! Manifest-history fallback
//!
//! A manifest usually differs from its recent history by a handful of
//! entries. When no backend has the current fingerprint, walking the
//! manifest's git history often finds a near-miss bundle; restoring it and
//! reconciling the difference beats a full install.
//!
//! Revisions whose recomputed fingerprint equals the previous one did not
//! change the dependency set (a version-field bump, say) and do not count
//! against the configured depth: the walk transparently extends past them.

use super::pull::{pull_chain, ChainOutcome};
use crate::backend::Chain;
use crate::error::{Error, Result};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::manifest::{Lockfile, Manifest, LOCKFILE_NAMES, MANIFEST_FILE};
use crate::tools::GitClient;
use crate::workspace::{PendingRemoval, Workspace};
use serde_json::Value;
use tracing::{debug, info};

/// A history hit: the bundle is installed and `manifest` is the older
/// manifest it was built from; the caller reconciles against the current
/// manifest.
pub struct HistoryHit {
    pub manifest: Manifest,
    pub outcome: ChainOutcome,
}

pub fn walk_history(
    chain: &Chain,
    workspace: &Workspace,
    removal: &mut PendingRemoval,
    git: &GitClient,
    current: &Fingerprint,
    salt: &Value,
    depth: u32,
) -> Result<HistoryHit> {
    let root = workspace.root();
    let revisions = git.history_of(root, MANIFEST_FILE)?;

    let mut last = current.clone();
    let mut budget = depth as usize;
    let mut index = 0usize;

    while index <= budget {
        // index + 1 commits older than the newest manifest-touching commit
        let Some(revision) = revisions.get(index + 1) else {
            debug!("manifest history exhausted after {index} revisions");
            break;
        };

        let Some(manifest_text) = git.show_at(root, revision, MANIFEST_FILE)? else {
            index += 1;
            continue;
        };
        let Ok(manifest) = Manifest::parse(&manifest_text) else {
            // An unparseable older manifest fails this index, not the walk.
            debug!("manifest at {} does not parse, skipping", &revision[..10]);
            index += 1;
            continue;
        };

        let lockfile = match lockfile_at(git, root, revision) {
            Ok(lockfile) => lockfile,
            Err(_) => {
                debug!("lockfile at {} does not parse, skipping", &revision[..10]);
                index += 1;
                continue;
            }
        };

        let older = fingerprint(&manifest, lockfile.as_ref(), salt);
        if older == last {
            debug!(
                "dependencies unchanged at {}, extending depth",
                &revision[..10]
            );
            budget += 1;
            index += 1;
            continue;
        }
        last = older.clone();

        info!(
            "trying bundle {} from revision {}",
            older.short(),
            &revision[..10]
        );
        match pull_chain(chain, &older, workspace, removal) {
            Ok(outcome) => return Ok(HistoryHit { manifest, outcome }),
            Err(Error::BundlesNotFound(_)) => index += 1,
            Err(other) => return Err(other),
        }
    }

    Err(Error::BundlesNotFound(current.to_string()))
}

/// The lockfile as tracked at `revision`, if any.
fn lockfile_at(git: &GitClient, root: &std::path::Path, revision: &str) -> Result<Option<Lockfile>> {
    for name in LOCKFILE_NAMES {
        if let Some(text) = git.show_at(root, revision, name)? {
            return Lockfile::parse(&text).map(Some);
        }
    }
    Ok(None)
}
