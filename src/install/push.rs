// src/install/push.rs

//! Push fanout over missed backends
//!
//! Every push-capable backend that missed during the pull gets the freshly
//! materialized bundle. A `BundleAlreadyExists` means another writer won
//! the race; the fanout stops and asks the orchestrator for one re-pull.
//! Pushes that completed before the conflict stay committed.

use crate::backend::Chain;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::workspace::Workspace;
use tracing::{debug, warn};

pub fn push_fanout(
    chain: &Chain,
    targets: &[usize],
    fingerprint: &Fingerprint,
    re_pull: bool,
    workspace: &Workspace,
) -> Result<()> {
    for &index in targets {
        let descriptor = &chain[index];
        if !descriptor.push {
            debug!("'{}' is not a push target", descriptor.alias);
            continue;
        }

        let cache_dir = workspace.scratch_dir()?;
        match descriptor
            .backend
            .push(fingerprint, workspace.root(), cache_dir.path())
        {
            Ok(()) => {}
            Err(err @ Error::BundleAlreadyExists { .. }) => {
                if re_pull {
                    // We already re-pulled for this fingerprint once; a
                    // second conflict means something is wrong.
                    return Err(err);
                }
                warn!(
                    "'{}' already holds {}, scheduling re-pull",
                    descriptor.alias,
                    fingerprint.short()
                );
                return Err(Error::RePullNeeded(fingerprint.to_string()));
            }
            Err(err) => {
                if descriptor.push_may_fail {
                    warn!("push to '{}' failed (tolerated): {err}", descriptor.alias);
                } else {
                    return Err(err);
                }
            }
        }
    }
    Ok(())
}
