// src/install/reconcile.rs

//! Delta reconciliation between two manifests
//!
//! After a history hit the installed tree matches an older manifest; the
//! set-difference against the current manifest is handed to npm. Installs
//! run before uninstalls: new versions may replace old packages
//! transitively, shrinking the uninstall set.

use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::tools::NpmClient;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Set-difference between two merged dependency maps
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DepDiff {
    /// Entries new to, or changed in, the current manifest
    pub to_install: BTreeMap<String, String>,
    /// Names dropped from the current manifest
    pub to_uninstall: Vec<String>,
}

impl DepDiff {
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_uninstall.is_empty()
    }
}

/// Diff `old` against `new` over the merged (runtime-wins) maps.
pub fn diff(old: &Manifest, new: &Manifest) -> DepDiff {
    let old_all = old.merged();
    let new_all = new.merged();

    let to_install = new_all
        .iter()
        .filter(|(name, spec)| old_all.get(*name) != Some(spec))
        .map(|(name, spec)| (name.clone(), spec.clone()))
        .collect();

    let to_uninstall = old_all
        .keys()
        .filter(|name| !new_all.contains_key(*name))
        .cloned()
        .collect();

    DepDiff { to_install, to_uninstall }
}

/// Drive npm over a non-empty diff.
///
/// The orchestrator never calls this with an empty diff; reaching here with
/// one is a bug upstream, not a no-op.
pub fn reconcile(diff: &DepDiff, npm: &NpmClient, root: &Path) -> Result<()> {
    if diff.is_empty() {
        return Err(Error::Internal(
            "reconcile called with an empty dependency diff".to_string(),
        ));
    }

    info!(
        "reconciling: {} to install, {} to uninstall",
        diff.to_install.len(),
        diff.to_uninstall.len()
    );

    if !diff.to_install.is_empty() {
        npm.install(&diff.to_install, root)?;
    }
    if !diff.to_uninstall.is_empty() {
        npm.uninstall(&diff.to_uninstall, root)?;
    }
    Ok(())
}
