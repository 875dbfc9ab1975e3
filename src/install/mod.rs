// src/install/mod.rs

//! The install orchestrator
//!
//! Binds fingerprinting, the pull chain, the history walker, the delta
//! reconciler and the push fanout into one state machine:
//!
//! ```text
//! Start -> ComputeFingerprint -> TryChain -> {Done | HistoryFallback | NativeFallback | Fatal}
//! Done -> PushPhase -> {Complete | RePull}
//! RePull -> TryChain   (force set, fingerprint pinned, at most once)
//! ```
//!
//! A push conflict re-enters the install exactly once with the original
//! fingerprint pinned, so both racers converge on the same bundle. The
//! second pass reuses the pinned fingerprint unchanged and skips the
//! freshness checks.

mod history;
mod pull;
mod push;
pub mod reconcile;

pub use history::{walk_history, HistoryHit};
pub use pull::{pull_chain, ChainOutcome};
pub use push::push_fanout;
pub use reconcile::{diff, DepDiff};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::manifest::{Lockfile, Manifest};
use crate::tools::{GitClient, NpmClient};
use crate::workspace::{PendingRemoval, Workspace};
use std::path::Path;
use tracing::{info, warn};

/// Caller-facing install switches
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Replace an existing node_modules instead of refusing to run
    pub force: bool,
}

pub struct Installer<'a> {
    config: &'a Config,
    workspace: Workspace,
    git: GitClient,
    npm: NpmClient,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a Config, project_root: &Path) -> Self {
        Self {
            config,
            workspace: Workspace::new(project_root, config.timeouts.rsync),
            git: GitClient::new(config.timeouts.git),
            npm: NpmClient::new(config.timeouts.npm),
        }
    }

    /// Run a full install: at most two passes, the second only after a
    /// push conflict and with the fingerprint pinned.
    pub fn install(&self, options: InstallOptions) -> Result<()> {
        let mut force = options.force;
        let mut pinned: Option<Fingerprint> = None;

        loop {
            match self.install_pass(force, pinned.as_ref()) {
                Err(Error::RePullNeeded(hash)) if pinned.is_none() => {
                    info!("re-pulling bundle {hash}");
                    pinned = Some(Fingerprint::parse(&hash)?);
                    force = true;
                }
                outcome => return outcome,
            }
        }
    }

    /// One pass of the state machine. `pinned` is set only on the re-pull
    /// pass.
    fn install_pass(&self, force: bool, pinned: Option<&Fingerprint>) -> Result<()> {
        let re_pull = pinned.is_some();
        let root = self.workspace.root();

        // Start
        if self.workspace.node_modules().exists() && !force {
            return Err(Error::NodeModulesAlreadyExist);
        }
        let mut removal = self.workspace.clear_node_modules()?;

        // ComputeFingerprint (reused unchanged on the re-pull pass)
        let manifest = Manifest::load(root)?;
        let current = match pinned {
            Some(fp) => fp.clone(),
            None => {
                let lockfile = Lockfile::load(root)?;
                fingerprint(&manifest, lockfile.as_ref(), &self.config.salt)
            }
        };
        info!("fingerprint {current}");

        // TryChain
        match pull_chain(&self.config.chain, &current, &self.workspace, &mut removal) {
            Ok(outcome) => {
                return self.push_phase(&outcome.missed, &current, re_pull);
            }
            Err(Error::BundlesNotFound(_)) => {}
            Err(other) => return Err(other),
        }

        let everyone: Vec<usize> = (0..self.config.chain.len()).collect();

        // HistoryFallback
        if self.config.history_depth > 0 && self.git.is_work_tree(root) {
            match self.history_pass(&manifest, &current, &mut removal) {
                Ok(()) => return self.push_phase(&everyone, &current, re_pull),
                Err(err) if self.config.fallback_to_npm => {
                    warn!("history fallback failed ({err}), falling back to npm");
                }
                Err(err) => return Err(err),
            }
        } else if !self.config.fallback_to_npm {
            return Err(Error::BundlesNotFound(current.to_string()));
        }

        // NativeFallback (fallback_to_npm is necessarily set here)
        self.workspace.clear_for_rebuild(&mut removal)?;
        self.npm.install_all(root)?;
        self.push_phase(&everyone, &current, re_pull)
    }

    /// Walk the manifest history and reconcile the pulled near-miss bundle
    /// against the current manifest.
    fn history_pass(
        &self,
        manifest: &Manifest,
        current: &Fingerprint,
        removal: &mut PendingRemoval,
    ) -> Result<()> {
        let hit = walk_history(
            &self.config.chain,
            &self.workspace,
            removal,
            &self.git,
            current,
            &self.config.salt,
            self.config.history_depth,
        )?;

        let delta = diff(&hit.manifest, manifest);
        if delta.is_empty() {
            // The fingerprints differ (lockfile or salt), but the
            // dependency sets agree; the pulled tree is already right.
            info!("older bundle already matches the current dependency set");
            return Ok(());
        }
        reconcile::reconcile(&delta, &self.npm, self.workspace.root())
    }

    fn push_phase(&self, targets: &[usize], current: &Fingerprint, re_pull: bool) -> Result<()> {
        push_fanout(
            &self.config.chain,
            targets,
            current,
            re_pull,
            &self.workspace,
        )
    }
}
