// src/tools/npm.rs

//! npm invocation
//!
//! The native package manager is the fallback of last resort and the delta
//! reconciler. Version resolution stays entirely on npm's side; stockpile
//! only hands it name@specifier pairs.

use super::Tool;
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default timeout for npm operations (10 minutes)
pub const NPM_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct NpmClient {
    timeout: Duration,
}

impl Default for NpmClient {
    fn default() -> Self {
        Self { timeout: NPM_TIMEOUT }
    }
}

impl NpmClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn npm(&self, cwd: &Path) -> Tool {
        Tool::new("npm").current_dir(cwd).timeout(self.timeout)
    }

    /// Full `npm install` against the project manifest.
    pub fn install_all(&self, cwd: &Path) -> Result<()> {
        info!("running full npm install");
        self.npm(cwd).arg("install").run()?;
        Ok(())
    }

    /// Install a specific set of name -> specifier pairs.
    ///
    /// `--no-save` keeps npm from editing the manifest: the manifest is the
    /// input here, never the output.
    pub fn install(&self, packages: &BTreeMap<String, String>, cwd: &Path) -> Result<()> {
        let specs: Vec<String> =
            packages.iter().map(|(name, spec)| format!("{name}@{spec}")).collect();
        info!("npm install {}", specs.join(" "));
        self.npm(cwd).arg("install").arg("--no-save").args(specs).run()?;
        Ok(())
    }

    /// Uninstall packages by name.
    pub fn uninstall(&self, packages: &[String], cwd: &Path) -> Result<()> {
        info!("npm uninstall {}", packages.join(" "));
        self.npm(cwd)
            .arg("uninstall")
            .arg("--no-save")
            .args(packages.iter().cloned())
            .run()?;
        Ok(())
    }
}
