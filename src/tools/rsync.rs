// src/tools/rsync.rs

//! rsync availability probe and tree sync
//!
//! When rsync is present, a pulled tree is merged over the existing
//! node_modules instead of replacing it wholesale, so unchanged files are
//! reused. The probe runs once per process and the answer is kept on the
//! client instance.

use super::Tool;
use crate::error::Result;
use std::cell::Cell;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default timeout for rsync operations (5 minutes)
pub const RSYNC_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub struct RsyncClient {
    timeout: Duration,
    available: Cell<Option<bool>>,
}

impl Default for RsyncClient {
    fn default() -> Self {
        Self {
            timeout: RSYNC_TIMEOUT,
            available: Cell::new(None),
        }
    }
}

impl RsyncClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            available: Cell::new(None),
        }
    }

    /// Whether rsync can be spawned at all. Probed lazily, once.
    pub fn available(&self) -> bool {
        if let Some(known) = self.available.get() {
            return known;
        }
        let found = Tool::new("rsync")
            .arg("--version")
            .timeout(Duration::from_secs(10))
            .try_run()
            .map(|out| out.success)
            .unwrap_or(false);
        debug!("rsync availability probe: {found}");
        self.available.set(Some(found));
        found
    }

    /// Mirror `src` into `dest`, deleting entries that are not in `src`.
    pub fn sync(&self, src: &Path, dest: &Path) -> Result<()> {
        // Trailing slash on the source: sync contents, not the directory
        // itself.
        let src_spec = format!("{}/", src.display());
        Tool::new("rsync")
            .args(["--archive", "--delete"])
            .arg(src_spec)
            .arg(dest.display().to_string())
            .timeout(self.timeout)
            .run()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn pretend_unavailable(&self) {
        self.available.set(Some(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_is_memoized() {
        let rsync = RsyncClient::default();
        rsync.pretend_unavailable();
        assert!(!rsync.available());
        // A second call must not re-probe and flip the answer.
        assert!(!rsync.available());
    }

    #[test]
    fn test_sync_mirrors_and_deletes() {
        let rsync = RsyncClient::default();
        if !rsync.available() {
            return; // environment without rsync
        }

        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("keep.txt"), "new").unwrap();
        std::fs::write(dest.path().join("keep.txt"), "old").unwrap();
        std::fs::write(dest.path().join("stale.txt"), "gone").unwrap();

        rsync.sync(src.path(), dest.path()).unwrap();

        assert_eq!(std::fs::read_to_string(dest.path().join("keep.txt")).unwrap(), "new");
        assert!(!dest.path().join("stale.txt").exists());
    }
}
