// src/workspace.rs

//! Workspace management
//!
//! Scratch working directories and per-backend cache directories are
//! created inside the project root (renames must stay on one filesystem)
//! and cleaned up by RAII on every exit path. The process working
//! directory is never changed; every path is handed around explicitly.
//!
//! Removing an existing node_modules is deferred so a failed pull never
//! destroys a working tree:
//!
//! - move mode (no rsync): the tree is renamed aside immediately, which is
//!   cheap and atomic, and deleted on a background thread while the pull
//!   runs; the deletion is joined only when a pulled tree is ready to take
//!   its place.
//! - sync mode (rsync available): the tree stays where it is and the
//!   pulled tree is merged over it with `--delete`, reusing unchanged
//!   files.

use crate::bundle::TREE_DIR;
use crate::error::{Error, Result};
use crate::tools::RsyncClient;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tempfile::TempDir;
use tracing::debug;

const SCRATCH_PREFIX: &str = ".stockpile-scratch-";
const TRASH_PREFIX: &str = ".stockpile-trash-";

pub struct Workspace {
    root: PathBuf,
    rsync: RsyncClient,
}

impl Workspace {
    pub fn new(root: &Path, rsync_timeout: Duration) -> Self {
        Self {
            root: root.to_path_buf(),
            rsync: RsyncClient::new(rsync_timeout),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn node_modules(&self) -> PathBuf {
        self.root.join(TREE_DIR)
    }

    /// Fresh scratch directory inside the project root. Dropped (and thus
    /// removed) on every exit path.
    pub fn scratch_dir(&self) -> Result<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.root)?)
    }

    /// Whether pulled trees will be sync-merged rather than move-replaced.
    pub fn sync_mode(&self) -> bool {
        self.rsync.available()
    }

    /// Initiate removal of an existing node_modules tree.
    pub fn clear_node_modules(&self) -> Result<PendingRemoval> {
        let tree = self.node_modules();
        if !tree.exists() {
            return Ok(PendingRemoval::None);
        }
        if self.sync_mode() {
            debug!("leaving node_modules in place for sync-merge");
            return Ok(PendingRemoval::Deferred);
        }

        static TRASH_SEQ: AtomicU64 = AtomicU64::new(0);
        let trash = self.root.join(format!(
            "{TRASH_PREFIX}{}-{}",
            std::process::id(),
            TRASH_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::rename(&tree, &trash)?;
        debug!("deleting old node_modules in the background");
        let doomed = trash.clone();
        let handle = std::thread::spawn(move || std::fs::remove_dir_all(&doomed));
        Ok(PendingRemoval::Background { handle: Some(handle), trash })
    }

    /// Move or merge a pulled tree from `workdir` into the project root.
    ///
    /// Any pending removal is awaited first; only then does the project
    /// see the new tree.
    pub fn place_tree(&self, workdir: &Path, removal: &mut PendingRemoval) -> Result<()> {
        let src = workdir.join(TREE_DIR);
        if !src.is_dir() {
            return Err(Error::Internal(format!(
                "backend reported success but {} is missing",
                src.display()
            )));
        }

        match removal {
            PendingRemoval::Deferred => {
                debug!("sync-merging pulled tree into node_modules");
                self.rsync.sync(&src, &self.node_modules())
            }
            other => {
                other.wait()?;
                std::fs::rename(&src, self.node_modules())?;
                Ok(())
            }
        }
    }

    /// Synchronously remove whatever tree exists, pending or live. A full
    /// native install starts from a clean slate.
    pub fn clear_for_rebuild(&self, removal: &mut PendingRemoval) -> Result<()> {
        removal.wait()?;
        let tree = self.node_modules();
        if tree.exists() {
            std::fs::remove_dir_all(&tree)?;
        }
        *removal = PendingRemoval::None;
        Ok(())
    }
}

/// The state of a scheduled node_modules removal
pub enum PendingRemoval {
    /// Nothing to remove
    None,
    /// Tree left in place; the sync tool reconciles it
    Deferred,
    /// Tree renamed aside, deletion running on a background thread
    Background {
        handle: Option<JoinHandle<io::Result<()>>>,
        trash: PathBuf,
    },
}

impl PendingRemoval {
    /// Wait for a background deletion to finish. Idempotent.
    pub fn wait(&mut self) -> Result<()> {
        if let PendingRemoval::Background { handle, trash } = self {
            if let Some(handle) = handle.take() {
                handle
                    .join()
                    .map_err(|_| Error::Internal("removal thread panicked".to_string()))?
                    .map_err(|e| {
                        Error::Internal(format!("failed to delete {}: {e}", trash.display()))
                    })?;
            }
        }
        Ok(())
    }
}

impl Drop for PendingRemoval {
    fn drop(&mut self) {
        if let PendingRemoval::Background { handle, .. } = self {
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}
