// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use stockpile::backend::{Backend, BackendDescriptor, Chain};
use stockpile::config::{Config, ToolTimeouts};
use stockpile::fingerprint::Fingerprint;
use stockpile::{Error, Result};
use tempfile::TempDir;

/// Shared event log recording backend calls in order, as
/// `"pull:<alias>"` / `"push:<alias>"` entries.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Scripted pull behavior, consumed one entry per call
pub enum PullScript {
    /// Materialize a tree containing `marker.txt` with this content
    Hit(String),
    Miss,
    Fail(String),
}

/// Scripted push behavior, consumed one entry per call
pub enum PushScript {
    Ok,
    Conflict,
    Fail(String),
}

/// A backend whose pull/push outcomes are scripted per call.
pub struct MockBackend {
    alias: String,
    pulls: Mutex<VecDeque<PullScript>>,
    pushes: Mutex<VecDeque<PushScript>>,
    log: EventLog,
}

impl MockBackend {
    pub fn new(
        alias: &str,
        pulls: Vec<PullScript>,
        pushes: Vec<PushScript>,
        log: EventLog,
    ) -> Self {
        Self {
            alias: alias.to_string(),
            pulls: Mutex::new(pulls.into()),
            pushes: Mutex::new(pushes.into()),
            log,
        }
    }
}

impl Backend for MockBackend {
    fn validate(&mut self) -> Result<()> {
        Ok(())
    }

    fn pull(&self, fingerprint: &Fingerprint, workdir: &Path, _cache_dir: &Path) -> Result<()> {
        self.log.lock().unwrap().push(format!("pull:{}", self.alias));
        match self.pulls.lock().unwrap().pop_front() {
            Some(PullScript::Hit(marker)) => {
                let tree = workdir.join("node_modules");
                std::fs::create_dir_all(&tree).unwrap();
                std::fs::write(tree.join("marker.txt"), marker).unwrap();
                Ok(())
            }
            Some(PullScript::Miss) | None => Err(Error::BundleNotFound {
                backend: self.alias.clone(),
                fingerprint: fingerprint.to_string(),
            }),
            Some(PullScript::Fail(reason)) => Err(Error::BackendError {
                backend: self.alias.clone(),
                reason,
            }),
        }
    }

    fn push(&self, fingerprint: &Fingerprint, _project_root: &Path, _cache_dir: &Path) -> Result<()> {
        self.log.lock().unwrap().push(format!("push:{}", self.alias));
        match self.pushes.lock().unwrap().pop_front() {
            Some(PushScript::Ok) | None => Ok(()),
            Some(PushScript::Conflict) => Err(Error::BundleAlreadyExists {
                backend: self.alias.clone(),
                fingerprint: fingerprint.to_string(),
            }),
            Some(PushScript::Fail(reason)) => Err(Error::BackendError {
                backend: self.alias.clone(),
                reason,
            }),
        }
    }
}

/// Descriptor for a push-capable mock backend.
pub fn descriptor(
    alias: &str,
    pulls: Vec<PullScript>,
    pushes: Vec<PushScript>,
    log: &EventLog,
) -> BackendDescriptor {
    BackendDescriptor {
        alias: alias.to_string(),
        push: true,
        push_may_fail: false,
        backend: Box::new(MockBackend::new(alias, pulls, pushes, log.clone())),
    }
}

/// Config wired straight to a mock chain, no file parsing involved.
pub fn mock_config(chain: Chain) -> Config {
    Config {
        chain,
        history_depth: 0,
        fallback_to_npm: false,
        salt: serde_json::json!({}),
        timeouts: ToolTimeouts::default(),
    }
}

/// A throwaway project directory with a manifest.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let project = Self { dir: tempfile::tempdir().unwrap() };
        project.write_manifest(r#"{"dependencies": {"left-pad": "1.3.0"}}"#);
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_manifest(&self, text: &str) {
        std::fs::write(self.root().join("package.json"), text).unwrap();
    }

    pub fn node_modules(&self) -> PathBuf {
        self.root().join("node_modules")
    }

    /// Seed a pre-existing dependency tree.
    pub fn seed_node_modules(&self, marker: &str) {
        let tree = self.node_modules();
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("preexisting.txt"), marker).unwrap();
    }

    pub fn marker(&self) -> String {
        std::fs::read_to_string(self.node_modules().join("marker.txt")).unwrap()
    }

    /// Names of stray `.stockpile-*` entries left at the root.
    pub fn scratch_litter(&self) -> Vec<String> {
        std::fs::read_dir(self.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with(".stockpile-"))
            .collect()
    }
}
