// src/backend/git.rs

//! git backend
//!
//! Each bundle is one tag (`stockpile-<fingerprint>`) pointing at a
//! single-file root commit in a dedicated bundle repository. Pull is a
//! shallow clone of the tag; push is commit + tag + push-tag, with a
//! rejected push read as a concurrent writer winning the race.
//!
//! The remote tag list is fetched once per process and kept on the
//! instance; it is dropped after a push conflict so the re-pull pass sees
//! the winner's tag.

use super::{opaque, Backend};
use crate::bundle;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::tools::GitClient;
use serde::Deserialize;
use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const TAG_PREFIX: &str = "stockpile-";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GitOptions {
    repo: String,
    timeout_secs: Option<u64>,
    /// Probe for a usable git binary during validation
    check_git: Option<bool>,
}

pub struct GitBackend {
    alias: String,
    repo: String,
    check_git: bool,
    git: GitClient,
    remote_tags: RefCell<Option<Vec<String>>>,
}

impl GitBackend {
    pub fn from_options(alias: &str, options: toml::Value) -> Result<Self> {
        let options: GitOptions =
            options.try_into().map_err(|e| Error::InvalidOptions {
                backend: alias.to_string(),
                reason: e.to_string(),
            })?;
        let git = options
            .timeout_secs
            .map(|secs| GitClient::new(Duration::from_secs(secs)))
            .unwrap_or_default();
        Ok(Self {
            alias: alias.to_string(),
            repo: options.repo,
            check_git: options.check_git.unwrap_or(false),
            git,
            remote_tags: RefCell::new(None),
        })
    }

    fn tag_for(fingerprint: &Fingerprint) -> String {
        format!("{TAG_PREFIX}{fingerprint}")
    }

    /// Remote tag list, fetched lazily once per process.
    fn tags(&self, cwd: &Path) -> Result<Vec<String>> {
        if let Some(tags) = self.remote_tags.borrow().as_ref() {
            return Ok(tags.clone());
        }
        let tags = self
            .git
            .remote_tags(cwd, &self.repo)
            .map_err(|e| opaque(&self.alias, e))?;
        debug!("'{}' has {} bundle tags", self.alias, tags.len());
        *self.remote_tags.borrow_mut() = Some(tags.clone());
        Ok(tags)
    }

    fn forget_tags(&self) {
        *self.remote_tags.borrow_mut() = None;
    }
}

impl Backend for GitBackend {
    fn validate(&mut self) -> Result<()> {
        if self.repo.trim().is_empty() {
            return Err(Error::InvalidOptions {
                backend: self.alias.clone(),
                reason: "repo must not be empty".to_string(),
            });
        }
        if self.check_git {
            crate::tools::Tool::new("git")
                .arg("--version")
                .timeout(Duration::from_secs(10))
                .run()
                .map_err(|e| Error::InvalidOptions {
                    backend: self.alias.clone(),
                    reason: format!("git is not usable: {e}"),
                })?;
        }
        Ok(())
    }

    fn pull(&self, fingerprint: &Fingerprint, workdir: &Path, cache_dir: &Path) -> Result<()> {
        let tag = Self::tag_for(fingerprint);
        let checkout = cache_dir.join("bundle-repo");

        let cloned = self
            .git
            .clone_tag(&self.repo, &tag, &checkout)
            .map_err(|e| opaque(&self.alias, e))?;
        if !cloned {
            return Err(Error::BundleNotFound {
                backend: self.alias.clone(),
                fingerprint: fingerprint.to_string(),
            });
        }

        let archive = checkout.join(format!("{fingerprint}.tar.gz"));
        if !archive.is_file() {
            return Err(Error::backend(
                &self.alias,
                format!("tag {tag} does not carry a bundle archive"),
            ));
        }
        bundle::unpack(&archive, workdir).map_err(|e| opaque(&self.alias, e))
    }

    fn push(&self, fingerprint: &Fingerprint, project_root: &Path, cache_dir: &Path) -> Result<()> {
        let tag = Self::tag_for(fingerprint);
        let already_exists = || Error::BundleAlreadyExists {
            backend: self.alias.clone(),
            fingerprint: fingerprint.to_string(),
        };

        if self.tags(cache_dir)?.contains(&tag) {
            return Err(already_exists());
        }

        let staging = cache_dir.join("push-repo");
        std::fs::create_dir_all(&staging)?;
        self.git
            .init_with_origin(&staging, &self.repo)
            .map_err(|e| opaque(&self.alias, e))?;

        bundle::pack(
            &project_root.join(bundle::TREE_DIR),
            &staging.join(format!("{fingerprint}.tar.gz")),
            bundle::DEFAULT_COMPRESSION,
        )
        .map_err(|e| opaque(&self.alias, e))?;

        self.git
            .commit_all(&staging, &format!("bundle {fingerprint}"))
            .map_err(|e| opaque(&self.alias, e))?;
        self.git.tag(&staging, &tag).map_err(|e| opaque(&self.alias, e))?;

        let accepted = self
            .git
            .push_tag(&staging, &tag)
            .map_err(|e| opaque(&self.alias, e))?;
        if !accepted {
            // Another writer pushed this tag between our ls-remote and now.
            self.forget_tags();
            return Err(already_exists());
        }

        info!("pushed bundle {} to '{}'", fingerprint.short(), self.alias);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use tempfile::TempDir;

    fn options(repo: &str) -> toml::Value {
        let mut table = toml::value::Table::new();
        table.insert("repo".to_string(), toml::Value::String(repo.to_string()));
        toml::Value::Table(table)
    }

    /// Bare repository standing in for the remote.
    fn bare_remote() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        Tool::new("git")
            .args(["init", "--bare", "--quiet"])
            .current_dir(dir.path())
            .run()
            .unwrap();
        dir
    }

    fn project_with_tree() -> TempDir {
        let root = tempfile::tempdir().unwrap();
        let tree = root.path().join("node_modules");
        std::fs::create_dir_all(tree.join("pkg")).unwrap();
        std::fs::write(tree.join("pkg/index.js"), "ok").unwrap();
        root
    }

    fn fingerprint() -> Fingerprint {
        Fingerprint::parse(&"12".repeat(32)).unwrap()
    }

    #[test]
    fn test_validate_rejects_empty_repo() {
        let mut backend = GitBackend::from_options("origin", options("  ")).unwrap();
        assert!(matches!(
            backend.validate().unwrap_err(),
            Error::InvalidOptions { .. }
        ));
    }

    #[test]
    fn test_pull_miss_on_absent_tag() {
        let remote = bare_remote();
        let mut backend =
            GitBackend::from_options("origin", options(&remote.path().display().to_string()))
                .unwrap();
        backend.validate().unwrap();

        let work = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let err = backend.pull(&fingerprint(), work.path(), cache.path()).unwrap_err();
        assert!(matches!(err, Error::BundleNotFound { .. }));
    }

    #[test]
    fn test_push_pull_round_trip_and_conflict() {
        let remote = bare_remote();
        let mut backend =
            GitBackend::from_options("origin", options(&remote.path().display().to_string()))
                .unwrap();
        backend.validate().unwrap();
        let project = project_with_tree();

        let cache = tempfile::tempdir().unwrap();
        backend.push(&fingerprint(), project.path(), cache.path()).unwrap();

        // A second writer (fresh instance, empty memo) sees the tag.
        let second =
            GitBackend::from_options("origin", options(&remote.path().display().to_string()))
                .unwrap();
        let cache2 = tempfile::tempdir().unwrap();
        let err = second.push(&fingerprint(), project.path(), cache2.path()).unwrap_err();
        assert!(matches!(err, Error::BundleAlreadyExists { .. }));

        let work = tempfile::tempdir().unwrap();
        let cache3 = tempfile::tempdir().unwrap();
        backend.pull(&fingerprint(), work.path(), cache3.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(work.path().join("node_modules/pkg/index.js")).unwrap(),
            "ok"
        );
    }

    #[test]
    fn test_tag_memo_is_dropped_after_conflict() {
        let remote = bare_remote();
        let backend =
            GitBackend::from_options("origin", options(&remote.path().display().to_string()))
                .unwrap();
        let cache = tempfile::tempdir().unwrap();

        // Warm the memo while the remote is empty.
        assert!(backend.tags(cache.path()).unwrap().is_empty());
        backend.forget_tags();
        assert!(backend.remote_tags.borrow().is_none());
    }
}
