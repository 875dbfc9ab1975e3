// src/backend/local.rs

//! Local directory backend
//!
//! Bundles live as `<fingerprint>.tar.gz` files in one directory, which is
//! typically an NFS mount shared across build agents. Pushes stage the
//! archive next to the target and hard-link it into place; the link call
//! is what makes the at-most-once guarantee hold under concurrent writers.

use super::{opaque, Backend};
use crate::bundle;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocalOptions {
    directory: PathBuf,
    compression: Option<u32>,
}

#[derive(Debug)]
pub struct LocalBackend {
    alias: String,
    directory: PathBuf,
    compression: u32,
}

impl LocalBackend {
    pub fn from_options(alias: &str, options: toml::Value) -> Result<Self> {
        let options: LocalOptions =
            options.try_into().map_err(|e| Error::InvalidOptions {
                backend: alias.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            alias: alias.to_string(),
            directory: options.directory,
            compression: options.compression.unwrap_or(bundle::DEFAULT_COMPRESSION),
        })
    }

    fn archive_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.directory.join(format!("{fingerprint}.tar.gz"))
    }
}

impl Backend for LocalBackend {
    fn validate(&mut self) -> Result<()> {
        if self.compression > 9 {
            return Err(Error::InvalidOptions {
                backend: self.alias.clone(),
                reason: format!("compression must be 0-9, got {}", self.compression),
            });
        }
        std::fs::create_dir_all(&self.directory).map_err(|e| Error::InvalidOptions {
            backend: self.alias.clone(),
            reason: format!("cannot create {}: {e}", self.directory.display()),
        })?;
        Ok(())
    }

    fn pull(&self, fingerprint: &Fingerprint, workdir: &Path, _cache_dir: &Path) -> Result<()> {
        let archive = self.archive_path(fingerprint);
        if !archive.is_file() {
            return Err(Error::BundleNotFound {
                backend: self.alias.clone(),
                fingerprint: fingerprint.to_string(),
            });
        }
        debug!("extracting {}", archive.display());
        bundle::unpack(&archive, workdir).map_err(|e| opaque(&self.alias, e))
    }

    fn push(&self, fingerprint: &Fingerprint, project_root: &Path, _cache_dir: &Path) -> Result<()> {
        let dest = self.archive_path(fingerprint);
        let already_exists = || Error::BundleAlreadyExists {
            backend: self.alias.clone(),
            fingerprint: fingerprint.to_string(),
        };
        if dest.exists() {
            return Err(already_exists());
        }

        // Stage inside the target directory so the link below never
        // crosses a filesystem boundary.
        let staging = self
            .directory
            .join(format!(".{fingerprint}.{}.tmp", std::process::id()));
        bundle::pack(&project_root.join(bundle::TREE_DIR), &staging, self.compression)
            .map_err(|e| opaque(&self.alias, e))?;

        let linked = std::fs::hard_link(&staging, &dest);
        let _ = std::fs::remove_file(&staging);
        match linked {
            Ok(()) => {
                info!("pushed bundle {} to '{}'", fingerprint.short(), self.alias);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(already_exists()),
            Err(e) => Err(Error::backend(&self.alias, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(dir: &Path) -> toml::Value {
        let mut table = toml::value::Table::new();
        table.insert(
            "directory".to_string(),
            toml::Value::String(dir.display().to_string()),
        );
        toml::Value::Table(table)
    }

    fn fingerprint() -> Fingerprint {
        Fingerprint::parse(&"ab".repeat(32)).unwrap()
    }

    fn project_with_tree() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let tree = root.path().join("node_modules");
        std::fs::create_dir_all(tree.join("pkg")).unwrap();
        std::fs::write(tree.join("pkg/index.js"), "ok").unwrap();
        root
    }

    fn backend(dir: &Path) -> LocalBackend {
        let mut backend = LocalBackend::from_options("store", options(dir)).unwrap();
        backend.validate().unwrap();
        backend
    }

    #[test]
    fn test_pull_miss() {
        let store = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();

        let err = backend(store.path())
            .pull(&fingerprint(), work.path(), cache.path())
            .unwrap_err();
        assert!(matches!(err, Error::BundleNotFound { .. }));
    }

    #[test]
    fn test_push_then_pull_round_trip() {
        let store = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let project = project_with_tree();
        let backend = backend(store.path());

        backend.push(&fingerprint(), project.path(), cache.path()).unwrap();

        let work = tempfile::tempdir().unwrap();
        backend.pull(&fingerprint(), work.path(), cache.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(work.path().join("node_modules/pkg/index.js")).unwrap(),
            "ok"
        );
    }

    #[test]
    fn test_second_push_conflicts() {
        let store = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let project = project_with_tree();
        let backend = backend(store.path());

        backend.push(&fingerprint(), project.path(), cache.path()).unwrap();
        let err = backend.push(&fingerprint(), project.path(), cache.path()).unwrap_err();
        assert!(matches!(err, Error::BundleAlreadyExists { .. }));
    }

    #[test]
    fn test_push_leaves_no_staging_litter() {
        let store = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let project = project_with_tree();
        let backend = backend(store.path());

        backend.push(&fingerprint(), project.path(), cache.path()).unwrap();

        let stray: Vec<_> = std::fs::read_dir(store.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(stray.is_empty());
    }

    #[test]
    fn test_invalid_compression_rejected() {
        let store = tempfile::tempdir().unwrap();
        let mut table = toml::value::Table::new();
        table.insert(
            "directory".to_string(),
            toml::Value::String(store.path().display().to_string()),
        );
        table.insert("compression".to_string(), toml::Value::Integer(12));
        let mut backend =
            LocalBackend::from_options("store", toml::Value::Table(table)).unwrap();
        assert!(matches!(
            backend.validate().unwrap_err(),
            Error::InvalidOptions { .. }
        ));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let store = tempfile::tempdir().unwrap();
        let mut table = toml::value::Table::new();
        table.insert(
            "directory".to_string(),
            toml::Value::String(store.path().display().to_string()),
        );
        table.insert("compresion".to_string(), toml::Value::Integer(6));
        let err = LocalBackend::from_options("store", toml::Value::Table(table)).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions { .. }));
    }
}
