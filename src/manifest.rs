// src/manifest.rs

//! package.json and lockfile parsing
//!
//! The manifest is reduced to the two dependency maps the fingerprint and
//! the delta installer care about; everything else in package.json is
//! ignored. Lockfiles stay opaque: they are parsed only so that their
//! canonical form can be folded into the fingerprint.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

/// Well-known manifest name at the project root
pub const MANIFEST_FILE: &str = "package.json";

/// Lockfile names, in precedence order (shrinkwrap shadows package-lock,
/// matching npm itself)
pub const LOCKFILE_NAMES: &[&str] = &["npm-shrinkwrap.json", "package-lock.json"];

/// The dependency-declaring subset of a package.json
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    /// `dependencies` section, name -> version specifier
    pub dependencies: BTreeMap<String, String>,
    /// `devDependencies` section, name -> version specifier
    pub dev_dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse a manifest from package.json text.
    ///
    /// A manifest that declares neither `dependencies` nor `devDependencies`
    /// is rejected: there is nothing to cache for it.
    pub fn parse(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text)
            .map_err(|e| Error::ManifestInvalid(format!("not valid JSON: {e}")))?;

        let obj = doc
            .as_object()
            .ok_or_else(|| Error::ManifestInvalid("top level is not an object".to_string()))?;

        if !obj.contains_key("dependencies") && !obj.contains_key("devDependencies") {
            return Err(Error::ManifestInvalid(
                "neither dependencies nor devDependencies is declared".to_string(),
            ));
        }

        Ok(Manifest {
            dependencies: dependency_section(obj.get("dependencies"), "dependencies")?,
            dev_dependencies: dependency_section(obj.get("devDependencies"), "devDependencies")?,
        })
    }

    /// Load the manifest from a project root.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::ManifestNotFound(path.clone())
            } else {
                Error::Io(e)
            }
        })?;
        Self::parse(&text)
    }

    /// Union of both sections, runtime dependencies winning on a key
    /// conflict (npm's own convention).
    pub fn merged(&self) -> BTreeMap<String, String> {
        let mut all = self.dev_dependencies.clone();
        for (name, spec) in &self.dependencies {
            all.insert(name.clone(), spec.clone());
        }
        all
    }
}

fn dependency_section(
    section: Option<&Value>,
    name: &str,
) -> Result<BTreeMap<String, String>> {
    let mut deps = BTreeMap::new();
    let Some(value) = section else {
        return Ok(deps);
    };
    let obj = value
        .as_object()
        .ok_or_else(|| Error::ManifestInvalid(format!("{name} is not an object")))?;
    for (pkg, spec) in obj {
        let spec = spec.as_str().ok_or_else(|| {
            Error::ManifestInvalid(format!("{name}.{pkg} is not a string specifier"))
        })?;
        deps.insert(pkg.clone(), spec.to_string());
    }
    Ok(deps)
}

/// A parsed lockfile, kept as an opaque JSON document
#[derive(Debug, Clone, PartialEq)]
pub struct Lockfile {
    pub document: Value,
}

impl Lockfile {
    pub fn parse(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| Error::ManifestInvalid(format!("lockfile is not valid JSON: {e}")))?;
        Ok(Lockfile { document })
    }

    /// Auto-detect and load a lockfile next to the manifest.
    ///
    /// Absence is a first-class state, not an error.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        for name in LOCKFILE_NAMES {
            let path = root.join(name);
            match std::fs::read_to_string(&path) {
                Ok(text) => return Self::parse(&text).map(Some),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(None)
    }
}
