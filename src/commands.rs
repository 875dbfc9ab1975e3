// src/commands.rs
//! Command handlers for the stockpile CLI

use anyhow::Result;
use std::path::{Path, PathBuf};
use stockpile::{fingerprint, Config, InstallOptions, Installer, Lockfile, Manifest};
use tracing::debug;

/// Resolve the configuration: an explicit --config path wins, otherwise
/// stockpile.toml at the project root.
fn load_config(root: &Path, config_path: Option<&PathBuf>) -> Result<Config> {
    let config = match config_path {
        Some(path) => Config::load_file(path)?,
        None => Config::load(root)?,
    };
    debug!("{} backend(s) configured", config.chain.len());
    Ok(config)
}

/// `stockpile install`
pub fn cmd_install(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let config = load_config(&root, config_path)?;

    let installer = Installer::new(&config, &root);
    installer.install(InstallOptions { force })?;

    println!("node_modules is ready");
    Ok(())
}

/// `stockpile calc` — print the fingerprint the install would use
pub fn cmd_calc(config_path: Option<&PathBuf>) -> Result<()> {
    let root = std::env::current_dir()?;
    let config = load_config(&root, config_path)?;

    let manifest = Manifest::load(&root)?;
    let lockfile = Lockfile::load(&root)?;
    println!("{}", fingerprint(&manifest, lockfile.as_ref(), &config.salt));
    Ok(())
}
