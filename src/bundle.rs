// src/bundle.rs

//! Bundle serialization
//!
//! A bundle is a gzip-compressed tarball holding one `node_modules` tree.
//! The local and git backends share this format; what a backend does with
//! the bytes afterwards is its own business.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::Path;
use tar::{Archive, Builder};

/// Directory name every bundle unpacks to
pub const TREE_DIR: &str = "node_modules";

/// Default gzip level; 6 is the zlib default trade-off
pub const DEFAULT_COMPRESSION: u32 = 6;

/// Pack `node_modules` into a gzip tarball at `dest`.
pub fn pack(node_modules: &Path, dest: &Path, compression: u32) -> Result<()> {
    if !node_modules.is_dir() {
        return Err(Error::Internal(format!(
            "cannot pack missing tree {}",
            node_modules.display()
        )));
    }
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::new(compression));
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(TREE_DIR, node_modules)?;
    builder.into_inner()?.finish()?;
    Ok(())
}

/// Unpack a bundle into `dest_dir`, producing `dest_dir/node_modules`.
pub fn unpack(archive: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.unpack(dest_dir)?;

    if !dest_dir.join(TREE_DIR).is_dir() {
        return Err(Error::Internal(format!(
            "bundle {} did not contain a {TREE_DIR} tree",
            archive.display()
        )));
    }
    Ok(())
}
