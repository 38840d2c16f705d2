//! Path-addressed storage for photograph bytes.
//!
//! Ingested images are named by the SHA-256 of their content, so re-uploads
//! of identical bytes land on the same path. Replacement writes go to a
//! sibling temp file first and move into place with a rename, so a reader
//! never observes a truncated image.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create media root {}", root.display()))?;
        Ok(Self { root })
    }

    /// Absolute path for a stored relative path.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Store new image bytes; returns the relative path. Writing the same
    /// bytes twice is a no-op returning the same path.
    pub fn ingest(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let digest = Sha256::digest(bytes);
        let relative = format!("{:x}.{}", digest, extension.trim_start_matches('.'));
        let target = self.path(&relative);

        if !target.exists() {
            atomic_write(&target, bytes)?;
        }
        Ok(relative)
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.path(relative);
        std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    /// Replace stored bytes in place, atomically.
    pub fn replace(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        atomic_write(&self.path(relative), bytes)
    }

    /// Remove stored bytes. Removing a path that is already gone is fine.
    pub fn remove(&self, relative: &str) -> Result<()> {
        let path = self.path(relative);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}

/// Write via a temp file in the same directory plus rename. The rename is
/// atomic on the same filesystem, which the shared directory guarantees.
fn atomic_write(target: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = target.with_extension("tmp");
    std::fs::write(&tmp, bytes)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, target)
        .with_context(|| format!("failed to move {} into place", tmp.display()))?;
    Ok(())
}
