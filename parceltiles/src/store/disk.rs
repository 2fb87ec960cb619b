//! Disk-backed tile archive with atomic writes.

use super::path::tile_path;
use super::StoreError;
use crate::coord::TileCoord;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Filesystem tile archive rooted at an output directory.
///
/// Reads are plain file lookups; writes go to a temporary file in the
/// destination directory and are renamed into place, so a concurrent
/// reader never observes a partial tile.
#[derive(Debug, Clone)]
pub struct TileStore {
    root: PathBuf,
}

impl TileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The archive root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a tile payload.
    ///
    /// Returns `Ok(None)` when the tile has not been built; absence is a
    /// normal condition, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures other than a missing file.
    pub fn read(&self, tile: &TileCoord) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(tile_path(&self.root, tile)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a tile payload, overwriting any previous build of the tile.
    ///
    /// Intermediate directories are created as needed. The payload is
    /// written to a temp file in the same directory and renamed into
    /// place.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the write
    /// or rename fails.
    pub fn write(&self, tile: &TileCoord, payload: &[u8]) -> Result<(), StoreError> {
        let path = tile_path(&self.root, tile);
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(payload)?;
        tmp.persist(&path)?;

        Ok(())
    }

    /// Check whether a tile has been built.
    pub fn contains(&self, tile: &TileCoord) -> bool {
        tile_path(&self.root, tile).is_file()
    }
}
