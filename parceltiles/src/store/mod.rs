//! Filesystem-backed tile archive.
//!
//! The on-disk layout is a pure function of the tile address:
//! `{root}/{zoom}/{x}/{y}.pbf`. There is no index and no metadata side
//! table; a rebuild simply overwrites existing paths. A build killed
//! partway leaves a valid mix of old and new tiles, which readers must
//! treat as acceptable degraded state, not corruption.

mod disk;
mod path;

pub use disk::TileStore;
pub use path::{tile_path, TILE_EXTENSION};

use thiserror::Error;

/// Errors that can occur in the tile store.
///
/// A missing tile is never an error; reads return `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure (disk full, permission denied, ...)
    #[error("tile store I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The atomic rename of a finished tile failed
    #[error("failed to persist tile file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
