//! Tile archive path construction.

use crate::coord::TileCoord;
use std::path::{Path, PathBuf};

/// File extension for stored vector tiles.
pub const TILE_EXTENSION: &str = "pbf";

/// Construct the archive path for a tile.
///
/// Creates a hierarchical path structure:
/// ```text
/// <root>/<zoom>/<x>/<y>.pbf
/// ```
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use parceltiles::coord::TileCoord;
/// use parceltiles::store::tile_path;
///
/// let tile = TileCoord { zoom: 14, x: 4769, y: 6201 };
/// let path = tile_path(&PathBuf::from("/tiles"), &tile);
///
/// assert_eq!(path, PathBuf::from("/tiles/14/4769/6201.pbf"));
/// ```
pub fn tile_path(root: &Path, tile: &TileCoord) -> PathBuf {
    root.join(tile.zoom.to_string())
        .join(tile.x.to_string())
        .join(format!("{}.{}", tile.y, TILE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_path_layout() {
        let root = PathBuf::from("/var/tiles");
        let tile = TileCoord {
            zoom: 14,
            x: 4769,
            y: 6201,
        };

        assert_eq!(
            tile_path(&root, &tile),
            PathBuf::from("/var/tiles/14/4769/6201.pbf")
        );
    }

    #[test]
    fn test_tile_path_zero_coordinates() {
        let root = PathBuf::from("/tiles");
        let tile = TileCoord { zoom: 0, x: 0, y: 0 };

        assert_eq!(tile_path(&root, &tile), PathBuf::from("/tiles/0/0/0.pbf"));
    }

    #[test]
    fn test_tile_path_is_deterministic() {
        let root = PathBuf::from("/tiles");
        let tile = TileCoord {
            zoom: 16,
            x: 19295,
            y: 24640,
        };

        assert_eq!(tile_path(&root, &tile), tile_path(&root, &tile));
    }

    #[test]
    fn test_distinct_tiles_get_distinct_paths() {
        let root = PathBuf::from("/tiles");
        let a = TileCoord {
            zoom: 14,
            x: 100,
            y: 200,
        };
        let b = TileCoord {
            zoom: 14,
            x: 200,
            y: 100,
        };

        assert_ne!(tile_path(&root, &a), tile_path(&root, &b));
    }
}
