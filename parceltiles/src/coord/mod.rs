//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (longitude/latitude)
//! and Web Mercator slippy-map tile coordinates, plus the covering-range
//! computation the pyramid builder enumerates.
//!
//! All functions here are pure: no I/O, fully deterministic.

mod types;

pub use types::{
    BoundingBox, CoordError, TileCoord, TileRange, TileRangeIter, MAX_LAT, MAX_LON, MAX_ZOOM,
    MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Converts a longitude to its tile X coordinate at the given zoom.
///
/// # Errors
///
/// Returns an error if the longitude is outside [-180, 180] or the zoom
/// level is unsupported. Inputs are rejected before the projection math so
/// callers never observe NaN behaviour.
#[inline]
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> Result<u32, CoordError> {
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(i32::from(zoom));
    let x = ((lon + 180.0) / 360.0 * n).floor();

    // lon = 180.0 lands exactly on the east edge of the grid; clamp it
    // into the last column so the result stays within [0, 2^zoom).
    Ok((x as u32).min((n as u32) - 1))
}

/// Converts a latitude to its tile Y coordinate at the given zoom.
///
/// Uses the standard Web Mercator tile-Y formula. Tile Y increases
/// southward: 0 is the northern edge of the grid.
///
/// # Errors
///
/// Returns an error if the latitude is outside the Web Mercator domain
/// (±85.05112878) or the zoom level is unsupported.
#[inline]
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> Result<u32, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(i32::from(zoom));
    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

    // The southern domain edge lands exactly on 2^zoom; clamp into grid.
    Ok((y as u32).min((n as u32) - 1))
}

/// Converts a geographic point to its owning tile address.
///
/// # Errors
///
/// Returns an error if either coordinate is outside its valid range or the
/// zoom level is unsupported.
#[inline]
pub fn to_tile_coord(lon: f64, lat: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    let x = lon_to_tile_x(lon, zoom)?;
    let y = lat_to_tile_y(lat, zoom)?;
    Ok(TileCoord { zoom, x, y })
}

/// Computes the tile range covering a bounding box at the given zoom.
///
/// Tile Y increases southward, so `min_y` derives from the northern edge
/// (`max_lat`) and `max_y` from the southern edge (`min_lat`).
///
/// # Errors
///
/// Returns an error if the zoom level is unsupported. The bounding box is
/// already validated at construction.
pub fn cover_tile_range(bbox: &BoundingBox, zoom: u8) -> Result<TileRange, CoordError> {
    let min_x = lon_to_tile_x(bbox.min_lon, zoom)?;
    let max_x = lon_to_tile_x(bbox.max_lon, zoom)?;
    let min_y = lat_to_tile_y(bbox.max_lat, zoom)?;
    let max_y = lat_to_tile_y(bbox.min_lat, zoom)?;

    Ok(TileRange {
        zoom,
        min_x,
        max_x,
        min_y,
        max_y,
    })
}

/// Lazily enumerates every tile covering a bounding box across a zoom span.
///
/// Zoom levels are yielded low-to-high (coarse tiles first), which is the
/// natural operational order for smoke-testing a long build. The sequence
/// is finite and restartable: a fresh iterator enumerates the same tiles
/// in the same order.
///
/// # Errors
///
/// Returns an error if the zoom span is inverted or outside the supported
/// range.
pub fn pyramid_coverage(
    bbox: &BoundingBox,
    min_zoom: u8,
    max_zoom: u8,
) -> Result<PyramidIter, CoordError> {
    if min_zoom > max_zoom || max_zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(max_zoom));
    }

    let ranges = (min_zoom..=max_zoom)
        .map(|zoom| cover_tile_range(bbox, zoom))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PyramidIter {
        total: ranges.iter().map(TileRange::count).sum(),
        ranges: ranges.into_iter().rev().collect(),
        current: None,
    })
}

/// Iterator over all tiles of a zoom pyramid, coarse zoom levels first.
///
/// Produced by [`pyramid_coverage`]. Ranges are precomputed (one per zoom
/// level); tile enumeration within them is lazy.
#[derive(Debug, Clone)]
pub struct PyramidIter {
    /// Pending ranges, highest zoom at the front so `pop` yields low first
    ranges: Vec<TileRange>,
    current: Option<TileRangeIter>,
    total: u64,
}

impl PyramidIter {
    /// Total number of tiles this iterator will yield.
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Iterator for PyramidIter {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(iter) = &mut self.current {
                if let Some(tile) = iter.next() {
                    return Some(tile);
                }
            }
            self.current = Some(self.ranges.pop()?.iter());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let tile = to_tile_coord(-74.0060, 40.7128, 16).unwrap();
        assert_eq!(tile.x, 19295);
        assert_eq!(tile.y, 24640);
        assert_eq!(tile.zoom, 16);
    }

    #[test]
    fn test_lon_to_tile_x_rejects_out_of_range() {
        let result = lon_to_tile_x(-180.5, 10);
        assert!(matches!(
            result.unwrap_err(),
            CoordError::InvalidLongitude(_)
        ));
    }

    #[test]
    fn test_lat_to_tile_y_rejects_pole() {
        // The poles are outside the Mercator domain
        let result = lat_to_tile_y(90.0, 10);
        assert!(matches!(result.unwrap_err(), CoordError::InvalidLatitude(_)));
    }

    #[test]
    fn test_rejects_unsupported_zoom() {
        let result = lon_to_tile_x(0.0, MAX_ZOOM + 1);
        assert!(matches!(result.unwrap_err(), CoordError::InvalidZoom(_)));
    }

    #[test]
    fn test_lon_to_tile_x_is_monotonic() {
        let zoom = 12;
        let mut previous = lon_to_tile_x(MIN_LON, zoom).unwrap();
        let mut lon = MIN_LON;
        while lon <= MAX_LON {
            let x = lon_to_tile_x(lon, zoom).unwrap();
            assert!(x >= previous, "x regressed at lon {}", lon);
            previous = x;
            lon += 0.37;
        }
    }

    #[test]
    fn test_tile_x_within_grid_at_edges() {
        for zoom in [0, 1, 5, 14, MAX_ZOOM] {
            let n = 2u32.pow(u32::from(zoom));
            assert_eq!(lon_to_tile_x(MIN_LON, zoom).unwrap(), 0);
            assert_eq!(lon_to_tile_x(MAX_LON, zoom).unwrap(), n - 1);
        }
    }

    #[test]
    fn test_tile_y_within_grid_at_edges() {
        for zoom in [0, 1, 5, 14, MAX_ZOOM] {
            let n = 2u32.pow(u32::from(zoom));
            assert_eq!(lat_to_tile_y(MAX_LAT, zoom).unwrap(), 0);
            assert_eq!(lat_to_tile_y(MIN_LAT, zoom).unwrap(), n - 1);
        }
    }

    #[test]
    fn test_whole_world_cover_is_full_grid() {
        let world = BoundingBox::new(-180.0, -85.05, 180.0, 85.05).unwrap();
        for zoom in [0u8, 1, 3, 7, 12] {
            let range = cover_tile_range(&world, zoom).unwrap();
            let edge = 2u32.pow(u32::from(zoom)) - 1;
            assert_eq!(range.min_x, 0);
            assert_eq!(range.min_y, 0);
            assert_eq!(range.max_x, edge);
            assert_eq!(range.max_y, edge);
        }
    }

    #[test]
    fn test_cover_range_y_orientation() {
        // Tile Y grows southward: the range's min_y must come from the
        // northern edge of the box.
        let bbox = BoundingBox::new(-75.2, 39.9, -75.1, 40.0).unwrap();
        let range = cover_tile_range(&bbox, 14).unwrap();

        assert_eq!(range.min_y, lat_to_tile_y(40.0, 14).unwrap());
        assert_eq!(range.max_y, lat_to_tile_y(39.9, 14).unwrap());
        assert!(range.min_y <= range.max_y);
        assert!(range.min_x <= range.max_x);
    }

    #[test]
    fn test_pyramid_coverage_single_zoom() {
        let bbox = BoundingBox::new(-75.2, 39.9, -75.1, 40.0).unwrap();
        let pyramid = pyramid_coverage(&bbox, 14, 14).unwrap();
        let range = cover_tile_range(&bbox, 14).unwrap();

        let tiles: Vec<TileCoord> = pyramid.collect();
        assert_eq!(tiles.len() as u64, range.count());
        assert!(tiles.iter().all(|t| t.zoom == 14));
    }

    #[test]
    fn test_pyramid_coverage_coarse_first() {
        let bbox = BoundingBox::new(-75.2, 39.9, -75.1, 40.0).unwrap();
        let zooms: Vec<u8> = pyramid_coverage(&bbox, 10, 12)
            .unwrap()
            .map(|t| t.zoom)
            .collect();

        let mut sorted = zooms.clone();
        sorted.sort_unstable();
        assert_eq!(zooms, sorted, "zoom levels must be yielded low-to-high");
        assert_eq!(zooms.first(), Some(&10));
        assert_eq!(zooms.last(), Some(&12));
    }

    #[test]
    fn test_pyramid_coverage_total_matches_ranges() {
        let bbox = BoundingBox::new(-75.2, 39.9, -75.1, 40.0).unwrap();
        let pyramid = pyramid_coverage(&bbox, 12, 14).unwrap();

        let expected: u64 = (12u8..=14)
            .map(|z| cover_tile_range(&bbox, z).unwrap().count())
            .sum();
        assert_eq!(pyramid.total(), expected);
        assert_eq!(pyramid.count() as u64, expected);
    }

    #[test]
    fn test_pyramid_coverage_is_restartable() {
        let bbox = BoundingBox::new(-0.2, 51.4, 0.0, 51.6).unwrap();
        let first: Vec<TileCoord> = pyramid_coverage(&bbox, 11, 13).unwrap().collect();
        let second: Vec<TileCoord> = pyramid_coverage(&bbox, 11, 13).unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_pyramid_coverage_rejects_inverted_span() {
        let bbox = BoundingBox::new(-75.2, 39.9, -75.1, 40.0).unwrap();
        assert!(pyramid_coverage(&bbox, 14, 10).is_err());
    }
}
