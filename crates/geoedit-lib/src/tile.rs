//! Slippy-map tile and pixel coordinates
//!
//! Standard Web Mercator tiling: `2^zoom` tiles per axis, 256 pixels per tile,
//! tile (0, 0) at the north-west corner. Latitudes outside ±85.0511° are not
//! representable; callers validate them before calling in.

use crate::{Envelope, Point};
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Edge length of a tile in pixels
pub const TILE_SIZE: f64 = 256.0;

/// Tile address at a zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileIndex {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileIndex {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Geographic extent of the tile in WGS84 degrees
    pub fn bounds(&self) -> Envelope {
        let top_left = tile_to_point(self);
        let bottom_right = pixel_to_geo_point(self, TILE_SIZE, TILE_SIZE);
        Envelope::new(top_left, bottom_right)
    }
}

#[inline]
fn tiles_per_axis(zoom: u8) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// Fractional tile coordinates of a position
fn fractional_tile(lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
    let n = tiles_per_axis(zoom);
    let lat_rad = lat.to_radians();
    let x = (lon + 180.0) / 360.0 * n;
    let y = (0.5 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / (2.0 * PI)) * n;
    (x, y)
}

/// Latitude of a fractional tile row
#[inline]
fn row_to_lat(y: f64, n: f64) -> f64 {
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}

/// Tile containing a position
pub fn point_to_tile(lat: f64, lon: f64, zoom: u8) -> TileIndex {
    let (x, y) = fractional_tile(lat, lon, zoom);
    let max = tiles_per_axis(zoom) - 1.0;
    TileIndex {
        x: x.floor().clamp(0.0, max) as u32,
        y: y.floor().clamp(0.0, max) as u32,
        zoom,
    }
}

/// North-west corner of a tile
pub fn tile_to_point(tile: &TileIndex) -> Point {
    pixel_to_geo_point(tile, 0.0, 0.0)
}

/// Position of a pixel inside a tile; `(0, 0)` is the north-west corner
pub fn pixel_to_geo_point(tile: &TileIndex, pixel_x: f64, pixel_y: f64) -> Point {
    let n = tiles_per_axis(tile.zoom);
    let x = f64::from(tile.x) + pixel_x / TILE_SIZE;
    let y = f64::from(tile.y) + pixel_y / TILE_SIZE;
    Point::new(x / n * 360.0 - 180.0, row_to_lat(y, n))
}

/// Largest pixel offset inside a tile
const MAX_PIXEL: f64 = TILE_SIZE - TILE_SIZE * f64::EPSILON;

/// Tile and pixel offset within it for a position
///
/// Pixels are clamped to `[0, 256)` together with the tile index, so the
/// antimeridian and out-of-range latitudes land on the edge of the border
/// tile.
pub fn geo_point_to_pixel(lat: f64, lon: f64, zoom: u8) -> (TileIndex, f64, f64) {
    let tile = point_to_tile(lat, lon, zoom);
    let (x, y) = fractional_tile(lat, lon, zoom);
    let pixel_x = ((x - f64::from(tile.x)) * TILE_SIZE).clamp(0.0, MAX_PIXEL);
    let pixel_y = ((y - f64::from(tile.y)) * TILE_SIZE).clamp(0.0, MAX_PIXEL);
    (tile, pixel_x, pixel_y)
}
