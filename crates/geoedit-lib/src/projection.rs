//! Planar projection of geographic geometries
//!
//! Algorithms that need planar coordinates (topology-preserving
//! generalization) go through the [`Projection`] trait so that callers can
//! plug in the projection engine of their GIS stack. [`WebMercator`] is the
//! built-in implementation.

use crate::{CoordinateSystem, GeoEditError, Geometry, Point, Result};

/// Web Mercator bounds in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;
pub const EARTH_MERCATOR_MIN: f64 = -20037508.34;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Precomputed constant: EARTH_MERCATOR_MAX / 180.0
const LON_TO_X_FACTOR: f64 = EARTH_MERCATOR_MAX / 180.0;

/// Precomputed constant: EARTH_MERCATOR_MAX / PI
const Y_FACTOR: f64 = EARTH_MERCATOR_MAX / std::f64::consts::PI;

/// Precomputed constant: 180.0 / EARTH_MERCATOR_MAX
const X_TO_LON_FACTOR: f64 = 180.0 / EARTH_MERCATOR_MAX;

/// Precomputed constant: PI / EARTH_MERCATOR_MAX
const Y_TO_LAT_FACTOR: f64 = std::f64::consts::PI / EARTH_MERCATOR_MAX;

/// Forward and inverse mapping between geographic degrees and a plane
pub trait Projection: Send + Sync {
    /// Coordinate system of projected points
    fn target(&self) -> CoordinateSystem;

    /// Geographic point to planar point, `None` when not representable
    fn project(&self, point: &Point) -> Option<Point>;

    /// Planar point back to geographic degrees
    fn unproject(&self, point: &Point) -> Option<Point>;
}

/// Spherical Web Mercator (EPSG:3857)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebMercator;

impl Projection for WebMercator {
    fn target(&self) -> CoordinateSystem {
        CoordinateSystem::WebMercator
    }

    fn project(&self, point: &Point) -> Option<Point> {
        let projected = wgs84_to_mercator(point.lat(), point.lon());
        is_valid_mercator(&projected).then(|| point.with_xy(projected.x, projected.y))
    }

    fn unproject(&self, point: &Point) -> Option<Point> {
        let (lat, lon) = mercator_to_wgs84(point.x, point.y);
        (lat.is_finite() && lon.is_finite()).then(|| point.with_xy(lon, lat))
    }
}

/// Convert WGS84 (lat, lon) to Web Mercator (x, y) in meters
///
/// Latitude is clamped to the Web Mercator range.
#[inline(always)]
pub fn wgs84_to_mercator(lat: f64, lon: f64) -> Point {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);

    let x = lon * LON_TO_X_FACTOR;

    let lat_rad = lat.to_radians();
    let y = (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * Y_FACTOR;

    Point::new(x, y)
}

/// Convert Web Mercator (x, y) in meters to WGS84, returning (latitude, longitude)
#[inline(always)]
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x * X_TO_LON_FACTOR;
    let lat =
        (std::f64::consts::PI / 2.0 - 2.0 * ((-y * Y_TO_LAT_FACTOR).exp()).atan()).to_degrees();
    (lat, lon)
}

/// Check if a point is within Web Mercator bounds
#[inline(always)]
pub fn is_valid_mercator(point: &Point) -> bool {
    point.x.is_finite()
        && point.y.is_finite()
        && point.x >= EARTH_MERCATOR_MIN
        && point.x <= EARTH_MERCATOR_MAX
        && point.y >= EARTH_MERCATOR_MIN
        && point.y <= EARTH_MERCATOR_MAX
}

/// Project a geographic geometry onto the projection's plane
pub fn project_geometry(geometry: &Geometry, projection: &dyn Projection) -> Result<Geometry> {
    if !geometry.coordinate_system().is_geographic() {
        return Err(GeoEditError::UnsupportedCoordinateSystem(
            geometry.coordinate_system().to_string(),
        ));
    }
    geometry.map_points(projection.target(), |p| {
        projection
            .project(p)
            .ok_or_else(|| GeoEditError::Projection(format!("cannot project ({}, {})", p.x, p.y)))
    })
}

/// Bring a projected geometry back to geographic degrees tagged `target`
pub fn unproject_geometry(
    geometry: &Geometry,
    projection: &dyn Projection,
    target: CoordinateSystem,
) -> Result<Geometry> {
    if geometry.coordinate_system() != projection.target() {
        return Err(GeoEditError::UnsupportedCoordinateSystem(
            geometry.coordinate_system().to_string(),
        ));
    }
    geometry.map_points(target, |p| {
        projection
            .unproject(p)
            .ok_or_else(|| GeoEditError::Projection(format!("cannot unproject ({}, {})", p.x, p.y)))
    })
}
