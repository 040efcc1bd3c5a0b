//! Conversion between WGS84 and the GCJ-02 / BD-09 offset datums
//!
//! Every conversion goes through WGS84: the source point is first brought to
//! WGS84 and then moved to the target system. The GCJ-02 inverse is the
//! single-pass approximation (offset evaluated at the GCJ-02 point and
//! subtracted), good to a few metres inside China.

use crate::{CoordinateSystem, GeoEditError, Geometry, Point, Result};
use std::f64::consts::PI;

/// Semi-major axis of the Krasovsky ellipsoid used by GCJ-02
const GCJ_SEMI_MAJOR: f64 = 6_378_245.0;

/// Eccentricity squared of the Krasovsky ellipsoid
const GCJ_ECCENTRICITY_SQ: f64 = 0.006_693_421_622_965_943_23;

/// `π * 3000 / 180`, the BD-09 polar distortion factor (52.359877559829883)
const BD_X_PI: f64 = PI * 3000.0 / 180.0;

/// Convert a point between coordinate systems
///
/// Returns the input unchanged when `from == to`.
pub fn convert(point: &Point, from: CoordinateSystem, to: CoordinateSystem) -> Result<Point> {
    if from == to {
        return Ok(*point);
    }
    let wgs84 = to_wgs84(point, from)?;
    from_wgs84(&wgs84, to)
}

/// Bring a point from `from` to WGS84
pub fn to_wgs84(point: &Point, from: CoordinateSystem) -> Result<Point> {
    match from {
        CoordinateSystem::Wgs84 => Ok(*point),
        CoordinateSystem::Gcj02 => Ok(gcj02_to_wgs84(point)),
        CoordinateSystem::Bd09 => Ok(gcj02_to_wgs84(&bd09_to_gcj02(point))),
        CoordinateSystem::WebMercator => Err(GeoEditError::UnsupportedCoordinateSystem(
            from.to_string(),
        )),
    }
}

/// Move a WGS84 point to `to`
pub fn from_wgs84(point: &Point, to: CoordinateSystem) -> Result<Point> {
    match to {
        CoordinateSystem::Wgs84 => Ok(*point),
        CoordinateSystem::Gcj02 => Ok(wgs84_to_gcj02(point)),
        CoordinateSystem::Bd09 => Ok(gcj02_to_bd09(&wgs84_to_gcj02(point))),
        CoordinateSystem::WebMercator => {
            Err(GeoEditError::UnsupportedCoordinateSystem(to.to_string()))
        }
    }
}

/// Convert every vertex of a geometry and retag it
pub fn convert_geometry(geometry: &Geometry, to: CoordinateSystem) -> Result<Geometry> {
    let from = geometry.coordinate_system();
    if from == to {
        return Ok(geometry.clone());
    }
    geometry.map_points(to, |p| convert(p, from, to))
}

pub fn wgs84_to_gcj02(point: &Point) -> Point {
    let (d_lon, d_lat) = gcj02_offset(point.lon(), point.lat());
    point.with_xy(point.lon() + d_lon, point.lat() + d_lat)
}

pub fn gcj02_to_wgs84(point: &Point) -> Point {
    let (d_lon, d_lat) = gcj02_offset(point.lon(), point.lat());
    point.with_xy(point.lon() - d_lon, point.lat() - d_lat)
}

pub fn gcj02_to_bd09(point: &Point) -> Point {
    let (x, y) = (point.lon(), point.lat());
    let z = (x * x + y * y).sqrt() + 0.00002 * (y * BD_X_PI).sin();
    let theta = y.atan2(x) + 0.000003 * (x * BD_X_PI).cos();
    point.with_xy(z * theta.cos() + 0.0065, z * theta.sin() + 0.006)
}

pub fn bd09_to_gcj02(point: &Point) -> Point {
    let x = point.lon() - 0.0065;
    let y = point.lat() - 0.006;
    let z = (x * x + y * y).sqrt() - 0.00002 * (y * BD_X_PI).sin();
    let theta = y.atan2(x) - 0.000003 * (x * BD_X_PI).cos();
    point.with_xy(z * theta.cos(), z * theta.sin())
}

/// Rough bounding box test for mainland China
///
/// Not consulted by [`convert`]: points anywhere on Earth receive the
/// polynomial offset.
pub fn out_of_china(lat: f64, lon: f64) -> bool {
    !(72.004..=137.8347).contains(&lon) || !(0.8293..=55.8271).contains(&lat)
}

/// GCJ-02 offset `(d_lon, d_lat)` in degrees at the given position
fn gcj02_offset(lon: f64, lat: f64) -> (f64, f64) {
    let d_lat = transform_lat(lon - 105.0, lat - 35.0);
    let d_lon = transform_lon(lon - 105.0, lat - 35.0);
    let rad_lat = lat.to_radians();
    let magic = 1.0 - GCJ_ECCENTRICITY_SQ * rad_lat.sin().powi(2);
    let sqrt_magic = magic.sqrt();
    let d_lat = (d_lat * 180.0)
        / ((GCJ_SEMI_MAJOR * (1.0 - GCJ_ECCENTRICITY_SQ)) / (magic * sqrt_magic) * PI);
    let d_lon = (d_lon * 180.0) / (GCJ_SEMI_MAJOR / sqrt_magic * rad_lat.cos() * PI);
    (d_lon, d_lat)
}

fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn transform_lon(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeodeticSolver;

    const SYSTEMS: [CoordinateSystem; 3] = [
        CoordinateSystem::Wgs84,
        CoordinateSystem::Gcj02,
        CoordinateSystem::Bd09,
    ];

    const BEIJING: Point = Point::new(116.397128, 39.916527);

    #[test]
    fn test_identity_conversion() {
        for system in SYSTEMS {
            assert_eq!(convert(&BEIJING, system, system).unwrap(), BEIJING);
        }
    }

    #[test]
    fn test_beijing_offset_magnitude() {
        let gcj = wgs84_to_gcj02(&BEIJING);
        let shift = GeodeticSolver::default().distance(&BEIJING, &gcj);
        assert!(shift > 300.0 && shift < 700.0, "shift was {shift} m");
    }

    #[test]
    fn test_round_trip_through_hub() {
        let points = [
            BEIJING,
            Point::new(121.47, 31.23),
            Point::new(104.06, 30.67),
            Point::new(113.26, 23.13),
        ];
        for p in points {
            for from in SYSTEMS {
                for to in SYSTEMS {
                    let there = convert(&p, from, to).unwrap();
                    let back = convert(&there, to, from).unwrap();
                    assert!((back.x - p.x).abs() < 5e-5, "{from}->{to} at {p:?}");
                    assert!((back.y - p.y).abs() < 5e-5, "{from}->{to} at {p:?}");
                }
            }
        }
    }

    #[test]
    fn test_wgs84_gcj02_round_trip_in_beijing() {
        let back = gcj02_to_wgs84(&wgs84_to_gcj02(&BEIJING));
        assert!((back.x - BEIJING.x).abs() < 1e-6);
        assert!((back.y - BEIJING.y).abs() < 1e-6);
    }

    #[test]
    fn test_bd09_polar_offset_round_trip() {
        let gcj = wgs84_to_gcj02(&BEIJING);
        let back = bd09_to_gcj02(&gcj02_to_bd09(&gcj));
        assert!((back.x - gcj.x).abs() < 1e-6);
        assert!((back.y - gcj.y).abs() < 1e-6);
    }

    #[test]
    fn test_bd09_shifts_further_than_gcj02() {
        let solver = GeodeticSolver::default();
        let gcj = convert(&BEIJING, CoordinateSystem::Wgs84, CoordinateSystem::Gcj02).unwrap();
        let bd = convert(&BEIJING, CoordinateSystem::Wgs84, CoordinateSystem::Bd09).unwrap();
        assert!(solver.distance(&BEIJING, &bd) > solver.distance(&BEIJING, &gcj));
    }

    #[test]
    fn test_points_outside_china_are_still_shifted() {
        let london = Point::new(-0.1278, 51.5074);
        assert!(out_of_china(london.lat(), london.lon()));
        assert!(!out_of_china(BEIJING.lat(), BEIJING.lon()));
        let shifted = wgs84_to_gcj02(&london);
        assert!(shifted != london);
    }

    #[test]
    fn test_web_mercator_is_rejected() {
        let result = convert(&BEIJING, CoordinateSystem::WebMercator, CoordinateSystem::Wgs84);
        assert!(matches!(
            result,
            Err(GeoEditError::UnsupportedCoordinateSystem(_))
        ));
    }

    #[test]
    fn test_convert_geometry_retags_and_keeps_z() {
        let geometry = Geometry::polyline(
            vec![vec![
                Point::new_z(116.39, 39.91, 44.0),
                Point::new(116.40, 39.92),
            ]],
            CoordinateSystem::Wgs84,
        )
        .unwrap();
        let converted = convert_geometry(&geometry, CoordinateSystem::Bd09).unwrap();
        assert_eq!(converted.coordinate_system(), CoordinateSystem::Bd09);
        let parts = converted.parts().unwrap();
        assert_eq!(parts[0][0].z, Some(44.0));
        assert!(parts[0][0].x > 116.39);
    }
}
