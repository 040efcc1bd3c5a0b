//! Ellipsoidal distances and bearings using Vincenty's formulae
//!
//! The solver works on an explicit [`Ellipsoid`] value rather than global
//! constants, so several ellipsoids can be used side by side.
//!
//! All angles are in degrees. Azimuths are measured clockwise from north and
//! normalized to `[0, 360)`.

use crate::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of iterations of the inverse solution
const INVERSE_MAX_ITERATIONS: usize = 20;

/// Guard against runaway iteration in the direct solution
const DIRECT_MAX_ITERATIONS: usize = 200;

/// Relative (inverse) and absolute (direct) convergence tolerance
const CONVERGENCE_TOLERANCE: f64 = 1e-13;

/// Reference ellipsoid
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ellipsoid {
    /// Semi-major axis in metres
    pub semi_major: f64,
    /// Semi-minor axis in metres
    pub semi_minor: f64,
    pub flattening: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        semi_major: 6_378_137.0,
        semi_minor: 6_356_752.3142,
        flattening: 1.0 / 298.257_223_6,
    };

    /// Ellipsoid from semi-major axis and inverse flattening
    pub fn from_inverse_flattening(semi_major: f64, inverse_flattening: f64) -> Self {
        let flattening = 1.0 / inverse_flattening;
        Self {
            semi_major,
            semi_minor: semi_major * (1.0 - flattening),
            flattening,
        }
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}

/// Result of the inverse problem
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inverse {
    /// Ellipsoidal distance in metres
    pub distance: f64,
    /// Forward azimuth at the start point
    pub azimuth1: f64,
    /// Forward azimuth at the end point
    pub azimuth2: f64,
    /// `false` when the iteration did not converge (near-antipodal points);
    /// azimuths are then sentinel pole headings and the distance is the
    /// series approximation from the last iterate
    pub converged: bool,
}

/// Result of the direct problem
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direct {
    pub destination: Point,
    /// Forward azimuth at the destination
    pub final_azimuth: f64,
}

/// Vincenty direct and inverse solver
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeodeticSolver {
    ellipsoid: Ellipsoid,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GeodeticSolver {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self { ellipsoid }
    }

    #[inline]
    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// Distance and azimuths between two points (x = lon, y = lat)
    pub fn inverse(&self, start: &Point, end: &Point) -> Inverse {
        let Ellipsoid {
            semi_major: a,
            semi_minor: b,
            flattening: f,
        } = self.ellipsoid;

        let l = (end.lon() - start.lon()).to_radians();
        let u1 = ((1.0 - f) * start.lat().to_radians().tan()).atan();
        let u2 = ((1.0 - f) * end.lat().to_radians().tan()).atan();
        let (sin_u1, cos_u1) = u1.sin_cos();
        let (sin_u2, cos_u2) = u2.sin_cos();

        let mut lambda = l;
        let mut sin_lambda = 0.0;
        let mut cos_lambda = 1.0;
        let mut sin_sigma = 0.0;
        let mut cos_sigma = 1.0;
        let mut sigma = 0.0;
        let mut cos_sq_alpha = 1.0;
        let mut cos_2sigma_m = 0.0;
        let mut converged = false;

        for _ in 0..INVERSE_MAX_ITERATIONS {
            (sin_lambda, cos_lambda) = lambda.sin_cos();
            let t1 = cos_u2 * sin_lambda;
            let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
            sin_sigma = (t1 * t1 + t2 * t2).sqrt();
            if sin_sigma == 0.0 {
                // Coincident points
                return Inverse {
                    distance: 0.0,
                    azimuth1: 0.0,
                    azimuth2: 0.0,
                    converged: true,
                };
            }
            cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
            sigma = sin_sigma.atan2(cos_sigma);
            let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
            cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
            cos_2sigma_m = if cos_sq_alpha != 0.0 {
                cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
            } else {
                // Equatorial line
                0.0
            };
            let c = coefficient_c(f, cos_sq_alpha);
            let previous = lambda;
            lambda = l
                + (1.0 - c)
                    * f
                    * sin_alpha
                    * (sigma
                        + c * sin_sigma
                            * (cos_2sigma_m
                                + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));
            if (lambda - previous).abs() <= CONVERGENCE_TOLERANCE * lambda.abs() {
                converged = true;
                break;
            }
        }

        let (coef_a, coef_b) = coefficients_ab(a, b, cos_sq_alpha);
        let d_sigma = delta_sigma(coef_b, sin_sigma, cos_sigma, cos_2sigma_m);
        let distance = b * coef_a * (sigma - d_sigma);

        if !converged {
            // Heading towards the south pole when starting north of the end
            // point, towards the north pole otherwise
            let heading = if start.lat() > end.lat() { 180.0 } else { 0.0 };
            tracing::debug!(
                "Vincenty inverse did not converge between ({}, {}) and ({}, {}), using pole heading {}",
                start.lat(),
                start.lon(),
                end.lat(),
                end.lon(),
                heading
            );
            return Inverse {
                distance,
                azimuth1: heading,
                azimuth2: heading,
                converged: false,
            };
        }

        let azimuth1 = (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);
        let azimuth2 =
            (cos_u1 * sin_lambda).atan2(-sin_u1 * cos_u2 + cos_u1 * sin_u2 * cos_lambda);

        Inverse {
            distance,
            azimuth1: normalize_azimuth(azimuth1.to_degrees()),
            azimuth2: normalize_azimuth(azimuth2.to_degrees()),
            converged: true,
        }
    }

    /// Destination reached from `start` after `distance` metres along the
    /// geodesic with initial `bearing`
    pub fn direct(&self, start: &Point, bearing: f64, distance: f64) -> Direct {
        let Ellipsoid {
            semi_major: a,
            semi_minor: b,
            flattening: f,
        } = self.ellipsoid;

        let (sin_alpha1, cos_alpha1) = bearing.to_radians().sin_cos();
        let tan_u1 = (1.0 - f) * start.lat().to_radians().tan();
        let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
        let sin_u1 = tan_u1 * cos_u1;

        let sigma1 = tan_u1.atan2(cos_alpha1);
        let sin_alpha = cos_u1 * sin_alpha1;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        let (coef_a, coef_b) = coefficients_ab(a, b, cos_sq_alpha);

        let base = distance / (b * coef_a);
        let mut sigma = base;
        let mut sin_sigma;
        let mut cos_sigma;
        let mut cos_2sigma_m;
        let mut iterations = 0;
        loop {
            cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
            (sin_sigma, cos_sigma) = sigma.sin_cos();
            let previous = sigma;
            sigma = base + delta_sigma(coef_b, sin_sigma, cos_sigma, cos_2sigma_m);
            iterations += 1;
            let settled = (sigma - previous).abs() < CONVERGENCE_TOLERANCE;
            if settled || iterations >= DIRECT_MAX_ITERATIONS {
                break;
            }
        }
        // Terms for the final sigma
        cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        (sin_sigma, cos_sigma) = sigma.sin_cos();

        let tmp = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
        let lat2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
            .atan2((1.0 - f) * (sin_alpha * sin_alpha + tmp * tmp).sqrt());
        let lambda =
            (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
        let c = coefficient_c(f, cos_sq_alpha);
        let l = lambda
            - (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m
                            + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));
        let lon2 = normalize_longitude(start.lon() + l.to_degrees());
        let final_azimuth = normalize_azimuth(sin_alpha.atan2(-tmp).to_degrees());

        Direct {
            destination: start.with_xy(lon2, lat2.to_degrees()),
            final_azimuth,
        }
    }

    /// Ellipsoidal distance in metres
    #[inline]
    pub fn distance(&self, start: &Point, end: &Point) -> f64 {
        self.inverse(start, end).distance
    }

    /// Total ellipsoidal length of a vertex sequence
    pub fn length(&self, points: &[Point]) -> f64 {
        points
            .windows(2)
            .map(|pair| self.distance(&pair[0], &pair[1]))
            .sum()
    }

    /// Point of segment `a`-`b` closest to `p`
    ///
    /// The search runs in a local equirectangular frame centred on the
    /// segment, which is accurate for the segment lengths found in edited
    /// features.
    pub fn nearest_point_on_segment(&self, p: &Point, a: &Point, b: &Point) -> Point {
        let scale = ((a.lat() + b.lat()) * 0.5).to_radians().cos();
        let dx = (b.x - a.x) * scale;
        let dy = b.y - a.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return *a;
        }
        let t = (((p.x - a.x) * scale * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
        Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y))
    }

    /// Geodetic distance in metres from `p` to segment `a`-`b`
    pub fn distance_to_segment(&self, p: &Point, a: &Point, b: &Point) -> f64 {
        let nearest = self.nearest_point_on_segment(p, a, b);
        self.distance(p, &nearest)
    }
}

/// Vincenty's `A` and `B` series coefficients
fn coefficients_ab(a: f64, b: f64, cos_sq_alpha: f64) -> (f64, f64) {
    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let coef_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let coef_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    (coef_a, coef_b)
}

#[inline]
fn coefficient_c(f: f64, cos_sq_alpha: f64) -> f64 {
    f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha))
}

fn delta_sigma(coef_b: f64, sin_sigma: f64, cos_sigma: f64, cos_2sigma_m: f64) -> f64 {
    let c2 = cos_2sigma_m * cos_2sigma_m;
    coef_b
        * sin_sigma
        * (cos_2sigma_m
            + coef_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * c2)
                    - coef_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * c2)))
}

#[inline]
fn normalize_azimuth(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

#[inline]
fn normalize_longitude(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver() -> GeodeticSolver {
        GeodeticSolver::default()
    }

    fn angle_diff(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test]
    fn test_known_distance_flinders_peak_buninyong() {
        // Classic Vincenty test pair (on WGS84 instead of the original ANS)
        let flinders = Point::new(144.424_867_888_9, -37.951_033_416_7);
        let buninyong = Point::new(143.926_495_527_8, -37.652_821_138_9);
        let inverse = solver().inverse(&flinders, &buninyong);
        assert!(inverse.converged);
        assert!((inverse.distance - 54_972.27).abs() < 1.0);
        assert!((inverse.azimuth1 - 306.868).abs() < 0.01);
    }

    #[test]
    fn test_one_degree_of_longitude_on_equator() {
        let inverse = solver().inverse(&Point::new(0.0, 0.0), &Point::new(1.0, 0.0));
        assert!((inverse.distance - 111_319.49).abs() < 0.1);
        assert!((inverse.azimuth1 - 90.0).abs() < 1e-9);
        assert!((inverse.azimuth2 - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_coincident_points() {
        let p = Point::new(116.4, 39.9);
        let inverse = solver().inverse(&p, &p);
        assert_eq!(inverse.distance, 0.0);
        assert!(inverse.converged);
    }

    #[test]
    fn test_inverse_symmetry() {
        let pairs = [
            (Point::new(116.397, 39.916), Point::new(121.473, 31.230)),
            (Point::new(-0.1278, 51.5074), Point::new(2.3522, 48.8566)),
            (Point::new(-122.42, 37.77), Point::new(139.69, 35.69)),
            (Point::new(10.0, -45.0), Point::new(-70.0, 10.0)),
        ];
        for (p, q) in pairs {
            let forward = solver().inverse(&p, &q);
            let backward = solver().inverse(&q, &p);
            assert!((forward.distance - backward.distance).abs() < 1e-4);
            assert!(angle_diff(forward.azimuth1, backward.azimuth2 - 180.0) < 1e-6);
            assert!(angle_diff(forward.azimuth2, backward.azimuth1 - 180.0) < 1e-6);
        }
    }

    #[test]
    fn test_direct_inverts_inverse() {
        let pairs = [
            (Point::new(116.397, 39.916), Point::new(121.473, 31.230)),
            (Point::new(-122.42, 37.77), Point::new(139.69, 35.69)),
            (Point::new(179.5, 10.0), Point::new(-179.5, 12.0)),
            (Point::new(20.0, 80.0), Point::new(-100.0, 84.0)),
        ];
        let solver = solver();
        for (p, q) in pairs {
            let inverse = solver.inverse(&p, &q);
            let direct = solver.direct(&p, inverse.azimuth1, inverse.distance);
            assert!(solver.distance(&direct.destination, &q) < 0.5);
            assert!(angle_diff(direct.final_azimuth, inverse.azimuth2) < 1e-6);
        }
    }

    #[test]
    fn test_direct_keeps_z() {
        let start = Point::new_z(0.0, 0.0, 25.0);
        let direct = solver().direct(&start, 0.0, 1000.0);
        assert_eq!(direct.destination.z, Some(25.0));
        assert!(direct.destination.lat() > 0.0);
        assert!(direct.destination.lon().abs() < 1e-12);
    }

    #[test]
    fn test_near_antipodal_falls_back_without_panicking() {
        let north = Point::new(0.0, 0.5);
        let south = Point::new(179.7, -0.5);
        let inverse = solver().inverse(&north, &south);
        assert!(!inverse.converged);
        assert_eq!(inverse.azimuth1, 180.0);
        assert_eq!(inverse.azimuth2, 180.0);
        let reverse = solver().inverse(&south, &north);
        assert!(!reverse.converged);
        assert_eq!(reverse.azimuth1, 0.0);
        assert_eq!(reverse.azimuth2, 0.0);
        assert!(inverse.distance.is_finite());
        assert!(inverse.distance > 18_000_000.0);
    }

    #[test]
    fn test_segment_distance() {
        let solver = solver();
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 1.0);
        let p = Point::new(0.001, 0.5);
        let d = solver.distance_to_segment(&p, &a, &b);
        // 0.001 degrees of longitude at ~0.5 N is ~111 m
        assert!((d - 111.3).abs() < 0.5);

        // Beyond the end the nearest point is the endpoint
        let beyond = Point::new(0.0, 2.0);
        let nearest = solver.nearest_point_on_segment(&beyond, &a, &b);
        assert_eq!(nearest, b);
    }

    #[test]
    fn test_custom_ellipsoid() {
        let sphere_like = Ellipsoid::from_inverse_flattening(6_371_000.0, 1e12);
        let solver = GeodeticSolver::new(sphere_like);
        let quarter = solver.distance(&Point::new(0.0, 0.0), &Point::new(90.0, 0.0));
        assert!((quarter - std::f64::consts::FRAC_PI_2 * 6_371_000.0).abs() < 1.0);
    }

    #[test]
    fn test_length() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
        ];
        assert!((solver().length(&points) - 2.0 * 111_319.49).abs() < 0.5);
    }
}
