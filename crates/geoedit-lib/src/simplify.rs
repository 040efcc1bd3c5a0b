//! Polyline and polygon simplification
//!
//! Four strategies are available, all applied part by part. The first and the
//! last point of every part are always kept, and a part never drops below the
//! minimum point count of its geometry type: when a strategy would go below
//! it, the part is kept unchanged.
//!
//! Distances are geodetic metres for geographic coordinate systems and plain
//! planar units for projected ones.

use crate::projection::{Projection, WebMercator};
use crate::{
    CoordinateSystem, Feature, GeoEditError, GeodeticSolver, Geometry, GeometryType, Part, Point,
    Result, Shape, geometry,
};
use geo::SimplifyVwPreserve;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Simplification strategy and its parameter
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SimplifyStrategy {
    /// Douglas-Peucker with the maximum allowed deviation from the original
    DouglasPeucker { max_deviation: f64 },
    /// Single pass dropping every odd point closer than `threshold` to the
    /// chord of its even neighbours
    VerticalDistance { threshold: f64 },
    /// Keep every `interval`-th point plus the last one
    Interval { interval: usize },
    /// Topology-preserving Visvalingam-Whyatt in Web Mercator, `tolerance`
    /// being a length in projected metres
    Generalize { tolerance: f64 },
}

/// Applies [`SimplifyStrategy`] values to geometries
#[derive(Clone)]
pub struct LineSimplifier {
    solver: GeodeticSolver,
    projection: Arc<dyn Projection>,
}

impl Default for LineSimplifier {
    fn default() -> Self {
        Self::new(GeodeticSolver::default())
    }
}

impl std::fmt::Debug for LineSimplifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSimplifier")
            .field("solver", &self.solver)
            .field("projection", &self.projection.target())
            .finish()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl LineSimplifier {
    /// Simplifier using Web Mercator for the generalize strategy
    pub fn new(solver: GeodeticSolver) -> Self {
        Self {
            solver,
            projection: Arc::new(WebMercator),
        }
    }

    /// Replace the planar projection used by [`SimplifyStrategy::Generalize`]
    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.projection = projection;
        self
    }

    #[inline]
    pub fn solver(&self) -> &GeodeticSolver {
        &self.solver
    }

    /// Simplify a polyline or polygon
    pub fn simplify(&self, geometry: &Geometry, strategy: &SimplifyStrategy) -> Result<Geometry> {
        let parts = match geometry.shape() {
            Shape::Polyline(parts) | Shape::Polygon(parts) => parts,
            Shape::Point(_) | Shape::Multipoint(_) | Shape::Envelope(_) => {
                return Err(GeoEditError::UnsupportedGeometryType {
                    operation: "simplify",
                    found: geometry.geometry_type(),
                });
            }
        };
        let geometry_type = geometry.geometry_type();
        let system = geometry.coordinate_system();

        let simplified: Vec<Part> = match *strategy {
            SimplifyStrategy::DouglasPeucker { max_deviation } => parts
                .iter()
                .map(|part| {
                    let keep = self.douglas_peucker_indices(part, system, max_deviation);
                    select_points(part, &keep, geometry_type)
                })
                .collect(),
            SimplifyStrategy::VerticalDistance { threshold } => parts
                .iter()
                .map(|part| {
                    let keep = self.vertical_distance_indices(part, system, threshold);
                    select_points(part, &keep, geometry_type)
                })
                .collect(),
            SimplifyStrategy::Interval { interval } => {
                if interval < 2 {
                    return Err(GeoEditError::InvalidArgument(format!(
                        "sampling interval must be at least 2, got {interval}"
                    )));
                }
                parts
                    .iter()
                    .map(|part| {
                        let keep = interval_indices(part.len(), interval);
                        select_points(part, &keep, geometry_type)
                    })
                    .collect()
            }
            SimplifyStrategy::Generalize { tolerance } => {
                self.generalize_parts(parts, geometry_type, system, tolerance)?
            }
        };

        let before = geometry.point_count();
        let result = geometry.with_parts(simplified)?;
        tracing::debug!(
            "Simplified {} with {:?}: {} -> {} points",
            geometry_type,
            strategy,
            before,
            result.point_count()
        );
        Ok(result)
    }

    /// Simplify the geometry of a feature, keeping its identity and attributes
    pub fn simplify_feature(
        &self,
        feature: &Feature,
        strategy: &SimplifyStrategy,
    ) -> Result<Feature> {
        let geometry = self.simplify(feature.geometry(), strategy)?;
        Ok(feature.replace_geometry(geometry))
    }

    /// Distance from `p` to segment `a`-`b` in the metric of `system`
    fn segment_distance(&self, system: CoordinateSystem, p: &Point, a: &Point, b: &Point) -> f64 {
        if system.is_geographic() {
            self.solver.distance_to_segment(p, a, b)
        } else {
            planar_segment_distance(p, a, b)
        }
    }

    /// Indices kept by Douglas-Peucker
    ///
    /// Uses an explicit stack of `(from, to)` ranges so that long, nearly
    /// collinear parts cannot exhaust the call stack.
    pub fn douglas_peucker_indices(
        &self,
        points: &[Point],
        system: CoordinateSystem,
        max_deviation: f64,
    ) -> Vec<usize> {
        let n = points.len();
        if n <= 2 {
            return (0..n).collect();
        }

        let mut keep = vec![false; n];
        keep[0] = true;
        keep[n - 1] = true;

        let mut stack = vec![(0usize, n - 1)];
        while let Some((from, to)) = stack.pop() {
            if to <= from + 1 {
                continue;
            }
            let mut split = from;
            let mut max_distance = f64::NEG_INFINITY;
            for i in (from + 1)..to {
                let d = self.segment_distance(system, &points[i], &points[from], &points[to]);
                if d > max_distance {
                    max_distance = d;
                    split = i;
                }
            }
            if split != from && max_distance >= max_deviation {
                keep[split] = true;
                stack.push((split, to));
                stack.push((from, split));
            }
        }

        keep.iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect()
    }

    /// Indices kept by vertical-distance thinning
    pub fn vertical_distance_indices(
        &self,
        points: &[Point],
        system: CoordinateSystem,
        threshold: f64,
    ) -> Vec<usize> {
        let n = points.len();
        let mut keep = vec![true; n];
        let mut i = 2;
        while i < n {
            let d = self.segment_distance(system, &points[i - 1], &points[i - 2], &points[i]);
            if d < threshold {
                keep[i - 1] = false;
            }
            i += 2;
        }
        keep.iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect()
    }

    fn generalize_parts(
        &self,
        parts: &[Part],
        geometry_type: GeometryType,
        system: CoordinateSystem,
        tolerance: f64,
    ) -> Result<Vec<Part>> {
        let epsilon = tolerance * tolerance;
        parts
            .iter()
            .map(|part| {
                let projected = if system.is_geographic() {
                    part.iter()
                        .map(|p| {
                            self.projection.project(p).ok_or_else(|| {
                                GeoEditError::Projection(format!(
                                    "cannot project ({}, {})",
                                    p.x, p.y
                                ))
                            })
                        })
                        .collect::<Result<Vec<Point>>>()?
                } else {
                    part.clone()
                };

                let coords: Vec<geo::Coord<f64>> =
                    projected.iter().map(|p| geo::Coord::from(*p)).collect();
                let retained: Vec<geo::Coord<f64>> = match geometry_type {
                    GeometryType::Polygon => {
                        let exterior = geometry::part_to_line_string(&projected);
                        let polygon = geo::Polygon::new(exterior, Vec::new());
                        let simplified = polygon.simplify_vw_preserve(epsilon);
                        let mut ring: Vec<_> = simplified.exterior().coords().copied().collect();
                        // Drop the closing coordinate added by geo
                        ring.pop();
                        ring
                    }
                    _ => geometry::part_to_line_string(&projected)
                        .simplify_vw_preserve(epsilon)
                        .into_inner(),
                };

                match match_retained(&coords, &retained) {
                    Some(keep) => Ok(select_points(part, &keep, geometry_type)),
                    None => {
                        tracing::warn!(
                            "Generalized part could not be mapped back to its {} source points, keeping it unchanged",
                            part.len()
                        );
                        Ok(part.clone())
                    }
                }
            })
            .collect()
    }
}

/// Indices kept by interval sampling: multiples of `interval` and the last one
pub fn interval_indices(len: usize, interval: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut keep: Vec<usize> = (0..len).step_by(interval.max(1)).collect();
    if keep.last() != Some(&(len - 1)) {
        keep.push(len - 1);
    }
    keep
}

/// Pick the kept points of a part, or the whole part when too few remain
fn select_points(part: &[Point], keep: &[usize], geometry_type: GeometryType) -> Part {
    let min = geometry_type.min_part_points().unwrap_or(1);
    if keep.len() < min {
        tracing::debug!(
            "Keeping {} part unchanged: {} of {} points left, {} required",
            geometry_type,
            keep.len(),
            part.len(),
            min
        );
        return part.to_vec();
    }
    keep.iter().map(|&i| part[i]).collect()
}

/// Map coordinates retained by a removal-only simplification back to their
/// source indices
fn match_retained(
    source: &[geo::Coord<f64>],
    retained: &[geo::Coord<f64>],
) -> Option<Vec<usize>> {
    let mut indices = Vec::with_capacity(retained.len());
    let mut j = 0;
    for coord in retained {
        while j < source.len() && source[j] != *coord {
            j += 1;
        }
        if j == source.len() {
            return None;
        }
        indices.push(j);
        j += 1;
    }
    Some(indices)
}

fn planar_segment_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let nx = a.x + t * dx;
    let ny = a.y + t * dy;
    ((p.x - nx).powi(2) + (p.y - ny).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A gently wiggling line around Beijing, ~20 m amplitude
    fn wiggly_line(n: usize) -> Part {
        (0..n)
            .map(|i| {
                let t = i as f64;
                Point::new(116.30 + t * 0.001, 39.90 + (t * 0.7).sin() * 0.0002)
            })
            .collect()
    }

    fn polyline(parts: Vec<Part>) -> Geometry {
        Geometry::polyline(parts, CoordinateSystem::Wgs84).unwrap()
    }

    #[test]
    fn test_douglas_peucker_collapses_straight_line() {
        let line: Part = (0..10).map(|i| Point::new(116.0 + i as f64 * 0.001, 39.9)).collect();
        let simplified = LineSimplifier::default()
            .simplify(
                &polyline(vec![line.clone()]),
                &SimplifyStrategy::DouglasPeucker { max_deviation: 1.0 },
            )
            .unwrap();
        let parts = simplified.parts().unwrap();
        assert_eq!(parts[0], vec![line[0], line[9]]);
    }

    #[test]
    fn test_douglas_peucker_keeps_spike() {
        let mut line: Part = (0..5).map(|i| Point::new(116.0 + i as f64 * 0.001, 39.9)).collect();
        line[2] = Point::new(116.002, 39.901); // ~111 m off the chord
        let simplifier = LineSimplifier::default();
        let keep = simplifier.douglas_peucker_indices(&line, CoordinateSystem::Wgs84, 50.0);
        assert_eq!(keep, vec![0, 2, 4]);
        let keep = simplifier.douglas_peucker_indices(&line, CoordinateSystem::Wgs84, 200.0);
        assert_eq!(keep, vec![0, 4]);
    }

    #[test]
    fn test_douglas_peucker_is_idempotent() {
        let simplifier = LineSimplifier::default();
        let strategy = SimplifyStrategy::DouglasPeucker { max_deviation: 5.0 };
        let once = simplifier.simplify(&polyline(vec![wiggly_line(200)]), &strategy).unwrap();
        let twice = simplifier.simplify(&once, &strategy).unwrap();
        assert_eq!(once, twice);
        assert!(once.point_count() < 200);
    }

    #[test]
    fn test_douglas_peucker_handles_long_collinear_parts() {
        let line: Part = (0..100_000)
            .map(|i| Point::new(i as f64, (i % 2) as f64 * 1e-9))
            .collect();
        let simplifier = LineSimplifier::default();
        let keep = simplifier.douglas_peucker_indices(&line, CoordinateSystem::WebMercator, 1.0);
        assert_eq!(keep, vec![0, 99_999]);
    }

    #[test]
    fn test_vertical_distance_drops_odd_points_only() {
        let line: Part = (0..7).map(|i| Point::new(i as f64, 0.0)).collect();
        let simplifier = LineSimplifier::default();
        let keep = simplifier.vertical_distance_indices(&line, CoordinateSystem::WebMercator, 0.5);
        assert_eq!(keep, vec![0, 2, 4, 6]);

        let mut bumpy = line.clone();
        bumpy[3] = Point::new(3.0, 2.0);
        let keep = simplifier.vertical_distance_indices(&bumpy, CoordinateSystem::WebMercator, 0.5);
        assert_eq!(keep, vec![0, 2, 3, 4, 6]);
    }

    #[test]
    fn test_vertical_distance_keeps_last_point_of_even_length() {
        let line: Part = (0..6).map(|i| Point::new(i as f64, 0.0)).collect();
        let keep = LineSimplifier::default().vertical_distance_indices(
            &line,
            CoordinateSystem::WebMercator,
            0.5,
        );
        assert_eq!(keep, vec![0, 2, 4, 5]);
    }

    #[test]
    fn test_interval_sampling_includes_ends() {
        assert_eq!(interval_indices(10, 3), vec![0, 3, 6, 9]);
        assert_eq!(interval_indices(11, 3), vec![0, 3, 6, 9, 10]);

        let simplified = LineSimplifier::default()
            .simplify(
                &polyline(vec![wiggly_line(10)]),
                &SimplifyStrategy::Interval { interval: 3 },
            )
            .unwrap();
        let part = &simplified.parts().unwrap()[0];
        assert_eq!(part.len(), 4);
        assert_eq!(part[0], wiggly_line(10)[0]);
        assert_eq!(part[3], wiggly_line(10)[9]);
    }

    #[test]
    fn test_interval_below_two_rejected() {
        let result = LineSimplifier::default().simplify(
            &polyline(vec![wiggly_line(10)]),
            &SimplifyStrategy::Interval { interval: 1 },
        );
        assert!(matches!(result, Err(GeoEditError::InvalidArgument(_))));
    }

    #[test]
    fn test_polygon_ring_never_below_three_points() {
        let ring = vec![
            Point::new(116.0, 39.9),
            Point::new(116.00001, 39.9),
            Point::new(116.00001, 39.90001),
        ];
        let polygon = Geometry::polygon(vec![ring.clone()], CoordinateSystem::Wgs84).unwrap();
        let simplified = LineSimplifier::default()
            .simplify(&polygon, &SimplifyStrategy::DouglasPeucker { max_deviation: 1000.0 })
            .unwrap();
        assert_eq!(simplified.parts().unwrap()[0], ring);
    }

    #[test]
    fn test_points_are_unsupported() {
        let point = Geometry::point(Point::new(116.0, 39.9), CoordinateSystem::Wgs84);
        let result = LineSimplifier::default()
            .simplify(&point, &SimplifyStrategy::DouglasPeucker { max_deviation: 1.0 });
        assert!(matches!(
            result,
            Err(GeoEditError::UnsupportedGeometryType {
                found: GeometryType::Point,
                ..
            })
        ));
    }

    #[test]
    fn test_generalize_keeps_source_vertices() {
        let line = wiggly_line(100);
        let simplified = LineSimplifier::default()
            .simplify(
                &polyline(vec![line.clone()]),
                &SimplifyStrategy::Generalize { tolerance: 30.0 },
            )
            .unwrap();
        let part = &simplified.parts().unwrap()[0];
        assert!(part.len() < line.len());
        assert_eq!(part.first(), line.first());
        assert_eq!(part.last(), line.last());
        assert!(part.iter().all(|p| line.contains(p)));
        assert_eq!(simplified.coordinate_system(), CoordinateSystem::Wgs84);
    }

    #[test]
    fn test_generalize_polygon() {
        let ring: Part = (0..36)
            .map(|i| {
                let angle = (i as f64 * 10.0).to_radians();
                let r = 0.01 + if i % 2 == 0 { 0.0 } else { 0.00001 };
                Point::new(116.4 + r * angle.cos(), 39.9 + r * angle.sin())
            })
            .collect();
        let polygon = Geometry::polygon(vec![ring.clone()], CoordinateSystem::Wgs84).unwrap();
        let simplified = LineSimplifier::default()
            .simplify(&polygon, &SimplifyStrategy::Generalize { tolerance: 100.0 })
            .unwrap();
        let part = &simplified.parts().unwrap()[0];
        assert!(part.len() >= 3);
        assert!(part.len() < ring.len());
    }

    #[test]
    fn test_simplify_feature_keeps_identity() {
        let feature = Feature::with_id(
            crate::FeatureId(3),
            polyline(vec![wiggly_line(50)]),
            crate::Attributes::new(),
        );
        let simplified = LineSimplifier::default()
            .simplify_feature(&feature, &SimplifyStrategy::Interval { interval: 5 })
            .unwrap();
        assert_eq!(simplified.id(), Some(crate::FeatureId(3)));
        assert_eq!(simplified.geometry().point_count(), 10);
    }

    #[test]
    fn test_match_retained() {
        let source: Vec<geo::Coord<f64>> = (0..5)
            .map(|i| geo::Coord { x: i as f64, y: 0.0 })
            .collect();
        let retained = vec![source[0], source[3], source[4]];
        assert_eq!(match_retained(&source, &retained), Some(vec![0, 3, 4]));
        assert_eq!(match_retained(&source, &[geo::Coord { x: 9.0, y: 9.0 }]), None);
    }
}
