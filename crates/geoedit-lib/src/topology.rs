//! Multi-part editing operations: union, separate, reverse, link and auto-link
//!
//! Every operation validates its input, builds the new geometries and returns
//! an [`EditSet`] describing the change; nothing is written to a store here.
//! New features copy the attributes of the first input feature.

use crate::geometry::{part_to_line_string, ring_to_part};
use crate::{
    CoordinateSystem, EditSet, Feature, GeoEditError, GeodeticSolver, Geometry, GeometryType,
    Part, Point, Result, Shape,
};
use geo::BooleanOps;

pub const UNION_TAG: &str = "Union";
pub const SEPARATE_TAG: &str = "Separate";
pub const REVERSE_TAG: &str = "Reverse";
pub const LINK_TAG: &str = "Link";
pub const AUTO_LINK_TAG: &str = "AutoLink";

/// Topology editing operations
///
/// Endpoint distances for auto-linking are geodetic for geographic coordinate
/// systems and planar otherwise.
#[derive(Debug, Clone, Default)]
pub struct TopologyOps {
    solver: GeodeticSolver,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TopologyOps {
    pub fn new(solver: GeodeticSolver) -> Self {
        Self { solver }
    }

    /// Merge features of one geometry type into a single feature
    pub fn union(&self, features: &[Feature]) -> Result<EditSet> {
        let (geometry_type, coordinate_system) = common_kind(features, "union")?;
        let first = &features[0];

        let geometry = match geometry_type {
            GeometryType::Polygon => union_polygons(features, coordinate_system)?,
            GeometryType::Polyline => {
                let mut parts: Vec<Part> = Vec::new();
                for part in features.iter().flat_map(|f| f.geometry().parts().unwrap_or(&[])) {
                    let pieces = uncovered_pieces(part, &parts);
                    if pieces.is_empty() {
                        tracing::debug!("Union dropped a covered part of {} points", part.len());
                    }
                    parts.extend(pieces);
                }
                Geometry::polyline(parts, coordinate_system)?
            }
            GeometryType::Point | GeometryType::Multipoint => {
                let mut points: Vec<Point> = Vec::new();
                for point in features.iter().flat_map(|f| shape_points(f.geometry().shape())) {
                    if !points.iter().any(|p| p.coincides(point)) {
                        points.push(*point);
                    }
                }
                Geometry::multipoint(points, coordinate_system)?
            }
            GeometryType::Envelope => {
                return Err(GeoEditError::UnsupportedGeometryType {
                    operation: "union",
                    found: GeometryType::Envelope,
                });
            }
        };

        let mut edit = EditSet::new(UNION_TAG);
        edit.deleted = features.iter().filter_map(Feature::id).collect();
        edit.added.push(first.derive(geometry));
        Ok(edit)
    }

    /// Split every multi-part feature into single-part features
    ///
    /// Single-part features are left out of the edit.
    pub fn separate(&self, features: &[Feature]) -> Result<EditSet> {
        if features.is_empty() {
            return Err(GeoEditError::InvalidArgument(
                "separate requires at least one feature".to_string(),
            ));
        }
        let mut edit = EditSet::new(SEPARATE_TAG);
        for feature in features.iter().filter(|f| f.geometry().is_multipart()) {
            let geometry = feature.geometry();
            let cs = geometry.coordinate_system();
            let pieces = match geometry.shape() {
                Shape::Multipoint(points) => points
                    .iter()
                    .map(|p| Geometry::point(*p, cs))
                    .collect::<Vec<_>>(),
                Shape::Polyline(parts) => parts
                    .iter()
                    .map(|part| Geometry::polyline(vec![part.clone()], cs))
                    .collect::<Result<Vec<_>>>()?,
                Shape::Polygon(parts) => parts
                    .iter()
                    .map(|part| Geometry::polygon(vec![part.clone()], cs))
                    .collect::<Result<Vec<_>>>()?,
                Shape::Point(_) | Shape::Envelope(_) => continue,
            };
            edit.deleted.extend(feature.id());
            edit.added
                .extend(pieces.into_iter().map(|piece| feature.derive(piece)));
        }
        Ok(edit)
    }

    /// Reverse the vertex order of every part
    ///
    /// Stored features are updated in place; features without identity come
    /// back as additions.
    pub fn reverse(&self, features: &[Feature]) -> Result<EditSet> {
        if features.is_empty() {
            return Err(GeoEditError::InvalidArgument(
                "reverse requires at least one feature".to_string(),
            ));
        }
        let mut edit = EditSet::new(REVERSE_TAG);
        for feature in features {
            let geometry = feature.geometry();
            let Some(parts) = geometry.parts() else {
                return Err(GeoEditError::UnsupportedGeometryType {
                    operation: "reverse",
                    found: geometry.geometry_type(),
                });
            };
            let flipped = geometry.with_parts(parts.iter().map(|part| reversed(part)).collect())?;
            match feature.id() {
                Some(id) => edit.updated.push((id, flipped)),
                None => edit.added.push(feature.derive(flipped)),
            }
        }
        Ok(edit)
    }

    /// Join single-part polylines end to end in input order
    ///
    /// For two features `head_to_head` and `reverse` pick the orientation:
    /// `(true, false)` reverses the first line, `(false, false)` appends the
    /// second line, `(false, true)` prepends it and `(true, true)` reverses
    /// the second line before appending. With more than two features
    /// `reverse` flips the feature order and `head_to_head` has no effect.
    pub fn link(&self, features: &[Feature], head_to_head: bool, reverse: bool) -> Result<EditSet> {
        let (paths, coordinate_system) = single_part_polylines(features, "link")?;

        let ordered: Vec<Part> = if let [first, second] = paths.as_slice() {
            match (head_to_head, reverse) {
                (true, false) => vec![reversed(first), second.to_vec()],
                (false, false) => vec![first.to_vec(), second.to_vec()],
                (false, true) => vec![second.to_vec(), first.to_vec()],
                (true, true) => vec![first.to_vec(), reversed(second)],
            }
        } else {
            if head_to_head {
                tracing::debug!("Link of {} features ignores head-to-head", paths.len());
            }
            let mut ordered: Vec<Part> = paths.iter().map(|p| p.to_vec()).collect();
            if reverse {
                ordered.reverse();
            }
            ordered
        };

        let mut joined: Part = Vec::with_capacity(ordered.iter().map(Vec::len).sum());
        for part in &ordered {
            let skip = joined
                .last()
                .zip(part.first())
                .is_some_and(|(a, b)| a.coincides(b));
            joined.extend_from_slice(if skip { &part[1..] } else { &part[..] });
        }

        self.linked_edit(LINK_TAG, features, joined, coordinate_system)
    }

    /// Join single-part polylines choosing each orientation by nearest endpoint
    ///
    /// The first line is flipped when its start lies closer to the second line
    /// than its end; every following line is appended forward or reversed,
    /// whichever endpoint is closer to the last placed point. No points are
    /// removed at the junctions.
    pub fn auto_link(&self, features: &[Feature]) -> Result<EditSet> {
        let (paths, coordinate_system) = single_part_polylines(features, "auto_link")?;
        let distance = |a: &Point, b: &Point| self.endpoint_distance(a, b, coordinate_system);

        let (first, second) = (paths[0], paths[1]);
        let (s1, e1) = endpoints(first);
        let (s2, e2) = endpoints(second);
        let from_start = distance(s1, s2).min(distance(s1, e2));
        let from_end = distance(e1, s2).min(distance(e1, e2));

        let mut joined: Part = if from_start < from_end {
            reversed(first)
        } else {
            first.to_vec()
        };
        for path in &paths[1..] {
            let (start, end) = endpoints(path);
            let anchor = joined[joined.len() - 1];
            if distance(&anchor, start) <= distance(&anchor, end) {
                joined.extend_from_slice(path);
            } else {
                joined.extend(path.iter().rev().copied());
            }
        }

        self.linked_edit(AUTO_LINK_TAG, features, joined, coordinate_system)
    }

    fn linked_edit(
        &self,
        tag: &str,
        features: &[Feature],
        joined: Part,
        coordinate_system: CoordinateSystem,
    ) -> Result<EditSet> {
        let geometry = Geometry::polyline(vec![joined], coordinate_system)?;
        let mut edit = EditSet::new(tag);
        edit.deleted = features.iter().filter_map(Feature::id).collect();
        edit.added.push(features[0].derive(geometry));
        Ok(edit)
    }

    fn endpoint_distance(&self, a: &Point, b: &Point, system: CoordinateSystem) -> f64 {
        if system.is_geographic() {
            self.solver.distance(a, b)
        } else {
            (b.x - a.x).hypot(b.y - a.y)
        }
    }
}

/// Shared geometry type and coordinate system of a non-empty feature set
///
/// Points and multipoints count as one kind.
fn common_kind(
    features: &[Feature],
    operation: &str,
) -> Result<(GeometryType, CoordinateSystem)> {
    let Some(first) = features.first() else {
        return Err(GeoEditError::InvalidArgument(format!(
            "{operation} requires at least one feature"
        )));
    };
    let family = |t: GeometryType| match t {
        GeometryType::Multipoint => GeometryType::Point,
        other => other,
    };
    let geometry_type = first.geometry().geometry_type();
    let coordinate_system = first.geometry().coordinate_system();
    for feature in &features[1..] {
        let geometry = feature.geometry();
        if family(geometry.geometry_type()) != family(geometry_type) {
            return Err(GeoEditError::InvalidArgument(format!(
                "{operation} cannot mix {} and {}",
                geometry_type,
                geometry.geometry_type()
            )));
        }
        if geometry.coordinate_system() != coordinate_system {
            return Err(GeoEditError::InvalidArgument(format!(
                "{operation} cannot mix {} and {} coordinates",
                coordinate_system,
                geometry.coordinate_system()
            )));
        }
    }
    Ok((family(geometry_type), coordinate_system))
}

/// The single path of each feature, after checking that there are at least
/// two single-part polylines in one coordinate system
fn single_part_polylines<'a>(
    features: &'a [Feature],
    operation: &str,
) -> Result<(Vec<&'a [Point]>, CoordinateSystem)> {
    if features.len() < 2 {
        return Err(GeoEditError::InvalidArgument(format!(
            "{operation} requires at least two features, got {}",
            features.len()
        )));
    }
    let (geometry_type, coordinate_system) = common_kind(features, operation)?;
    if geometry_type != GeometryType::Polyline {
        return Err(GeoEditError::InvalidArgument(format!(
            "{operation} requires polylines, got {geometry_type}"
        )));
    }
    let mut paths = Vec::with_capacity(features.len());
    for feature in features {
        match feature.geometry().parts() {
            Some([path]) => paths.push(path.as_slice()),
            _ => {
                return Err(GeoEditError::InvalidArgument(format!(
                    "{operation} requires single-part polylines, got {} parts",
                    feature.geometry().part_count()
                )));
            }
        }
    }
    Ok((paths, coordinate_system))
}

#[inline]
fn endpoints(path: &[Point]) -> (&Point, &Point) {
    (&path[0], &path[path.len() - 1])
}

fn reversed(part: &[Point]) -> Part {
    part.iter().rev().copied().collect()
}

/// Relative tolerance for collinearity and overlap length
const OVERLAP_EPSILON: f64 = 1e-9;

/// Point at parameter `t` of segment `a`-`b`; the ends are returned exactly
fn point_along(a: &Point, b: &Point, t: f64) -> Point {
    if t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }
    let z = match (a.z, b.z) {
        (Some(za), Some(zb)) => Some(za + (zb - za) * t),
        _ => None,
    };
    Point {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
        z,
    }
}

/// Parameter ranges of segment `a`-`b` not lying on any segment of `covered`
fn uncovered_intervals(a: &Point, b: &Point, covered: &[Part]) -> Vec<(f64, f64)> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return Vec::new();
    }
    let len = len_sq.sqrt();
    let tolerance = OVERLAP_EPSILON * len;

    let mut overlaps: Vec<(f64, f64)> = Vec::new();
    for part in covered {
        for pair in part.windows(2) {
            let (c, d) = (&pair[0], &pair[1]);
            // Both ends on the carrier line of a-b
            let off_c = (dx * (c.y - a.y) - dy * (c.x - a.x)) / len;
            let off_d = (dx * (d.y - a.y) - dy * (d.x - a.x)) / len;
            if off_c.abs() > tolerance || off_d.abs() > tolerance {
                continue;
            }
            let tc = (dx * (c.x - a.x) + dy * (c.y - a.y)) / len_sq;
            let td = (dx * (d.x - a.x) + dy * (d.y - a.y)) / len_sq;
            let (from, to) = (tc.min(td).max(0.0), tc.max(td).min(1.0));
            if to - from > OVERLAP_EPSILON {
                overlaps.push((from, to));
            }
        }
    }
    overlaps.sort_by(|p, q| p.0.total_cmp(&q.0));

    let mut free = Vec::new();
    let mut cursor = 0.0;
    for (from, to) in overlaps {
        if from - cursor > OVERLAP_EPSILON {
            free.push((cursor, from));
        }
        cursor = f64::max(cursor, to);
    }
    if 1.0 - cursor > OVERLAP_EPSILON {
        free.push((cursor, 1.0));
    }
    free
}

/// Sub-paths of `part` that do not overlap the already collected parts
///
/// Each segment is cut at the ends of collinear overlaps; uncovered pieces
/// that touch are chained back into one path.
fn uncovered_pieces(part: &[Point], covered: &[Part]) -> Vec<Part> {
    let mut pieces: Vec<Part> = Vec::new();
    let mut current: Part = Vec::new();
    for pair in part.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        for (from, to) in uncovered_intervals(a, b, covered) {
            let start = point_along(a, b, from);
            let end = point_along(a, b, to);
            if !current.last().is_some_and(|last| last.coincides(&start)) {
                if current.len() >= 2 {
                    pieces.push(std::mem::take(&mut current));
                }
                current = vec![start];
            }
            current.push(end);
        }
    }
    if current.len() >= 2 {
        pieces.push(current);
    }
    pieces
}

fn shape_points(shape: &Shape) -> &[Point] {
    match shape {
        Shape::Point(p) => std::slice::from_ref(p),
        Shape::Multipoint(points) => points,
        Shape::Polyline(_) | Shape::Polygon(_) | Shape::Envelope(_) => &[],
    }
}

/// Twice the signed area of a ring, positive for counter-clockwise
fn signed_area(ring: &[Point]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (&ring[i], &ring[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum()
}

/// Rebuild `geo` polygons from rings
///
/// Rings wound like the first ring are exteriors; rings wound the other way
/// are holes of the exterior containing their first vertex.
fn to_multi_polygon(rings: &[Part]) -> geo::MultiPolygon<f64> {
    use geo::Contains;

    let Some(first) = rings.first() else {
        return geo::MultiPolygon::new(Vec::new());
    };
    let outer_sign = signed_area(first).signum();
    let (exteriors, holes): (Vec<&Part>, Vec<&Part>) = rings
        .iter()
        .partition(|ring| signed_area(ring).signum() == outer_sign);

    let mut polygons: Vec<geo::Polygon<f64>> = exteriors
        .into_iter()
        .map(|ring| geo::Polygon::new(part_to_line_string(ring), Vec::new()))
        .collect();

    for hole in holes {
        let probe = geo::Point::from(geo::Coord::from(hole[0]));
        match polygons.iter_mut().find(|polygon| polygon.contains(&probe)) {
            Some(polygon) => polygon.interiors_push(part_to_line_string(hole)),
            None => {
                tracing::warn!(
                    "Hole of {} points lies outside every exterior ring, treating it as an exterior",
                    hole.len()
                );
                polygons.push(geo::Polygon::new(part_to_line_string(hole), Vec::new()));
            }
        }
    }
    geo::MultiPolygon::new(polygons)
}

fn union_polygons(features: &[Feature], coordinate_system: CoordinateSystem) -> Result<Geometry> {
    let mut merged: Option<geo::MultiPolygon<f64>> = None;
    for feature in features {
        let rings = feature.geometry().parts().unwrap_or(&[]);
        let polygon = to_multi_polygon(rings);
        merged = Some(match merged {
            Some(acc) => acc.union(&polygon),
            None => polygon,
        });
    }

    let parts: Vec<Part> = merged
        .iter()
        .flat_map(|multi| multi.0.iter())
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .map(ring_to_part)
        .filter(|part| part.len() >= 3)
        .collect();
    if parts.is_empty() {
        return Err(GeoEditError::InvalidArgument(
            "union produced an empty polygon".to_string(),
        ));
    }
    Geometry::polygon(parts, coordinate_system)
}
