//! Geometry value types: points, parts, shapes and coordinate-system tags
//!
//! Every geometry is an immutable value. Operations in this crate build new
//! geometries instead of mutating existing ones, so a [`Geometry`] can be
//! shared freely between threads.

use crate::{GeoEditError, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single vertex
///
/// `x` is longitude (or easting for projected systems), `y` is latitude (or
/// northing). `z` is carried through operations but never used for planar or
/// geodetic math.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    /// Create a 2D point
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Create a point with elevation
    #[inline]
    pub const fn new_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// Longitude in degrees (alias of `x` for geographic systems)
    #[inline]
    pub fn lon(&self) -> f64 {
        self.x
    }

    /// Latitude in degrees (alias of `y` for geographic systems)
    #[inline]
    pub fn lat(&self) -> f64 {
        self.y
    }

    /// Same z, new horizontal position
    #[inline]
    pub fn with_xy(&self, x: f64, y: f64) -> Self {
        Self { x, y, z: self.z }
    }

    /// Whether both points occupy the same horizontal position
    #[inline]
    pub fn coincides(&self, other: &Point) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(point: Point) -> Self {
        geo::Coord {
            x: point.x,
            y: point.y,
        }
    }
}

impl From<geo::Coord<f64>> for Point {
    fn from(coord: geo::Coord<f64>) -> Self {
        Point::new(coord.x, coord.y)
    }
}

/// Ordered vertex sequence of a polyline path or polygon ring
///
/// Polygon rings are implicitly closed: the first point is not repeated at the
/// end.
pub type Part = Vec<Point>;

/// Coordinate reference a geometry is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoordinateSystem {
    /// WGS84 longitude/latitude in degrees (EPSG:4326)
    #[default]
    Wgs84,
    /// China's GCJ-02 obfuscated datum ("Mars coordinates")
    Gcj02,
    /// Baidu's BD-09 datum, an additional offset on top of GCJ-02
    Bd09,
    /// Web Mercator metres (EPSG:3857)
    WebMercator,
}

impl CoordinateSystem {
    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(self) -> bool {
        !matches!(self, CoordinateSystem::WebMercator)
    }

    pub fn name(self) -> &'static str {
        match self {
            CoordinateSystem::Wgs84 => "WGS84",
            CoordinateSystem::Gcj02 => "GCJ02",
            CoordinateSystem::Bd09 => "BD09",
            CoordinateSystem::WebMercator => "WebMercator",
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CoordinateSystem {
    type Err = GeoEditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wgs84" | "wgs-84" | "epsg:4326" | "4326" => Ok(CoordinateSystem::Wgs84),
            "gcj02" | "gcj-02" | "mars" => Ok(CoordinateSystem::Gcj02),
            "bd09" | "bd-09" | "baidu" => Ok(CoordinateSystem::Bd09),
            "webmercator" | "web_mercator" | "epsg:3857" | "3857" => {
                Ok(CoordinateSystem::WebMercator)
            }
            _ => Err(GeoEditError::UnsupportedCoordinateSystem(s.to_string())),
        }
    }
}

/// Discriminant of [`Shape`], used for precondition checks and error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GeometryType {
    Point,
    Multipoint,
    Polyline,
    Polygon,
    Envelope,
}

impl GeometryType {
    /// Minimum number of points of one part, for part-based types
    pub fn min_part_points(self) -> Option<usize> {
        match self {
            GeometryType::Polyline => Some(2),
            GeometryType::Polygon => Some(3),
            GeometryType::Point | GeometryType::Multipoint | GeometryType::Envelope => None,
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryType::Point => "Point",
            GeometryType::Multipoint => "Multipoint",
            GeometryType::Polyline => "Polyline",
            GeometryType::Polygon => "Polygon",
            GeometryType::Envelope => "Envelope",
        };
        f.write_str(name)
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope from two opposite corners in any order
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    /// Bounding box of a point sequence, `None` when empty
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut envelope = Envelope::new(*first, *first);
        for p in iter {
            envelope.min_x = envelope.min_x.min(p.x);
            envelope.min_y = envelope.min_y.min(p.y);
            envelope.max_x = envelope.max_x.max(p.x);
            envelope.max_y = envelope.max_y.max(p.y);
        }
        Some(envelope)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn contains(&self, point: &Point) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }

    /// Lower-left and upper-right corners
    pub fn corners(&self) -> (Point, Point) {
        (
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.max_y),
        )
    }
}

/// The closed set of supported geometry shapes
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    Point(Point),
    Multipoint(Vec<Point>),
    Polyline(Vec<Part>),
    Polygon(Vec<Part>),
    Envelope(Envelope),
}

impl Shape {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Shape::Point(_) => GeometryType::Point,
            Shape::Multipoint(_) => GeometryType::Multipoint,
            Shape::Polyline(_) => GeometryType::Polyline,
            Shape::Polygon(_) => GeometryType::Polygon,
            Shape::Envelope(_) => GeometryType::Envelope,
        }
    }
}

/// A shape tagged with the coordinate system all of its points share
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    shape: Shape,
    coordinate_system: CoordinateSystem,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Geometry {
    pub fn point(point: Point, coordinate_system: CoordinateSystem) -> Self {
        Self {
            shape: Shape::Point(point),
            coordinate_system,
        }
    }

    pub fn envelope(envelope: Envelope, coordinate_system: CoordinateSystem) -> Self {
        Self {
            shape: Shape::Envelope(envelope),
            coordinate_system,
        }
    }

    /// Create a multipoint; at least one point is required
    pub fn multipoint(points: Vec<Point>, coordinate_system: CoordinateSystem) -> Result<Self> {
        if points.is_empty() {
            return Err(GeoEditError::InvalidArgument(
                "multipoint requires at least one point".to_string(),
            ));
        }
        Ok(Self {
            shape: Shape::Multipoint(points),
            coordinate_system,
        })
    }

    /// Create a polyline; every part needs at least 2 points
    pub fn polyline(parts: Vec<Part>, coordinate_system: CoordinateSystem) -> Result<Self> {
        Self::validate_parts(GeometryType::Polyline, &parts)?;
        Ok(Self {
            shape: Shape::Polyline(parts),
            coordinate_system,
        })
    }

    /// Create a polygon; every ring needs at least 3 points and is stored
    /// without a repeated closing point
    pub fn polygon(parts: Vec<Part>, coordinate_system: CoordinateSystem) -> Result<Self> {
        Self::validate_parts(GeometryType::Polygon, &parts)?;
        Ok(Self {
            shape: Shape::Polygon(parts),
            coordinate_system,
        })
    }

    fn validate_parts(geometry_type: GeometryType, parts: &[Part]) -> Result<()> {
        let min = geometry_type.min_part_points().unwrap_or(1);
        if parts.is_empty() {
            return Err(GeoEditError::InvalidArgument(format!(
                "{geometry_type} requires at least one part"
            )));
        }
        if let Some((index, part)) = parts.iter().enumerate().find(|(_, p)| p.len() < min) {
            return Err(GeoEditError::InvalidArgument(format!(
                "{geometry_type} part {index} has {} points, at least {min} required",
                part.len()
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn into_shape(self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    #[inline]
    pub fn geometry_type(&self) -> GeometryType {
        self.shape.geometry_type()
    }

    /// Parts of a polyline or polygon, `None` for other shapes
    pub fn parts(&self) -> Option<&[Part]> {
        match &self.shape {
            Shape::Polyline(parts) | Shape::Polygon(parts) => Some(parts),
            Shape::Point(_) | Shape::Multipoint(_) | Shape::Envelope(_) => None,
        }
    }

    /// Number of parts; every point of a multipoint is a part, points and
    /// envelopes count as a single part
    pub fn part_count(&self) -> usize {
        match &self.shape {
            Shape::Multipoint(points) => points.len(),
            Shape::Polyline(parts) | Shape::Polygon(parts) => parts.len(),
            Shape::Point(_) | Shape::Envelope(_) => 1,
        }
    }

    #[inline]
    pub fn is_multipart(&self) -> bool {
        self.part_count() > 1
    }

    pub fn point_count(&self) -> usize {
        match &self.shape {
            Shape::Point(_) => 1,
            Shape::Multipoint(points) => points.len(),
            Shape::Polyline(parts) | Shape::Polygon(parts) => parts.iter().map(Vec::len).sum(),
            Shape::Envelope(_) => 4,
        }
    }

    /// Rebuild a polyline or polygon of the same type and coordinate system
    /// from new parts
    pub fn with_parts(&self, parts: Vec<Part>) -> Result<Self> {
        match &self.shape {
            Shape::Polyline(_) => Self::polyline(parts, self.coordinate_system),
            Shape::Polygon(_) => Self::polygon(parts, self.coordinate_system),
            Shape::Point(_) | Shape::Multipoint(_) | Shape::Envelope(_) => {
                Err(GeoEditError::UnsupportedGeometryType {
                    operation: "with_parts",
                    found: self.geometry_type(),
                })
            }
        }
    }

    /// Transform every vertex and retag the result
    ///
    /// Envelopes are rebuilt from their transformed corners.
    pub fn map_points<F>(&self, coordinate_system: CoordinateSystem, mut f: F) -> Result<Self>
    where
        F: FnMut(&Point) -> Result<Point>,
    {
        let mut map_part = |part: &Part| part.iter().map(&mut f).collect::<Result<Part>>();

        let shape = match &self.shape {
            Shape::Point(p) => Shape::Point(f(p)?),
            Shape::Multipoint(points) => Shape::Multipoint(map_part(points)?),
            Shape::Polyline(parts) => {
                Shape::Polyline(parts.iter().map(&mut map_part).collect::<Result<_>>()?)
            }
            Shape::Polygon(parts) => {
                Shape::Polygon(parts.iter().map(&mut map_part).collect::<Result<_>>()?)
            }
            Shape::Envelope(envelope) => {
                let (min, max) = envelope.corners();
                Shape::Envelope(Envelope::new(f(&min)?, f(&max)?))
            }
        };

        Ok(Self {
            shape,
            coordinate_system,
        })
    }

    /// Bounding box of all vertices
    pub fn bounding_box(&self) -> Option<Envelope> {
        match &self.shape {
            Shape::Point(p) => Some(Envelope::new(*p, *p)),
            Shape::Multipoint(points) => Envelope::from_points(points),
            Shape::Polyline(parts) | Shape::Polygon(parts) => {
                Envelope::from_points(parts.iter().flatten())
            }
            Shape::Envelope(envelope) => Some(*envelope),
        }
    }
}

/// Convert a part into a `geo` line string (rings are closed by `geo` itself
/// when wrapped into a polygon)
pub(crate) fn part_to_line_string(part: &[Point]) -> geo::LineString<f64> {
    part.iter()
        .map(|p| geo::Coord::from(*p))
        .collect::<Vec<_>>()
        .into()
}

/// Convert a closed `geo` ring back into an implicitly closed part
pub(crate) fn ring_to_part(ring: &geo::LineString<f64>) -> Part {
    let mut part: Part = ring.coords().map(|c| Point::from(*c)).collect();
    if part.len() > 1 && part.first().zip(part.last()).is_some_and(|(a, b)| a.coincides(b)) {
        part.pop();
    }
    part
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Part {
        vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_polyline_requires_two_points_per_part() {
        let result = Geometry::polyline(vec![vec![Point::new(0.0, 0.0)]], CoordinateSystem::Wgs84);
        assert!(matches!(result, Err(GeoEditError::InvalidArgument(_))));
    }

    #[test]
    fn test_polygon_requires_three_points_per_ring() {
        let ring = vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        assert!(Geometry::polygon(vec![ring], CoordinateSystem::Wgs84).is_err());
        assert!(Geometry::polygon(vec![square()], CoordinateSystem::Wgs84).is_ok());
    }

    #[test]
    fn test_empty_part_list_rejected() {
        assert!(Geometry::polyline(Vec::new(), CoordinateSystem::Wgs84).is_err());
        assert!(Geometry::multipoint(Vec::new(), CoordinateSystem::Wgs84).is_err());
    }

    #[test]
    fn test_counts() {
        let geometry =
            Geometry::polygon(vec![square(), square()], CoordinateSystem::Gcj02).unwrap();
        assert_eq!(geometry.part_count(), 2);
        assert_eq!(geometry.point_count(), 8);
        assert!(geometry.is_multipart());
        assert_eq!(geometry.coordinate_system(), CoordinateSystem::Gcj02);

        let point = Geometry::point(Point::new(1.0, 2.0), CoordinateSystem::Wgs84);
        assert_eq!(point.part_count(), 1);
        assert!(point.parts().is_none());

        let multipoint = Geometry::multipoint(
            vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)],
            CoordinateSystem::Wgs84,
        )
        .unwrap();
        assert_eq!(multipoint.part_count(), 2);
        assert!(multipoint.is_multipart());
    }

    #[test]
    fn test_with_parts_keeps_type_and_system() {
        let geometry = Geometry::polyline(vec![square()], CoordinateSystem::Bd09).unwrap();
        let rebuilt = geometry.with_parts(vec![square()[..2].to_vec()]).unwrap();
        assert_eq!(rebuilt.geometry_type(), GeometryType::Polyline);
        assert_eq!(rebuilt.coordinate_system(), CoordinateSystem::Bd09);

        let point = Geometry::point(Point::new(1.0, 2.0), CoordinateSystem::Wgs84);
        assert!(matches!(
            point.with_parts(vec![square()]),
            Err(GeoEditError::UnsupportedGeometryType { .. })
        ));
    }

    #[test]
    fn test_map_points_preserves_z() {
        let geometry = Geometry::polyline(
            vec![vec![Point::new_z(1.0, 2.0, 10.0), Point::new(3.0, 4.0)]],
            CoordinateSystem::Wgs84,
        )
        .unwrap();
        let shifted = geometry
            .map_points(CoordinateSystem::Gcj02, |p| Ok(p.with_xy(p.x + 1.0, p.y)))
            .unwrap();
        let parts = shifted.parts().unwrap();
        assert_eq!(parts[0][0], Point::new_z(2.0, 2.0, 10.0));
        assert_eq!(shifted.coordinate_system(), CoordinateSystem::Gcj02);
    }

    #[test]
    fn test_coordinate_system_parsing() {
        assert_eq!("EPSG:4326".parse::<CoordinateSystem>().unwrap(), CoordinateSystem::Wgs84);
        assert_eq!("gcj-02".parse::<CoordinateSystem>().unwrap(), CoordinateSystem::Gcj02);
        assert_eq!("BD09".parse::<CoordinateSystem>().unwrap(), CoordinateSystem::Bd09);
        assert!(matches!(
            "NAD27".parse::<CoordinateSystem>(),
            Err(GeoEditError::UnsupportedCoordinateSystem(_))
        ));
    }

    #[test]
    fn test_bounding_box() {
        let geometry = Geometry::polygon(vec![square()], CoordinateSystem::Wgs84).unwrap();
        let bbox = geometry.bounding_box().unwrap();
        assert!((bbox.width() - 1.0).abs() < f64::EPSILON);
        assert!((bbox.height() - 1.0).abs() < f64::EPSILON);
        assert!(bbox.contains(&Point::new(0.5, 0.5)));
    }

    #[test]
    fn test_ring_round_trip_through_geo() {
        let polygon = geo::Polygon::new(part_to_line_string(&square()), Vec::new());
        let part = ring_to_part(polygon.exterior());
        assert_eq!(part.len(), 4);
    }
}
