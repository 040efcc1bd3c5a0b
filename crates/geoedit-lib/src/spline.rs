//! Catmull-Rom smoothing with uniform, centripetal and chordal parametrization
//!
//! Each segment `p1`-`p2` of the input is evaluated with the Barry-Goldman
//! pyramid over the window `(p0, p1, p2, p3)`, which stays correct for the
//! non-uniform knot spacing of the centripetal and chordal variants. The
//! curve passes through every input point; `z` is interpolated linearly along
//! each segment.

use crate::{Feature, GeoEditError, Geometry, Part, Point, Result, Shape};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Knot spacing exponent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SplineAlpha {
    /// α = 0
    Uniform,
    /// α = 0.5, free of cusps and self-intersections within a segment
    #[default]
    Centripetal,
    /// α = 1
    Chordal,
}

impl SplineAlpha {
    pub fn exponent(self) -> f64 {
        match self {
            SplineAlpha::Uniform => 0.0,
            SplineAlpha::Centripetal => 0.5,
            SplineAlpha::Chordal => 1.0,
        }
    }
}

/// Smoothing parameters applied to whole geometries
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplineSmoother {
    points_per_segment: usize,
    alpha: SplineAlpha,
}

impl Default for SplineSmoother {
    fn default() -> Self {
        Self {
            points_per_segment: 8,
            alpha: SplineAlpha::Centripetal,
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SplineSmoother {
    /// `points_per_segment` counts both ends of a segment and must be ≥ 2
    pub fn new(points_per_segment: usize, alpha: SplineAlpha) -> Result<Self> {
        check_points_per_segment(points_per_segment)?;
        Ok(Self {
            points_per_segment,
            alpha,
        })
    }

    #[inline]
    pub fn points_per_segment(&self) -> usize {
        self.points_per_segment
    }

    #[inline]
    pub fn alpha(&self) -> SplineAlpha {
        self.alpha
    }

    /// Smooth every part of a polyline or polygon
    ///
    /// Polygon rings are smoothed as closed curves.
    pub fn smooth(&self, geometry: &Geometry) -> Result<Geometry> {
        let parts = match geometry.shape() {
            Shape::Polyline(parts) => parts
                .iter()
                .map(|part| interpolate(part, self.points_per_segment, self.alpha))
                .collect::<Result<Vec<Part>>>()?,
            Shape::Polygon(rings) => rings
                .iter()
                .map(|ring| self.smooth_ring(ring))
                .collect::<Result<Vec<Part>>>()?,
            Shape::Point(_) | Shape::Multipoint(_) | Shape::Envelope(_) => {
                return Err(GeoEditError::UnsupportedGeometryType {
                    operation: "smooth",
                    found: geometry.geometry_type(),
                });
            }
        };
        geometry.with_parts(parts)
    }

    /// Smooth the geometry of a feature, keeping its identity and attributes
    pub fn smooth_feature(&self, feature: &Feature) -> Result<Feature> {
        Ok(feature.replace_geometry(self.smooth(feature.geometry())?))
    }

    fn smooth_ring(&self, ring: &[Point]) -> Result<Part> {
        let mut closed = ring.to_vec();
        if let Some(first) = ring.first() {
            if ring.last().is_some_and(|last| !last.coincides(first)) {
                closed.push(*first);
            }
        }
        let mut smoothed = interpolate(&closed, self.points_per_segment, self.alpha)?;
        if smoothed.len() > 1 {
            // Back to an implicitly closed ring
            smoothed.pop();
        }
        Ok(smoothed)
    }
}

/// Smooth a polyline or polygon with one-off parameters
pub fn smooth_geometry(
    geometry: &Geometry,
    points_per_segment: usize,
    alpha: SplineAlpha,
) -> Result<Geometry> {
    SplineSmoother::new(points_per_segment, alpha)?.smooth(geometry)
}

fn check_points_per_segment(points_per_segment: usize) -> Result<()> {
    if points_per_segment < 2 {
        return Err(GeoEditError::InvalidArgument(format!(
            "points per segment must be at least 2, got {points_per_segment}"
        )));
    }
    Ok(())
}

/// Catmull-Rom interpolation of a vertex sequence
///
/// Every segment contributes `points_per_segment` samples including both of
/// its ends; the shared junction points appear once, so the output holds
/// `(n - 1) * (points_per_segment - 1) + 1` points. Inputs with fewer than 3
/// points are returned unchanged. A sequence whose first and last points
/// coincide is treated as a closed curve.
pub fn interpolate(
    points: &[Point],
    points_per_segment: usize,
    alpha: SplineAlpha,
) -> Result<Vec<Point>> {
    check_points_per_segment(points_per_segment)?;
    let n = points.len();
    if n < 3 {
        return Ok(points.to_vec());
    }

    let first = points[0];
    let last = points[n - 1];
    let closed = first.coincides(&last);
    let before = if closed {
        points[n - 2]
    } else {
        extrapolate(&first, &points[1])
    };
    let after = if closed {
        points[1]
    } else {
        extrapolate(&last, &points[n - 2])
    };

    let mut output = Vec::with_capacity((n - 1) * (points_per_segment - 1) + 1);
    output.push(first);
    for i in 0..n - 1 {
        let p0 = if i == 0 { before } else { points[i - 1] };
        let p3 = if i + 2 < n { points[i + 2] } else { after };
        segment(&p0, &points[i], &points[i + 1], &p3, points_per_segment, alpha, &mut output);
    }
    Ok(output)
}

/// Phantom neighbour of `end` mirrored away from `inner`
#[inline]
fn extrapolate(end: &Point, inner: &Point) -> Point {
    end.with_xy(2.0 * end.x - inner.x, 2.0 * end.y - inner.y)
}

/// Knot increment between two points; degenerate intervals use a unit step
#[inline]
fn knot_step(a: &Point, b: &Point, exponent: f64) -> f64 {
    let step = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt().powf(exponent);
    if step > 1e-12 { step } else { 1.0 }
}

/// Append the samples of segment `p1`-`p2` after `p1` (which is already in
/// the output)
fn segment(
    p0: &Point,
    p1: &Point,
    p2: &Point,
    p3: &Point,
    points_per_segment: usize,
    alpha: SplineAlpha,
    output: &mut Vec<Point>,
) {
    let (t0, t1, t2, t3) = match alpha {
        SplineAlpha::Uniform => (0.0, 1.0, 2.0, 3.0),
        SplineAlpha::Centripetal | SplineAlpha::Chordal => {
            let exponent = alpha.exponent();
            let t1 = knot_step(p0, p1, exponent);
            let t2 = t1 + knot_step(p1, p2, exponent);
            let t3 = t2 + knot_step(p2, p3, exponent);
            (0.0, t1, t2, t3)
        }
    };

    let last = points_per_segment - 1;
    for j in 1..last {
        let fraction = j as f64 / last as f64;
        let t = t1 + (t2 - t1) * fraction;

        let (a1x, a1y) = lerp(p0, p1, t0, t1, t);
        let (a2x, a2y) = lerp(p1, p2, t1, t2, t);
        let (a3x, a3y) = lerp(p2, p3, t2, t3, t);

        let (b1x, b1y) = blend((a1x, a1y), (a2x, a2y), t0, t2, t);
        let (b2x, b2y) = blend((a2x, a2y), (a3x, a3y), t1, t3, t);

        let (cx, cy) = blend((b1x, b1y), (b2x, b2y), t1, t2, t);

        let z = match (p1.z, p2.z) {
            (Some(z1), Some(z2)) => Some(z1 + (z2 - z1) * fraction),
            _ => None,
        };
        output.push(Point { x: cx, y: cy, z });
    }
    output.push(*p2);
}

#[inline]
fn lerp(a: &Point, b: &Point, ta: f64, tb: f64, t: f64) -> (f64, f64) {
    blend((a.x, a.y), (b.x, b.y), ta, tb, t)
}

#[inline]
fn blend(a: (f64, f64), b: (f64, f64), ta: f64, tb: f64, t: f64) -> (f64, f64) {
    let wa = (tb - t) / (tb - ta);
    let wb = (t - ta) / (tb - ta);
    (wa * a.0 + wb * b.0, wa * a.1 + wb * b.1)
}
