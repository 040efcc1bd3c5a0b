//! GeoEdit Library - Geodetic geometry processing for feature editing
//!
//! Pure geometry kernels behind an interactive GIS editor: geodesics on the
//! ellipsoid, China datum offsets, line simplification, spline smoothing,
//! multi-part topology edits and slippy-map tile math. Operations take
//! immutable geometries and return new ones; persistence goes through the
//! [`FeatureStore`] seam.
//!
//! # Architecture
//!
//! - **[`GeodeticSolver`]**: Vincenty inverse/direct on a configurable [`Ellipsoid`]
//! - **[`datum`]**: WGS84 / GCJ-02 / BD-09 conversion through a WGS84 hub
//! - **[`LineSimplifier`]**: Douglas-Peucker, vertical distance, interval and
//!   topology-preserving generalization
//! - **[`SplineSmoother`]**: centripetal (or uniform/chordal) Catmull-Rom
//! - **[`TopologyOps`]**: union, separate, reverse, link and auto-link, producing
//!   [`EditSet`]s
//! - **[`tile`]**: Web Mercator tile and pixel addressing
//! - **[`batch`]**: per-feature processing on the rayon pool

pub mod batch;
mod config;
pub mod datum;
mod feature;
mod geodesic;
mod geometry;
pub mod projection;
mod simplify;
pub mod spline;
mod store;
pub mod tile;
mod topology;

// Public API exports
pub use config::Config;
pub use feature::{AttributeValue, Attributes, Feature, FeatureId};
pub use geodesic::{Direct, Ellipsoid, GeodeticSolver, Inverse};
pub use geometry::{CoordinateSystem, Envelope, Geometry, GeometryType, Part, Point, Shape};
pub use projection::{Projection, WebMercator};
pub use simplify::{LineSimplifier, SimplifyStrategy};
pub use spline::{SplineAlpha, SplineSmoother};
pub use store::{ChangeKind, ChangeRecord, CollectionInfo, EditSet, FeatureCollection, FeatureStore};
pub use tile::TileIndex;
pub use topology::TopologyOps;

/// Error types for geometry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeoEditError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{operation} does not support {found} geometries")]
    UnsupportedGeometryType {
        operation: &'static str,
        found: GeometryType,
    },

    #[error("Unsupported coordinate system: {0}")]
    UnsupportedCoordinateSystem(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(FeatureId),
}

pub type Result<T> = std::result::Result<T, GeoEditError>;
