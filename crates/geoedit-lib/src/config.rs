//! Crate-wide configuration

use crate::{
    Ellipsoid, GeodeticSolver, LineSimplifier, Result, SplineAlpha, SplineSmoother, TopologyOps,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Settings shared by the batch helpers and convenience constructors
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Reference ellipsoid for geodetic distances (default: WGS84)
    pub ellipsoid: Ellipsoid,
    /// Samples per smoothed segment, both ends included (default: 8)
    pub points_per_segment: usize,
    /// Catmull-Rom knot parametrization (default: centripetal)
    pub alpha: SplineAlpha,
    /// Process batches on the rayon thread pool (default: true)
    pub parallel: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Default for Config {
    fn default() -> Self {
        Self {
            ellipsoid: Ellipsoid::WGS84,
            points_per_segment: 8,
            alpha: SplineAlpha::Centripetal,
            parallel: true,
        }
    }
}

impl Config {
    pub fn solver(&self) -> GeodeticSolver {
        GeodeticSolver::new(self.ellipsoid)
    }

    pub fn simplifier(&self) -> LineSimplifier {
        LineSimplifier::new(self.solver())
    }

    /// Fails when `points_per_segment` is below 2
    pub fn smoother(&self) -> Result<SplineSmoother> {
        SplineSmoother::new(self.points_per_segment, self.alpha)
    }

    pub fn topology(&self) -> TopologyOps {
        TopologyOps::new(self.solver())
    }
}
