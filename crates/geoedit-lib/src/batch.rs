//! Per-feature processing of whole selections
//!
//! Each helper returns one `Result` per input feature, in input order, so a
//! single bad geometry does not abort the rest of the batch.

use crate::{Config, CoordinateSystem, Feature, Result, SimplifyStrategy, datum};
use rayon::prelude::*;

fn run<F>(features: &[Feature], parallel: bool, f: F) -> Vec<Result<Feature>>
where
    F: Fn(&Feature) -> Result<Feature> + Sync + Send,
{
    let results: Vec<Result<Feature>> = if parallel {
        features.par_iter().map(&f).collect()
    } else {
        features.iter().map(&f).collect()
    };
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        tracing::warn!("{} of {} features failed", failed, features.len());
    }
    results
}

/// Simplify every feature with one strategy
pub fn simplify_features(
    features: &[Feature],
    strategy: &SimplifyStrategy,
    config: &Config,
) -> Vec<Result<Feature>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("batch::simplify_features");

    let simplifier = config.simplifier();
    run(features, config.parallel, |feature| {
        simplifier.simplify_feature(feature, strategy)
    })
}

/// Smooth every feature with the configured spline settings
///
/// Invalid settings fail every feature.
pub fn smooth_features(features: &[Feature], config: &Config) -> Vec<Result<Feature>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("batch::smooth_features");

    match config.smoother() {
        Ok(smoother) => run(features, config.parallel, |feature| {
            smoother.smooth_feature(feature)
        }),
        Err(e) => features.iter().map(|_| Err(e.clone())).collect(),
    }
}

/// Convert every feature's geometry to `to`
pub fn convert_features(
    features: &[Feature],
    to: CoordinateSystem,
    config: &Config,
) -> Vec<Result<Feature>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("batch::convert_features");

    run(features, config.parallel, |feature| {
        let geometry = datum::convert_geometry(feature.geometry(), to)?;
        Ok(feature.replace_geometry(geometry))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attributes, FeatureId, GeoEditError, Geometry, Point};

    fn track(id: u64, offset: f64) -> Feature {
        let part = (0..20)
            .map(|i| Point::new(116.0 + offset + i as f64 * 0.001, 39.9))
            .collect();
        Feature::with_id(
            FeatureId(id),
            Geometry::polyline(vec![part], CoordinateSystem::Wgs84).unwrap(),
            Attributes::new(),
        )
    }

    fn features() -> Vec<Feature> {
        let mut features: Vec<Feature> = (0..8).map(|i| track(i, i as f64 * 0.1)).collect();
        features.insert(
            3,
            Feature::with_id(
                FeatureId(100),
                Geometry::point(Point::new(116.0, 39.9), CoordinateSystem::Wgs84),
                Attributes::new(),
            ),
        );
        features
    }

    #[test]
    fn test_simplify_preserves_order_and_reports_failures() {
        let input = features();
        let strategy = SimplifyStrategy::DouglasPeucker { max_deviation: 1.0 };
        for parallel in [true, false] {
            let config = Config {
                parallel,
                ..Config::default()
            };
            let results = simplify_features(&input, &strategy, &config);
            assert_eq!(results.len(), input.len());
            for (result, feature) in results.iter().zip(&input) {
                match result {
                    Ok(simplified) => {
                        assert_eq!(simplified.id(), feature.id());
                        assert_eq!(simplified.geometry().point_count(), 2);
                    }
                    Err(e) => {
                        assert_eq!(feature.id(), Some(FeatureId(100)));
                        assert!(matches!(e, GeoEditError::UnsupportedGeometryType { .. }));
                    }
                }
            }
        }
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let input: Vec<Feature> = (0..16).map(|i| track(i, i as f64 * 0.01)).collect();
        let parallel = convert_features(&input, CoordinateSystem::Gcj02, &Config::default());
        let sequential = convert_features(
            &input,
            CoordinateSystem::Gcj02,
            &Config {
                parallel: false,
                ..Config::default()
            },
        );
        for (a, b) in parallel.iter().zip(&sequential) {
            assert_eq!(a.as_ref().unwrap(), b.as_ref().unwrap());
        }
    }

    #[test]
    fn test_smooth_with_invalid_settings_fails_every_feature() {
        let input: Vec<Feature> = (0..3).map(|i| track(i, 0.0)).collect();
        let config = Config {
            points_per_segment: 0,
            ..Config::default()
        };
        let results = smooth_features(&input, &config);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| matches!(r, Err(GeoEditError::InvalidArgument(_)))));
    }

    #[test]
    fn test_smooth_features() {
        let input: Vec<Feature> = (0..3).map(|i| track(i, 0.0)).collect();
        let config = Config {
            points_per_segment: 4,
            ..Config::default()
        };
        let results = smooth_features(&input, &config);
        let smoothed = results[0].as_ref().unwrap();
        assert_eq!(smoothed.geometry().point_count(), 19 * 3 + 1);
    }
}
