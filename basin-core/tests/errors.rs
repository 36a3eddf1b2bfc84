//! Error reporting of the public clustering entry points.

mod common;

use std::num::NonZeroUsize;

use basin_core::{
    Bandwidth, BasinError, BasinErrorCode, BruteForceNeighbours, ClusteringBuilder,
    ConfigErrorCode, DensityClustering, NeighbourOracle, NeighbourTable, NeighbourhoodSize,
};
use common::Points;
use rstest::{fixture, rstest};

#[fixture]
fn line() -> Points {
    Points::line(&[0.0, 0.4, 0.5, 0.6, 1.0, 5.0, 5.4, 5.5, 5.6, 6.0])
}

#[fixture]
fn clustering() -> DensityClustering {
    ClusteringBuilder::new()
        .with_neighbourhood(NeighbourhoodSize::Fixed(3))
        .with_noise_threshold(0.0)
        .with_bandwidth(Bandwidth::Manual(0.3))
        .build()
        .expect("configuration is valid")
}

fn table(source: &Points, k: usize) -> NeighbourTable {
    BruteForceNeighbours
        .neighbours(source, NonZeroUsize::new(k).expect("non-zero"))
        .expect("neighbours")
}

fn peaks() -> Vec<f64> {
    vec![-3.0, -2.0, -1.0, -2.0, -3.0, -3.0, -2.0, -0.5, -2.0, -3.0]
}

#[rstest]
fn precomputed_inputs_cluster_around_their_peaks(clustering: DensityClustering, line: Points) {
    let model = clustering
        .fit_precomputed(&line, peaks(), table(&line, 4))
        .expect("fit succeeds");
    assert_eq!(model.candidates(), [2, 7]);
    assert_eq!(model.centers(), [2, 7]);
    assert_eq!(model.labels(), [0, 0, 0, 0, 0, 1, 1, 1, 1, 1]);
    assert_eq!(model.bandwidth(), None);
}

#[rstest]
fn short_density_vectors_are_rejected(clustering: DensityClustering, line: Points) {
    let mut densities = peaks();
    densities.pop();
    let err = clustering
        .fit_precomputed(&line, densities, table(&line, 4))
        .expect_err("lengths differ");
    assert_eq!(
        err,
        BasinError::DensityLengthMismatch {
            densities: 9,
            items: 10
        }
    );
}

#[rstest]
fn non_finite_densities_are_rejected(clustering: DensityClustering, line: Points) {
    let mut densities = peaks();
    densities[4] = f64::NEG_INFINITY;
    let err = clustering
        .fit_precomputed(&line, densities, table(&line, 4))
        .expect_err("density is not finite");
    assert!(matches!(err, BasinError::NonFiniteDensity { index: 4, .. }));
    assert_eq!(err.code(), BasinErrorCode::NonFiniteDensity);
}

#[rstest]
fn narrow_tables_are_rejected(clustering: DensityClustering, line: Points) {
    let err = clustering
        .fit_precomputed(&line, peaks(), table(&line, 2))
        .expect_err("table narrower than nh_size");
    assert_eq!(err, BasinError::NeighbourhoodExceedsTable { nh_size: 3, k: 2 });
}

#[test]
fn sources_smaller_than_the_neighbourhood_are_rejected() {
    let source = Points::line(&[0.0, 1.0, 2.0]);
    let err = ClusteringBuilder::new()
        .with_neighbourhood(NeighbourhoodSize::Fixed(5))
        .build()
        .expect("configuration is valid")
        .fit(&source)
        .expect_err("too few points");
    assert!(matches!(
        err,
        BasinError::InsufficientItems {
            items: 3,
            nh_size: 5,
            ..
        }
    ));
    assert_eq!(err.code().as_str(), "BASIN_INSUFFICIENT_ITEMS");
}

#[rstest]
#[case(-0.5)]
#[case(f64::NAN)]
fn refine_rejects_invalid_noise(clustering: DensityClustering, line: Points, #[case] noise: f64) {
    let mut model = clustering.fit(&line).expect("fit succeeds");
    let before = model.clone();
    let err = model.refine(&line, noise).expect_err("noise is invalid");
    assert_eq!(
        err.config_code(),
        Some(ConfigErrorCode::InvalidNoiseThreshold)
    );
    assert_eq!(model, before);
}

#[rstest]
fn empty_noise_schedule_is_rejected(clustering: DensityClustering, line: Points) {
    let mut model = clustering.fit(&line).expect("fit succeeds");
    let err = model
        .coarse_grain(&line, std::iter::empty())
        .expect_err("no thresholds");
    assert_eq!(err.config_code(), Some(ConfigErrorCode::EmptyNoiseSchedule));
    assert!(model.hierarchy().is_none());
}

#[rstest]
fn refine_rejects_a_different_source(clustering: DensityClustering, line: Points) {
    let mut model = clustering.fit(&line).expect("fit succeeds");
    let other = Points::line(&[0.0, 1.0, 2.0]);
    let err = model.refine(&other, 1.0).expect_err("source does not match");
    assert_eq!(err.code(), BasinErrorCode::DensityLengthMismatch);
}

#[rstest]
fn failed_refine_leaves_the_model_usable(line: Points) {
    let mut model = ClusteringBuilder::new()
        .with_neighbourhood(NeighbourhoodSize::Fixed(3))
        .with_noise_threshold(0.0)
        .with_merge(false)
        .with_max_merge_passes(1)
        .build()
        .expect("configuration is valid")
        .fit_precomputed(&line, peaks(), table(&line, 10))
        .expect("fit succeeds");
    assert_eq!(model.centers(), [2, 7]);
    let before = model.clone();

    let err = model
        .refine(&line, 5.0)
        .expect_err("one pass cannot absorb the lower peak and confirm the result");
    assert_eq!(
        err,
        BasinError::ConvergenceFailed {
            noise: 5.0,
            passes: 1
        }
    );
    assert_eq!(model, before);
    model
        .forest()
        .validate(model.densities())
        .expect("forest stays consistent");
    assert_eq!(model.forest().parent(2), None);

    let again = model.refine(&line, 5.0).expect_err("the pass cap still applies");
    assert_eq!(again.code(), BasinErrorCode::ConvergenceFailed);

    let err = model
        .coarse_grain(&line, [0.0, 5.0])
        .expect_err("merging at zero noise already needs a second pass");
    assert_eq!(err.code(), BasinErrorCode::ConvergenceFailed);
    assert!(model.hierarchy().is_none());
    assert_eq!(model.centers(), [2, 7]);
    model
        .forest()
        .validate(model.densities())
        .expect("forest stays consistent");
}
