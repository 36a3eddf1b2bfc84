//! Tracing spans and events emitted by the clustering pipeline.

mod common;

use basin_core::{Bandwidth, BasinError, ClusteringBuilder, NeighbourhoodSize};
use basin_test_support::tracing::RecordingLayer;
use common::Points;
use rstest::{fixture, rstest};
use tracing::Level;

#[fixture]
fn two_groups() -> Points {
    let mut values: Vec<f32> = (0..21).map(|i| i as f32 * 0.05).collect();
    values.extend((0..21).map(|i| 40.0 + i as f32 * 0.05));
    Points::line(&values)
}

#[rstest]
fn fit_records_every_stage(two_groups: Points) {
    let (layer, guard) = RecordingLayer::install();
    let model = ClusteringBuilder::new()
        .with_neighbourhood(NeighbourhoodSize::Fixed(5))
        .build()
        .expect("configuration is valid")
        .fit(&two_groups)
        .expect("fit succeeds");
    drop(guard);

    for name in [
        "core.fit",
        "core.neighbours",
        "core.select_bandwidth",
        "core.fit_precomputed",
        "core.gradient_forest",
        "core.merge",
    ] {
        assert!(layer.span(name).is_some(), "missing span {name}");
    }

    let fit = layer.span("core.fit").expect("fit span");
    assert_eq!(fit.field("data_source"), Some("line"));
    assert_eq!(fit.field("items"), Some("42"));

    let forest = layer.span("core.gradient_forest").expect("forest span");
    assert_eq!(
        forest.field("candidates"),
        Some(model.candidates().len().to_string().as_str())
    );

    let merge = layer.span("core.merge").expect("merge span");
    assert!(merge.field("passes").is_some());
    assert!(merge.field("clusters").is_some());

    let finished = layer.events_with_message("clustering finished");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].level, Level::INFO);
    assert_eq!(
        finished[0].field("clusters"),
        Some(model.cluster_count().to_string().as_str())
    );
    assert!(finished[0].field("elapsed_ms").is_some());
}

#[rstest]
fn manual_bandwidth_skips_selection(two_groups: Points) {
    let (layer, guard) = RecordingLayer::install();
    ClusteringBuilder::new()
        .with_neighbourhood(NeighbourhoodSize::Fixed(5))
        .with_bandwidth(Bandwidth::Manual(0.2))
        .build()
        .expect("configuration is valid")
        .fit(&two_groups)
        .expect("fit succeeds");
    drop(guard);

    assert!(layer.span("core.select_bandwidth").is_none());
    let estimated = layer.events_with_message("densities estimated");
    assert_eq!(estimated[0].field("bandwidth"), Some("0.2"));
}

#[rstest]
fn coarse_graining_is_spanned(two_groups: Points) {
    let mut model = ClusteringBuilder::new()
        .with_neighbourhood(NeighbourhoodSize::Fixed(5))
        .with_noise_threshold(0.0)
        .with_bandwidth(Bandwidth::Manual(0.2))
        .build()
        .expect("configuration is valid")
        .fit(&two_groups)
        .expect("fit succeeds");

    let (layer, guard) = RecordingLayer::install();
    model
        .coarse_grain(&two_groups, [0.0, 0.5])
        .expect("coarse graining succeeds");
    drop(guard);

    assert!(layer.span("core.coarse_grain").is_some());
    let finished = layer.events_with_message("coarse graining finished");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].field("levels"), Some("2"));
}

#[test]
fn flat_density_field_is_warned_about() {
    let source = Points::new("flat", vec![vec![1.0]; 6]);
    let (layer, guard) = RecordingLayer::install();
    let err = ClusteringBuilder::new()
        .with_neighbourhood(NeighbourhoodSize::Fixed(3))
        .build()
        .expect("configuration is valid")
        .fit(&source)
        .expect_err("identical points have no peak");
    drop(guard);

    assert_eq!(err, BasinError::EmptyClusterSet);
    let warnings: Vec<_> = layer
        .events()
        .into_iter()
        .filter(|event| event.level == Level::WARN)
        .collect();
    assert_eq!(warnings.len(), 1);
    let reported = layer
        .events()
        .into_iter()
        .filter(|event| event.level == Level::ERROR)
        .count();
    assert!(reported >= 1, "instrumented stages report the error");
}

#[test]
fn empty_source_is_warned_about() {
    let source = Points::new("nothing", Vec::new());
    let (layer, guard) = RecordingLayer::install();
    let err = ClusteringBuilder::new()
        .build()
        .expect("defaults are valid")
        .fit(&source)
        .expect_err("empty sources are rejected");
    drop(guard);

    assert!(matches!(err, BasinError::EmptySource { .. }));
    let warnings = layer.events_with_message("data source is empty, returning error");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field("data_source"), Some("nothing"));
}
