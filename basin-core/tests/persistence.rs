//! Persisting a fitted model and resuming queries from the snapshot.

mod common;

use basin_core::{Bandwidth, ClusteringBuilder, FittedModel, NeighbourhoodSize};
use basin_test_support::blobs::planar_blobs;
use common::Points;
use rstest::{fixture, rstest};

#[fixture]
fn source() -> Points {
    Points::from_blobs(&planar_blobs(&[[0.0, 0.0], [12.0, 0.0]], 1.0, 60, 9))
}

fn fit(source: &Points) -> FittedModel {
    ClusteringBuilder::new()
        .with_neighbourhood(NeighbourhoodSize::Fixed(6))
        .with_noise_threshold(0.0)
        .with_bandwidth(Bandwidth::Manual(1.0))
        .build()
        .expect("configuration is valid")
        .fit(source)
        .expect("fit succeeds")
}

#[rstest]
fn restored_model_answers_queries_without_refitting(source: Points) {
    let mut model = fit(&source);
    model
        .coarse_grain(&source, [0.0, 1.0, 4.0])
        .expect("coarse graining succeeds");

    let snapshot = serde_json::to_string(&model).expect("model serialises");
    let restored: FittedModel = serde_json::from_str(&snapshot).expect("model deserialises");

    assert_eq!(restored, model);
    assert_eq!(restored.result(), model.result());
    assert_eq!(restored.cluster_info(Some(1.1)), model.cluster_info(Some(1.1)));
    assert_eq!(
        restored.hierarchy().map(|hierarchy| hierarchy.noise_range()),
        Some(vec![0.0, 1.0, 4.0])
    );
}

#[rstest]
fn restored_model_can_be_refined(source: Points) {
    let model = fit(&source);
    let snapshot = serde_json::to_vec(&model).expect("model serialises");
    let mut restored: FittedModel = serde_json::from_slice(&snapshot).expect("model deserialises");
    let mut original = model;

    let resumed = restored.refine(&source, 2.0).expect("refine succeeds");
    let direct = original.refine(&source, 2.0).expect("refine succeeds");
    assert_eq!(resumed, direct);
    assert_eq!(restored.noise_threshold(), 2.0);
}
