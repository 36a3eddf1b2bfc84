//! Property suites for the gradient forest and stability merging.

mod common;

use std::num::NonZeroUsize;

use basin_core::{
    BruteForceNeighbours, DataSource, DensityForest, DensityOracle, GaussianKde, LabelStats,
    MINIMAL_NOISE, MergeSettings, NeighbourOracle, NeighbourTable, StabilityMerger,
    propagate_labels,
};
use basin_test_support::ci::property_test_profile::ProptestRunProfile;
use common::Points;
use proptest::{prelude::*, test_runner::Config as ProptestConfig};

const SEARCH_SIZE: usize = 12;

fn suite_config() -> ProptestConfig {
    let profile = ProptestRunProfile::load(48, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// Random point cloud with kernel densities and an exact neighbour table.
#[derive(Debug)]
struct Landscape {
    source: Points,
    rho: Vec<f64>,
    neighbours: NeighbourTable,
    nh_size: usize,
}

impl Landscape {
    fn settings(&self) -> MergeSettings {
        MergeSettings {
            nh_size: self.nh_size,
            search_size: SEARCH_SIZE,
            max_passes: 1024,
        }
    }

    fn forest(&self) -> DensityForest {
        let sentinel = self.source.extent().expect("extent");
        DensityForest::build(&self.rho, &self.neighbours, self.nh_size, 1e-8, sentinel)
            .expect("forest builds")
    }

    fn merger(&self) -> StabilityMerger<'_, Points> {
        StabilityMerger::new(&self.source, &self.rho, &self.neighbours, self.settings())
            .expect("merger accepts the landscape")
    }
}

fn landscapes() -> impl Strategy<Value = Landscape> {
    (1_usize..=2, SEARCH_SIZE..48, 2_usize..=6, 0.3_f64..2.0).prop_flat_map(
        |(dimension, items, nh_size, bandwidth)| {
            prop::collection::vec(
                prop::collection::vec(-10.0_f32..10.0, dimension),
                items,
            )
            .prop_map(move |rows| {
                let source = Points::new("random", rows);
                let kde = GaussianKde::new(bandwidth, 5e-5);
                let model = kde.fit(&source).expect("kde fits");
                let rho = kde.score(&model, &source).expect("kde scores");
                let k = NonZeroUsize::new(SEARCH_SIZE).expect("non-zero");
                let neighbours = BruteForceNeighbours
                    .neighbours(&source, k)
                    .expect("neighbours");
                Landscape {
                    source,
                    rho,
                    neighbours,
                    nh_size,
                }
            })
        },
    )
}

proptest! {
    #![proptest_config(suite_config())]

    #[test]
    fn gradient_forest_is_acyclic_and_climbs(landscape in landscapes()) {
        let forest = landscape.forest();
        prop_assert!(!forest.candidates().is_empty());
        prop_assert!(forest.validate(&landscape.rho).is_ok());
        for point in 0..forest.len() {
            let root = forest.root_of(point).expect("acyclic");
            prop_assert!(forest.candidates().contains(&root));
        }
    }

    #[test]
    fn labels_partition_every_point(landscape in landscapes()) {
        let forest = landscape.forest();
        let centers = forest.candidates().to_vec();
        let labels = propagate_labels(&centers, &forest).expect("labels propagate");

        prop_assert_eq!(LabelStats::of(&labels).unassigned, 0);
        for (label, &center) in centers.iter().enumerate() {
            prop_assert_eq!(labels[center], Some(label));
        }
        for (point, label) in labels.iter().enumerate() {
            let root = forest.root_of(point).expect("acyclic");
            prop_assert_eq!(*label, centers.iter().position(|&center| center == root));
        }
    }

    #[test]
    fn merging_keeps_a_valid_forest(landscape in landscapes(), noise in 0.0_f64..3.0) {
        let mut forest = landscape.forest();
        let candidates = forest.candidates().to_vec();
        let outcome = landscape
            .merger()
            .converge(&mut forest, candidates, noise)
            .expect("merging converges");

        prop_assert!(!outcome.centers.is_empty());
        prop_assert!(forest.validate(&landscape.rho).is_ok());
        for (point, &label) in outcome.labels.iter().enumerate() {
            let root = forest.root_of(point).expect("acyclic");
            prop_assert_eq!(outcome.centers[label], root);
        }
    }

    #[test]
    fn larger_noise_demotes_a_superset(
        landscape in landscapes(),
        low in MINIMAL_NOISE..1.5,
        extra in 0.0_f64..1.5,
    ) {
        let forest = landscape.forest();
        let centers = forest.candidates().to_vec();
        let labels = propagate_labels(&centers, &forest).expect("labels propagate");
        let merger = landscape.merger();

        let strict = merger
            .run_pass(&mut forest.clone(), &centers, &labels, low)
            .expect("pass succeeds");
        let loose = merger
            .run_pass(&mut forest.clone(), &centers, &labels, low + extra)
            .expect("pass succeeds");

        prop_assert!(loose.accepted.len() <= strict.accepted.len());
        prop_assert!(loose.accepted.iter().all(|center| strict.accepted.contains(center)));
    }

    #[test]
    fn sweeping_noise_never_adds_clusters(landscape in landscapes()) {
        let mut forest = landscape.forest();
        let merger = landscape.merger();
        let mut centers = forest.candidates().to_vec();
        let mut previous = centers.len();
        for step in 0..8 {
            let noise = f64::from(step) * 0.4;
            centers = merger
                .converge(&mut forest, centers, noise)
                .expect("merging converges")
                .centers;
            prop_assert!(centers.len() <= previous);
            previous = centers.len();
        }
    }

    #[test]
    fn converged_state_is_a_fixed_point(landscape in landscapes(), noise in 0.0_f64..3.0) {
        let mut forest = landscape.forest();
        let merger = landscape.merger();
        let candidates = forest.candidates().to_vec();
        let outcome = merger
            .converge(&mut forest, candidates, noise)
            .expect("merging converges");

        let labels: Vec<Option<usize>> = outcome.labels.iter().copied().map(Some).collect();
        let pass = merger
            .run_pass(&mut forest, &outcome.centers, &labels, noise)
            .expect("pass succeeds");
        prop_assert_eq!(pass.false_positives, 0);
        prop_assert_eq!(&pass.accepted, &outcome.centers);

        let again = merger
            .converge(&mut forest, outcome.centers.clone(), noise)
            .expect("merging converges");
        prop_assert_eq!(again.passes, 1);
        prop_assert_eq!(again.centers, outcome.centers);
    }
}
