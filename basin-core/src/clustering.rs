//! Density clustering entry point.
//!
//! Provides [`DensityClustering`], which chains the neighbour oracle, the
//! density oracle, the gradient forest, label propagation and stability
//! merging into a [`FittedModel`].

use std::{num::NonZeroUsize, sync::Arc, time::Instant};

use tracing::{info, instrument, warn};

use crate::{
    Result,
    builder::NeighbourhoodSize,
    datasource::{DataSource, Subset},
    density::{Bandwidth, BandwidthSearch, DensityOracle, GaussianKde, holdout_split, select_bandwidth},
    error::BasinError,
    forest::{DensityForest, MINIMAL_NOISE, MergeSettings, StabilityMerger, propagate_labels, require_complete},
    model::FittedModel,
    neighbours::{BruteForceNeighbours, NeighbourOracle, NeighbourTable},
};

/// Configured density-peak clustering.
///
/// Built by [`crate::ClusteringBuilder`]; immutable once built and reusable
/// across sources.
///
/// # Examples
/// ```
/// use basin_core::{Bandwidth, ClusteringBuilder, DataSource, DataSourceError, NeighbourhoodSize};
///
/// struct Line(Vec<[f32; 1]>);
/// impl DataSource for Line {
///     fn len(&self) -> usize { self.0.len() }
///     fn name(&self) -> &str { "line" }
///     fn dimension(&self) -> usize { 1 }
///     fn point(&self, index: usize) -> Result<&[f32], DataSourceError> {
///         self.0.get(index).map(|row| row.as_slice()).ok_or(DataSourceError::OutOfBounds { index })
///     }
/// }
///
/// let mut points: Vec<[f32; 1]> = (0..21).map(|i| [i as f32 * 0.05]).collect();
/// points.extend((0..21).map(|i| [50.0 + i as f32 * 0.05]));
///
/// let model = ClusteringBuilder::new()
///     .with_neighbourhood(NeighbourhoodSize::Fixed(5))
///     .with_bandwidth(Bandwidth::Manual(0.2))
///     .build()?
///     .fit(&Line(points))?;
/// assert_eq!(model.cluster_count(), 2);
/// assert_eq!(model.labels()[0], model.labels()[20]);
/// assert_ne!(model.labels()[0], model.labels()[21]);
/// # Ok::<(), basin_core::BasinError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DensityClustering {
    pub(crate) neighbourhood: NeighbourhoodSize,
    pub(crate) noise_threshold: f64,
    pub(crate) search_size: usize,
    pub(crate) merge: bool,
    pub(crate) tie_tolerance: f64,
    pub(crate) max_merge_passes: usize,
    pub(crate) bandwidth: Bandwidth,
    pub(crate) test_ratio: f64,
    pub(crate) rtol: f64,
    pub(crate) xtol: f64,
    pub(crate) random_seed: u64,
}

impl DensityClustering {
    /// Returns the configured neighbourhood sizing policy.
    #[must_use]
    pub fn neighbourhood(&self) -> NeighbourhoodSize {
        self.neighbourhood
    }

    /// Returns the noise threshold of the final merge.
    #[must_use]
    pub fn noise_threshold(&self) -> f64 {
        self.noise_threshold
    }

    /// Returns the configured merge search size.
    #[must_use]
    pub fn search_size(&self) -> usize {
        self.search_size
    }

    /// Returns whether the minimal zero-noise merge runs.
    #[must_use]
    pub fn merge(&self) -> bool {
        self.merge
    }

    /// Returns the density tie tolerance.
    #[must_use]
    pub fn tie_tolerance(&self) -> f64 {
        self.tie_tolerance
    }

    /// Returns the merge pass cap.
    #[must_use]
    pub fn max_merge_passes(&self) -> usize {
        self.max_merge_passes
    }

    /// Returns the bandwidth policy.
    #[must_use]
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// Returns the seed of the bandwidth holdout split.
    #[must_use]
    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    /// Estimates densities and neighbours for `source`, then clusters it.
    ///
    /// Neighbours come from [`BruteForceNeighbours`] and densities from a
    /// [`GaussianKde`] whose bandwidth is either configured or selected on a
    /// seeded holdout split.
    ///
    /// # Errors
    /// Returns [`BasinError::EmptySource`] for empty sources,
    /// [`BasinError::InsufficientItems`] when the source is smaller than the
    /// neighbourhood, oracle failures as [`BasinError::Neighbours`] or
    /// [`BasinError::Density`], and every error of
    /// [`Self::fit_precomputed`].
    #[instrument(
        name = "core.fit",
        err,
        skip(self, source),
        fields(data_source = %source.name(), items = source.len()),
    )]
    pub fn fit<D: DataSource + Sync + ?Sized>(&self, source: &D) -> Result<FittedModel> {
        let started = Instant::now();
        let nh_size = self.check_source(source)?;
        let search_size = self.search_size.max(nh_size);
        let k = NonZeroUsize::new(search_size.min(source.len())).ok_or_else(|| {
            BasinError::EmptySource {
                data_source: Arc::from(source.name()),
            }
        })?;

        let neighbours = BruteForceNeighbours.neighbours(source, k)?;
        let bandwidth = self.resolve_bandwidth(source)?;
        let kde = GaussianKde::new(bandwidth, self.rtol);
        let fitted = kde.fit(source)?;
        let densities = kde.score(&fitted, source)?;
        info!(bandwidth, "densities estimated");

        let model = self
            .fit_precomputed(source, densities, neighbours)?
            .with_bandwidth(bandwidth);
        info!(
            clusters = model.cluster_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "clustering finished"
        );
        Ok(model)
    }

    /// Clusters `source` from densities and neighbours computed elsewhere.
    ///
    /// `densities[i]` is the log-density of point `i`; `neighbours` must
    /// describe the same points and hold at least `nh_size` columns.
    ///
    /// # Errors
    /// Returns [`BasinError::DensityLengthMismatch`] or
    /// [`BasinError::NonFiniteDensity`] for malformed densities,
    /// [`BasinError::NeighbourhoodExceedsTable`] for narrow tables,
    /// [`BasinError::EmptyClusterSet`] when every density is tied, and any
    /// error raised while merging.
    #[instrument(
        name = "core.fit_precomputed",
        err,
        skip(self, source, densities, neighbours),
        fields(data_source = %source.name(), items = source.len(), k = neighbours.k()),
    )]
    pub fn fit_precomputed<D: DataSource + Sync + ?Sized>(
        &self,
        source: &D,
        densities: Vec<f64>,
        neighbours: NeighbourTable,
    ) -> Result<FittedModel> {
        let nh_size = self.check_source(source)?;
        for items in [source.len(), neighbours.len()] {
            if densities.len() != items {
                return Err(BasinError::DensityLengthMismatch {
                    densities: densities.len(),
                    items,
                });
            }
        }
        if let Some((index, &value)) = densities
            .iter()
            .enumerate()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(BasinError::NonFiniteDensity { index, value });
        }
        let (low, high) = densities
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), &rho| {
                (low.min(rho), high.max(rho))
            });
        if high - low <= self.tie_tolerance {
            warn!(low, high, "density field is flat, no peak to cluster around");
            return Err(BasinError::EmptyClusterSet);
        }

        let sentinel = source
            .extent()
            .map_err(|error| BasinError::data_source(source.name(), error))?;
        let mut forest =
            DensityForest::build(&densities, &neighbours, nh_size, self.tie_tolerance, sentinel)?;
        if forest.candidates().is_empty() {
            return Err(BasinError::EmptyClusterSet);
        }

        let settings = MergeSettings {
            nh_size,
            search_size: self.search_size.max(nh_size),
            max_passes: self.max_merge_passes,
        };
        let merger = StabilityMerger::new(source, &densities, &neighbours, settings)?;
        let mut centers = forest.candidates().to_vec();
        let mut labels = require_complete(propagate_labels(&centers, &forest)?)?;
        let mut noise = 0.0;
        if self.merge {
            let outcome = merger.converge(&mut forest, centers, 0.0)?;
            centers = outcome.centers;
            labels = outcome.labels;
        }
        if self.noise_threshold >= MINIMAL_NOISE {
            let outcome = merger.converge(&mut forest, centers, self.noise_threshold)?;
            centers = outcome.centers;
            labels = outcome.labels;
            noise = self.noise_threshold;
        }

        Ok(FittedModel::new(
            densities, neighbours, forest, centers, labels, noise, settings,
        ))
    }

    fn check_source<D: DataSource + ?Sized>(&self, source: &D) -> Result<usize> {
        let items = source.len();
        if items == 0 {
            warn!(
                data_source = source.name(),
                "data source is empty, returning error"
            );
            return Err(BasinError::EmptySource {
                data_source: Arc::from(source.name()),
            });
        }
        let nh_size = self.neighbourhood.resolve(items);
        if items < nh_size {
            return Err(BasinError::InsufficientItems {
                data_source: Arc::from(source.name()),
                items,
                nh_size,
            });
        }
        Ok(nh_size)
    }

    fn resolve_bandwidth<D: DataSource + Sync + ?Sized>(&self, source: &D) -> Result<f64> {
        match self.bandwidth {
            Bandwidth::Manual(bandwidth) => Ok(bandwidth),
            Bandwidth::Auto => {
                let (train, test) = holdout_split(source.len(), self.test_ratio, self.random_seed)?;
                let search = BandwidthSearch {
                    rtol: self.rtol,
                    xtol: self.xtol,
                };
                Ok(select_bandwidth(
                    &Subset::new(source, train),
                    &Subset::new(source, test),
                    search,
                )?)
            }
        }
    }
}
