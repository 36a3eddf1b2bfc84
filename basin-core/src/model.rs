//! Fitted clustering state and its queries.

use tracing::{info, instrument};

use crate::{
    Result,
    builder::validate_noise,
    datasource::DataSource,
    forest::{DensityForest, MergeOutcome, MergeSettings, StabilityMerger},
    hierarchy::{CoarseGrain, Hierarchy},
    neighbours::NeighbourTable,
    result::{ClusteringResult, NonContiguousClusterIds},
};

/// Centers and labels of one clustering state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterInfo<'a> {
    /// Noise threshold the state was merged at.
    pub noise: f64,
    /// Accepted centers; center `centers[l]` carries label `l`.
    pub centers: &'a [usize],
    /// Label of every point.
    pub labels: &'a [usize],
}

/// Outcome of [`crate::DensityClustering::fit`].
///
/// Owns everything later queries need: densities, neighbours, the gradient
/// forest, the current centers and labels, and the coarse-grained hierarchy
/// once one has been computed. With the `serde` feature the whole model can
/// be persisted and restored without recomputation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FittedModel {
    densities: Vec<f64>,
    neighbours: NeighbourTable,
    forest: DensityForest,
    centers: Vec<usize>,
    labels: Vec<usize>,
    noise: f64,
    settings: MergeSettings,
    bandwidth: Option<f64>,
    hierarchy: Option<Hierarchy>,
}

impl FittedModel {
    pub(crate) fn new(
        densities: Vec<f64>,
        neighbours: NeighbourTable,
        forest: DensityForest,
        centers: Vec<usize>,
        labels: Vec<usize>,
        noise: f64,
        settings: MergeSettings,
    ) -> Self {
        Self {
            densities,
            neighbours,
            forest,
            centers,
            labels,
            noise,
            settings,
            bandwidth: None,
            hierarchy: None,
        }
    }

    pub(crate) fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    /// Returns the log-density of every point.
    #[must_use]
    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    /// Returns the neighbour table the model was fitted with.
    #[must_use]
    pub fn neighbours(&self) -> &NeighbourTable {
        &self.neighbours
    }

    /// Returns the gradient forest, including re-parented centers.
    #[must_use]
    pub fn forest(&self) -> &DensityForest {
        &self.forest
    }

    /// Returns the candidate centers found before any merging.
    #[must_use]
    pub fn candidates(&self) -> &[usize] {
        self.forest.candidates()
    }

    /// Returns the accepted centers.
    #[must_use]
    pub fn centers(&self) -> &[usize] {
        &self.centers
    }

    /// Returns the label of every point.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Returns the number of accepted centers.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.centers.len()
    }

    /// Returns the noise threshold of the current state.
    #[must_use]
    pub fn noise_threshold(&self) -> f64 {
        self.noise
    }

    /// Returns the neighbourhood widths used for merging.
    #[must_use]
    pub fn merge_settings(&self) -> MergeSettings {
        self.settings
    }

    /// Returns the kernel bandwidth, when densities were estimated by
    /// [`crate::DensityClustering::fit`].
    #[must_use]
    pub fn bandwidth(&self) -> Option<f64> {
        self.bandwidth
    }

    /// Returns the hierarchy of the last completed coarse-graining sweep.
    #[must_use]
    pub fn hierarchy(&self) -> Option<&Hierarchy> {
        self.hierarchy.as_ref()
    }

    /// Returns the current state as a [`ClusteringResult`].
    ///
    /// # Errors
    /// Returns [`NonContiguousClusterIds`] if a restored model carries labels
    /// that disagree with its centers.
    pub fn result(&self) -> core::result::Result<ClusteringResult, NonContiguousClusterIds> {
        ClusteringResult::try_from_labels(&self.labels, self.centers.clone())
    }

    /// Returns the centers and labels for `noise`.
    ///
    /// `None` selects the current state. A threshold selects the hierarchy
    /// level closest to it, falling back to the current state when no
    /// hierarchy has been computed.
    #[must_use]
    pub fn cluster_info(&self, noise: Option<f64>) -> ClusterInfo<'_> {
        let level = noise.and_then(|noise| {
            self.hierarchy
                .as_ref()
                .and_then(|hierarchy| hierarchy.level_for_noise(noise))
        });
        match level {
            Some(level) => ClusterInfo {
                noise: level.noise,
                centers: &level.centers,
                labels: &level.labels,
            },
            None => ClusterInfo {
                noise: self.noise,
                centers: &self.centers,
                labels: &self.labels,
            },
        }
    }

    /// Re-runs stability merging at `noise`, starting from the current
    /// centers.
    ///
    /// Merging only ever removes centers, so a lower threshold than the
    /// current one leaves the state unchanged. A failed refinement leaves
    /// the model as it was.
    ///
    /// # Errors
    /// Returns [`crate::BasinError::InvalidConfiguration`] for negative or
    /// non-finite thresholds, [`crate::BasinError::DensityLengthMismatch`]
    /// when `source` is not the fitted source, and any merging error.
    pub fn refine<D: DataSource + Sync + ?Sized>(
        &mut self,
        source: &D,
        noise: f64,
    ) -> Result<MergeOutcome> {
        validate_noise(noise)?;
        let merger = StabilityMerger::new(source, &self.densities, &self.neighbours, self.settings)?;
        let outcome = merger.converge(&mut self.forest, self.centers.clone(), noise)?;
        self.centers.clone_from(&outcome.centers);
        self.labels.clone_from(&outcome.labels);
        self.noise = noise;
        Ok(outcome)
    }

    /// Sweeps `thresholds` in order and records the resulting hierarchy.
    ///
    /// # Errors
    /// Returns the first error raised by a level, or
    /// [`crate::ConfigError::EmptyNoiseSchedule`] when `thresholds` is empty.
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
    /// let line = Line((0..30).map(|i| [i as f32 * 0.1]).collect());
    /// let mut model = ClusteringBuilder::new()
    ///     .with_neighbourhood(NeighbourhoodSize::Fixed(4))
    ///     .with_noise_threshold(0.0)
    ///     .with_bandwidth(Bandwidth::Manual(0.5))
    ///     .build()?
    ///     .fit(&line)?;
    /// let hierarchy = model.coarse_grain(&line, [0.0, 0.5, 1.0])?;
    /// assert_eq!(hierarchy.levels().len(), 3);
    /// assert_eq!(hierarchy.noise_threshold(), Some(1.0));
    /// # Ok::<(), basin_core::BasinError>(())
    /// ```
    #[instrument(name = "core.coarse_grain", err, skip(self, source, thresholds))]
    pub fn coarse_grain<D, T>(&mut self, source: &D, thresholds: T) -> Result<&Hierarchy>
    where
        D: DataSource + Sync + ?Sized,
        T: IntoIterator<Item = f64>,
    {
        let hierarchy = self.coarse_grain_iter(source, thresholds).finish()?;
        info!(
            levels = hierarchy.levels().len(),
            max_noise = hierarchy.max_noise(),
            "coarse graining finished"
        );
        Ok(hierarchy)
    }

    /// Returns a lazy sweep over `thresholds`.
    ///
    /// Each call to `next` merges at one more threshold and yields its level.
    /// Call [`CoarseGrain::finish`] to record the hierarchy on the model.
    pub fn coarse_grain_iter<'m, 's, D, T>(
        &'m mut self,
        source: &'s D,
        thresholds: T,
    ) -> CoarseGrain<'m, 's, D, T::IntoIter>
    where
        D: DataSource + Sync + ?Sized,
        T: IntoIterator<Item = f64>,
    {
        CoarseGrain::new(self, source, thresholds.into_iter())
    }

    pub(crate) fn install_hierarchy(&mut self, hierarchy: Hierarchy) -> &Hierarchy {
        self.hierarchy.insert(hierarchy)
    }
}
