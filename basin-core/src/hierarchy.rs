//! Coarse-grained cluster hierarchy across increasing noise thresholds.
//!
//! Each level snapshots the accepted centers and labels after stability
//! merging converged at one threshold. Levels are produced in the order the
//! thresholds are supplied, each starting from the state left by the
//! previous one, so a sweep cannot be resumed from an arbitrary level.

use tracing::debug;

use crate::{
    Result,
    datasource::DataSource,
    error::ConfigError,
    model::FittedModel,
};

/// Snapshot of the clustering at one noise threshold.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HierarchyLevel {
    /// Noise threshold the level was merged at.
    pub noise: f64,
    /// Accepted centers; center `centers[l]` carries label `l`.
    pub centers: Vec<usize>,
    /// Label of every point.
    pub labels: Vec<usize>,
}

impl HierarchyLevel {
    /// Returns the number of clusters at this level.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.centers.len()
    }
}

/// Completed coarse-graining sweep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hierarchy {
    levels: Vec<HierarchyLevel>,
    max_noise: f64,
}

impl Hierarchy {
    /// Returns the levels in sweep order.
    #[must_use]
    pub fn levels(&self) -> &[HierarchyLevel] {
        &self.levels
    }

    /// Returns the threshold at which the cluster count last changed.
    #[must_use]
    pub fn max_noise(&self) -> f64 {
        self.max_noise
    }

    /// Returns the threshold of the final level.
    #[must_use]
    pub fn noise_threshold(&self) -> Option<f64> {
        self.levels.last().map(|level| level.noise)
    }

    /// Returns the thresholds of every level in sweep order.
    #[must_use]
    pub fn noise_range(&self) -> Vec<f64> {
        self.levels.iter().map(|level| level.noise).collect()
    }

    /// Returns the level whose threshold is closest to `noise`.
    ///
    /// Equally distant levels resolve to the earliest one.
    #[must_use]
    pub fn level_for_noise(&self, noise: f64) -> Option<&HierarchyLevel> {
        self.levels.iter().reduce(|best, level| {
            if (level.noise - noise).abs() < (best.noise - noise).abs() {
                level
            } else {
                best
            }
        })
    }
}

/// Lazy coarse-graining sweep over a [`FittedModel`].
///
/// Yields one [`HierarchyLevel`] per threshold. Stops after the first error.
/// [`CoarseGrain::finish`] drains the remaining thresholds and stores the
/// completed [`Hierarchy`] on the model.
#[derive(Debug)]
pub struct CoarseGrain<'m, 's, D: ?Sized, I> {
    model: &'m mut FittedModel,
    source: &'s D,
    thresholds: I,
    levels: Vec<HierarchyLevel>,
    max_noise: f64,
    clusters: usize,
    failed: bool,
}

impl<'m, 's, D, I> CoarseGrain<'m, 's, D, I>
where
    D: DataSource + Sync + ?Sized,
    I: Iterator<Item = f64>,
{
    pub(crate) fn new(model: &'m mut FittedModel, source: &'s D, thresholds: I) -> Self {
        Self {
            model,
            source,
            thresholds,
            levels: Vec::new(),
            max_noise: 0.0,
            clusters: 0,
            failed: false,
        }
    }

    /// Runs the remaining thresholds and records the hierarchy on the model.
    ///
    /// # Errors
    /// Returns the first error raised by a level, or
    /// [`ConfigError::EmptyNoiseSchedule`] when no threshold was supplied.
    pub fn finish(mut self) -> Result<&'m Hierarchy> {
        while let Some(level) = self.next() {
            level?;
        }
        if self.levels.is_empty() {
            return Err(ConfigError::EmptyNoiseSchedule.into());
        }
        let hierarchy = Hierarchy {
            levels: self.levels,
            max_noise: self.max_noise,
        };
        let model = self.model;
        Ok(model.install_hierarchy(hierarchy))
    }
}

impl<D, I> Iterator for CoarseGrain<'_, '_, D, I>
where
    D: DataSource + Sync + ?Sized,
    I: Iterator<Item = f64>,
{
    type Item = Result<HierarchyLevel>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let noise = self.thresholds.next()?;
        if let Err(error) = self.model.refine(self.source, noise) {
            self.failed = true;
            return Some(Err(error));
        }

        let level = HierarchyLevel {
            noise,
            centers: self.model.centers().to_vec(),
            labels: self.model.labels().to_vec(),
        };
        if level.cluster_count() != self.clusters {
            self.clusters = level.cluster_count();
            self.max_noise = noise;
        }
        debug!(noise, clusters = level.cluster_count(), "hierarchy level recorded");
        self.levels.push(level.clone());
        Some(Ok(level))
    }
}
