//! Stability merging: demotes candidate centers that are density-reachable
//! from a higher center under a noise threshold.

use std::collections::HashSet;

#[cfg(feature = "cpu")]
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use super::{DensityForest, labels::require_complete, propagate_labels};
use crate::{
    datasource::DataSource,
    error::{BasinError, Result},
    neighbours::NeighbourTable,
};

/// Noise thresholds below this value skip the gated breadth-first expansion
/// and compare against the plain `search_size` neighbourhood.
pub const MINIMAL_NOISE: f64 = 1e-3;

/// Neighbourhood widths and the pass cap used while merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeSettings {
    /// Width of the seed neighbourhood, self included.
    pub nh_size: usize,
    /// Width of each expansion step, self included.
    pub search_size: usize,
    /// Passes allowed before merging is declared non-convergent.
    pub max_passes: usize,
}

/// Result of one merge pass over the current centers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Centers kept by the pass, in their original order.
    pub accepted: Vec<usize>,
    /// Centers demoted by the pass.
    pub false_positives: usize,
}

/// Fixed point reached by [`StabilityMerger::converge`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeOutcome {
    /// Accepted centers; center `centers[l]` carries label `l`.
    pub centers: Vec<usize>,
    /// Label of every point.
    pub labels: Vec<usize>,
    /// Passes executed, the final zero-demotion pass included.
    pub passes: usize,
}

/// Borrowed view of a clustering run that decides which centers survive a
/// noise threshold.
#[derive(Debug)]
pub struct StabilityMerger<'a, D: ?Sized> {
    source: &'a D,
    rho: &'a [f64],
    neighbours: &'a NeighbourTable,
    settings: MergeSettings,
}

impl<'a, D> StabilityMerger<'a, D>
where
    D: DataSource + Sync + ?Sized,
{
    /// Creates a merger over `source`, its log-densities and neighbours.
    ///
    /// # Errors
    /// Returns [`BasinError::DensityLengthMismatch`] when the inputs describe
    /// different point counts and [`BasinError::NeighbourhoodExceedsTable`]
    /// when `settings.nh_size` is wider than the table.
    pub fn new(
        source: &'a D,
        rho: &'a [f64],
        neighbours: &'a NeighbourTable,
        settings: MergeSettings,
    ) -> Result<Self> {
        for items in [source.len(), neighbours.len()] {
            if items != rho.len() {
                return Err(BasinError::DensityLengthMismatch {
                    densities: rho.len(),
                    items,
                });
            }
        }
        if settings.nh_size > neighbours.k() {
            return Err(BasinError::NeighbourhoodExceedsTable {
                nh_size: settings.nh_size,
                k: neighbours.k(),
            });
        }
        Ok(Self {
            source,
            rho,
            neighbours,
            settings,
        })
    }

    /// Collects the points examined when judging candidate `center`.
    ///
    /// Below [`MINIMAL_NOISE`] this is the first `search_size - 1` neighbours.
    /// Otherwise the search starts from the first `nh_size - 1` neighbours and
    /// expands breadth-first through points labelled like `center`, admitting
    /// only points denser than `rho[center] - noise`.
    #[must_use]
    pub fn extended_neighbourhood(
        &self,
        center: usize,
        noise: f64,
        labels: &[Option<usize>],
    ) -> Vec<usize> {
        if noise < MINIMAL_NOISE {
            return self
                .neighbours
                .others(center, self.settings.search_size)
                .to_vec();
        }

        let floor = self.rho[center] - noise;
        let label = labels[center];
        let seed = self.neighbours.others(center, self.settings.nh_size);
        let mut visited: HashSet<usize> = seed.iter().copied().collect();
        let mut found = seed.to_vec();
        let mut frontier = seed.to_vec();

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for leaf in frontier {
                if labels[leaf] != label {
                    continue;
                }
                for &point in self.neighbours.others(leaf, self.settings.search_size) {
                    if self.rho[point] > floor && visited.insert(point) {
                        found.push(point);
                        next.push(point);
                    }
                }
            }
            frontier = next;
        }
        found
    }

    /// Returns the center `candidate` should be merged into, if any.
    ///
    /// Among the labels present in the extended neighbourhood, the center
    /// with the highest density wins; equal densities keep the smallest
    /// label. Unlabelled points are ignored.
    fn absorbing_center(
        &self,
        candidate: usize,
        noise: f64,
        centers: &[usize],
        labels: &[Option<usize>],
    ) -> Result<Option<usize>> {
        let inconsistent = || BasinError::InconsistentGraph { center: candidate };
        let mut present: Vec<usize> = self
            .extended_neighbourhood(candidate, noise, labels)
            .into_iter()
            .filter_map(|point| labels[point])
            .collect();
        present.sort_unstable();
        present.dedup();

        let mut densest: Option<usize> = None;
        for label in present {
            let center = *centers.get(label).ok_or_else(inconsistent)?;
            if densest.is_none_or(|best| self.rho[center] > self.rho[best]) {
                densest = Some(center);
            }
        }
        let densest = densest.ok_or_else(inconsistent)?;
        Ok((densest != candidate && self.rho[candidate] < self.rho[densest]).then_some(densest))
    }

    /// Runs one merge pass with `labels` frozen for its whole duration.
    ///
    /// Every center is judged against the same labelling; demotions are then
    /// committed in center order. A demoted center is re-parented under the
    /// absorbing center at their Euclidean distance.
    ///
    /// # Errors
    /// Returns [`BasinError::InconsistentGraph`] when a neighbourhood holds no
    /// labelled point and [`BasinError::DataSource`] when a distance cannot
    /// be computed.
    pub fn run_pass(
        &self,
        forest: &mut DensityForest,
        centers: &[usize],
        labels: &[Option<usize>],
        noise: f64,
    ) -> Result<PassOutcome> {
        let judge = |&candidate: &usize| self.absorbing_center(candidate, noise, centers, labels);

        #[cfg(feature = "cpu")]
        let verdicts: Vec<Option<usize>> = centers.par_iter().map(judge).collect::<Result<_>>()?;
        #[cfg(not(feature = "cpu"))]
        let verdicts: Vec<Option<usize>> = centers.iter().map(judge).collect::<Result<_>>()?;

        let mut accepted = Vec::with_capacity(centers.len());
        let mut false_positives = 0;
        for (&candidate, verdict) in centers.iter().zip(verdicts) {
            match verdict {
                Some(target) => {
                    let delta = self
                        .source
                        .distance(candidate, target)
                        .map_err(|error| BasinError::data_source(self.source.name(), error))?;
                    forest.attach(candidate, target, delta);
                    false_positives += 1;
                }
                None => accepted.push(candidate),
            }
        }
        Ok(PassOutcome {
            accepted,
            false_positives,
        })
    }

    /// Repeats merge passes at `noise` until one demotes nothing.
    ///
    /// Labels are recomputed from the surviving centers before every pass.
    /// Passes run against a staged copy of `forest`, which replaces it only
    /// once merging converged; on error `forest` is left untouched.
    ///
    /// # Errors
    /// Returns [`BasinError::EmptyClusterSet`] when `centers` is empty,
    /// [`BasinError::ConvergenceFailed`] when `max_passes` passes all demote
    /// something, and any error raised by labelling or by a pass.
    #[instrument(
        name = "core.merge",
        err,
        skip(self, forest, centers),
        fields(
            candidates = centers.len(),
            passes = tracing::field::Empty,
            clusters = tracing::field::Empty,
        ),
    )]
    pub fn converge(
        &self,
        forest: &mut DensityForest,
        centers: Vec<usize>,
        noise: f64,
    ) -> Result<MergeOutcome> {
        if centers.is_empty() {
            return Err(BasinError::EmptyClusterSet);
        }
        let mut centers = centers;
        let mut staged = forest.clone();
        for pass in 1..=self.settings.max_passes {
            let labels = propagate_labels(&centers, &staged)?;
            let outcome = self.run_pass(&mut staged, &centers, &labels, noise)?;
            record_pass(outcome.false_positives);
            debug!(
                pass,
                false_positives = outcome.false_positives,
                accepted = outcome.accepted.len(),
                "merge pass finished"
            );
            centers = outcome.accepted;

            if outcome.false_positives == 0 {
                let labels = require_complete(labels)?;
                *forest = staged;
                let span = tracing::Span::current();
                span.record("passes", pass);
                span.record("clusters", centers.len());
                record_centers(centers.len());
                info!(noise, clusters = centers.len(), "stable clusters found");
                return Ok(MergeOutcome {
                    centers,
                    labels,
                    passes: pass,
                });
            }
        }
        Err(BasinError::ConvergenceFailed {
            noise,
            passes: self.settings.max_passes,
        })
    }
}

#[cfg(feature = "metrics")]
fn record_pass(false_positives: usize) {
    metrics::counter!("basin_merge_passes_total").increment(1);
    metrics::counter!("basin_false_positives_total").increment(false_positives as u64);
}

#[cfg(not(feature = "metrics"))]
fn record_pass(_false_positives: usize) {}

#[cfg(feature = "metrics")]
fn record_centers(centers: usize) {
    metrics::gauge!("basin_accepted_centers").set(centers as f64);
}

#[cfg(not(feature = "metrics"))]
fn record_centers(_centers: usize) {}
