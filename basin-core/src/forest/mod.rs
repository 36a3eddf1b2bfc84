//! Gradient forest: density-ascending parent links and their reverse
//! adjacency.
//!
//! Every point links to its nearest neighbour of strictly higher density
//! within the gradient neighbourhood. Points without such a neighbour are the
//! candidate centers and root the forest. Stability merging later re-parents
//! demoted candidates onto higher-density centers, keeping the structure a
//! forest whose roots are exactly the accepted centers.

mod labels;
mod merge;

pub use labels::{LabelStats, propagate_labels};
pub(crate) use labels::require_complete;
pub use merge::{MINIMAL_NOISE, MergeOutcome, MergeSettings, PassOutcome, StabilityMerger};

#[cfg(feature = "cpu")]
use rayon::prelude::*;
use tracing::{info, instrument};

use crate::{
    error::{BasinError, ForestViolation, Result},
    neighbours::NeighbourTable,
};

/// Density-ascending forest over the points of a clustering run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DensityForest {
    parent: Vec<Option<usize>>,
    delta: Vec<f32>,
    children: Vec<Vec<usize>>,
    candidates: Vec<usize>,
    sentinel: f32,
}

impl DensityForest {
    /// Builds the gradient forest from log-densities and a neighbour table.
    ///
    /// Scans `neighbours.indices(i)[1..nh_size]` in order and links `i` to the
    /// first neighbour whose density exceeds `rho[i] + tie_tolerance`.
    /// Unlinked points keep `sentinel` as their `delta` and become candidate
    /// centers, listed in ascending index order.
    ///
    /// # Errors
    /// Returns [`BasinError::DensityLengthMismatch`] when `rho` and
    /// `neighbours` disagree on the point count and
    /// [`BasinError::NeighbourhoodExceedsTable`] when `nh_size` is wider than
    /// the table.
    #[instrument(
        name = "core.gradient_forest",
        err,
        skip(rho, neighbours),
        fields(items = rho.len(), candidates = tracing::field::Empty),
    )]
    pub fn build(
        rho: &[f64],
        neighbours: &NeighbourTable,
        nh_size: usize,
        tie_tolerance: f64,
        sentinel: f32,
    ) -> Result<Self> {
        if rho.len() != neighbours.len() {
            return Err(BasinError::DensityLengthMismatch {
                densities: rho.len(),
                items: neighbours.len(),
            });
        }
        if nh_size > neighbours.k() {
            return Err(BasinError::NeighbourhoodExceedsTable {
                nh_size,
                k: neighbours.k(),
            });
        }

        let ascend = |point: usize| -> Option<(usize, f32)> {
            let floor = rho[point] + tie_tolerance;
            let indices = neighbours.indices(point);
            let distances = neighbours.distances(point);
            (1..nh_size)
                .find(|&column| rho[indices[column]] > floor)
                .map(|column| (indices[column], distances[column]))
        };

        #[cfg(feature = "cpu")]
        let links: Vec<Option<(usize, f32)>> = (0..rho.len()).into_par_iter().map(ascend).collect();
        #[cfg(not(feature = "cpu"))]
        let links: Vec<Option<(usize, f32)>> = (0..rho.len()).map(ascend).collect();

        let mut forest = Self {
            parent: vec![None; rho.len()],
            delta: vec![sentinel; rho.len()],
            children: vec![Vec::new(); rho.len()],
            candidates: Vec::new(),
            sentinel,
        };
        for (point, link) in links.into_iter().enumerate() {
            match link {
                Some((parent, delta)) => forest.attach(point, parent, delta),
                None => forest.candidates.push(point),
            }
        }

        tracing::Span::current().record("candidates", forest.candidates.len());
        info!(candidates = forest.candidates.len(), "gradient forest built");
        Ok(forest)
    }

    /// Returns the number of points in the forest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Returns whether the forest holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Returns the density-ascending parent of `point`, `None` for roots.
    #[must_use]
    pub fn parent(&self, point: usize) -> Option<usize> {
        self.parent.get(point).copied().flatten()
    }

    /// Returns the distance from `point` to its parent, or the sentinel for
    /// roots of the initial forest.
    #[must_use]
    pub fn delta(&self, point: usize) -> Option<f32> {
        self.delta.get(point).copied()
    }

    /// Returns every `delta` value, indexed by point.
    #[must_use]
    pub fn deltas(&self) -> &[f32] {
        &self.delta
    }

    /// Returns the points whose parent is `point`.
    #[must_use]
    pub fn children(&self, point: usize) -> &[usize] {
        self.children.get(point).map_or(&[], Vec::as_slice)
    }

    /// Returns the candidate centers found when the forest was built.
    #[must_use]
    pub fn candidates(&self) -> &[usize] {
        &self.candidates
    }

    /// Returns the sentinel `delta` assigned to candidate centers.
    #[must_use]
    pub fn sentinel(&self) -> f32 {
        self.sentinel
    }

    /// Links `child` under `parent`. Used when a candidate center is demoted.
    pub(crate) fn attach(&mut self, child: usize, parent: usize, delta: f32) {
        self.parent[child] = Some(parent);
        self.delta[child] = delta;
        self.children[parent].push(child);
    }

    /// Follows parent links from `point` to its root.
    ///
    /// # Errors
    /// Returns [`BasinError::ForestInvariant`] with
    /// [`ForestViolation::Cycle`] when the walk exceeds the number of points.
    pub fn root_of(&self, point: usize) -> Result<usize> {
        let mut current = point;
        for _ in 0..=self.len() {
            match self.parent(current) {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
        Err(BasinError::ForestInvariant {
            point,
            violation: ForestViolation::Cycle,
        })
    }

    /// Checks that every parent edge climbs in density and that no parent
    /// chain loops.
    ///
    /// # Errors
    /// Returns [`BasinError::ForestInvariant`] naming the first offending
    /// point.
    pub fn validate(&self, rho: &[f64]) -> Result<()> {
        if rho.len() != self.len() {
            return Err(BasinError::DensityLengthMismatch {
                densities: rho.len(),
                items: self.len(),
            });
        }
        for (point, parent) in self.parent.iter().enumerate() {
            if let Some(parent) = *parent
                && rho[parent] <= rho[point]
            {
                return Err(BasinError::ForestInvariant {
                    point,
                    violation: ForestViolation::DensityNotIncreasing,
                });
            }
        }
        let mut resolved = vec![false; self.len()];
        for start in 0..self.len() {
            let mut path = Vec::new();
            let mut current = start;
            while !resolved[current] {
                if path.len() > self.len() {
                    return Err(BasinError::ForestInvariant {
                        point: start,
                        violation: ForestViolation::Cycle,
                    });
                }
                path.push(current);
                match self.parent(current) {
                    Some(next) => current = next,
                    None => break,
                }
            }
            for visited in path {
                resolved[visited] = true;
            }
        }
        Ok(())
    }
}
