//! Result types for clustering operations.
//!
//! Provides the flat view of a fitted model: one cluster identifier per point
//! plus the density peak that anchors each cluster.

use thiserror::Error;

/// Cluster assignments and their centers.
///
/// Cluster `c` is anchored at point `centers()[c]`, and that point is itself
/// assigned to cluster `c`.
///
/// # Examples
/// ```
/// use basin_core::{ClusterId, ClusteringResult};
///
/// let result = ClusteringResult::try_from_labels(&[0, 0, 1, 1, 1], vec![1, 3])?;
/// assert_eq!(result.cluster_count(), 2);
/// assert_eq!(result.assignments()[4], ClusterId::new(1));
/// assert_eq!(result.cluster_sizes(), vec![2, 3]);
/// # Ok::<(), basin_core::NonContiguousClusterIds>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusteringResult {
    assignments: Vec<ClusterId>,
    centers: Vec<usize>,
}

/// Error returned when labels and centers do not describe contiguous clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NonContiguousClusterIds {
    /// A label referenced a cluster without a center.
    #[error("label {label} of point {point} has no center")]
    MissingCenter {
        /// Point carrying the label.
        point: usize,
        /// The unmatched label.
        label: usize,
    },
    /// A cluster has no member, so identifiers skip a value.
    #[error("cluster {cluster} has no assigned point")]
    Gap {
        /// The empty cluster.
        cluster: usize,
    },
    /// A center is not assigned to its own cluster.
    #[error("center {center} of cluster {cluster} is not a member of it")]
    DetachedCenter {
        /// Cluster whose center is misplaced.
        cluster: usize,
        /// The misplaced center.
        center: usize,
    },
}

impl ClusteringResult {
    /// Builds a result from per-point labels and the center of each label.
    ///
    /// # Errors
    /// Returns [`NonContiguousClusterIds`] when a label has no center, a
    /// cluster has no member, or a center lies outside its own cluster.
    pub fn try_from_labels(
        labels: &[usize],
        centers: Vec<usize>,
    ) -> Result<Self, NonContiguousClusterIds> {
        let mut populated = vec![false; centers.len()];
        for (point, &label) in labels.iter().enumerate() {
            let slot = populated
                .get_mut(label)
                .ok_or(NonContiguousClusterIds::MissingCenter { point, label })?;
            *slot = true;
        }
        if let Some(cluster) = populated.iter().position(|&seen| !seen) {
            return Err(NonContiguousClusterIds::Gap { cluster });
        }
        for (cluster, &center) in centers.iter().enumerate() {
            if labels.get(center) != Some(&cluster) {
                return Err(NonContiguousClusterIds::DetachedCenter { cluster, center });
            }
        }

        Ok(Self {
            assignments: labels.iter().map(|&label| ClusterId::from(label)).collect(),
            centers,
        })
    }

    /// Returns the assignments in point order.
    #[must_use]
    pub fn assignments(&self) -> &[ClusterId] {
        &self.assignments
    }

    /// Returns the center point of every cluster.
    #[must_use]
    pub fn centers(&self) -> &[usize] {
        &self.centers
    }

    /// Counts how many distinct clusters exist within the assignments.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.centers.len()
    }

    /// Returns the number of points in every cluster.
    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centers.len()];
        for id in &self.assignments {
            if let Some(size) = usize::try_from(id.get())
                .ok()
                .and_then(|index| sizes.get_mut(index))
            {
                *size += 1;
            }
        }
        sizes
    }
}

/// Identifier assigned to a cluster.
///
/// # Examples
/// ```
/// use basin_core::ClusterId;
///
/// let id = ClusterId::new(4);
/// assert_eq!(id.get(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterId(u64);

impl ClusterId {
    /// Creates a new cluster identifier.
    #[rustfmt::skip]
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Returns the underlying numeric identifier.
    #[rustfmt::skip]
    #[must_use]
    pub fn get(self) -> u64 { self.0 }
}

impl From<usize> for ClusterId {
    fn from(label: usize) -> Self {
        Self(label as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0, 2], vec![0, 1], NonContiguousClusterIds::MissingCenter { point: 1, label: 2 })]
    #[case(&[0, 0], vec![0, 1], NonContiguousClusterIds::Gap { cluster: 1 })]
    #[case(&[1, 0], vec![0, 1], NonContiguousClusterIds::DetachedCenter { cluster: 0, center: 0 })]
    fn rejects_inconsistent_labels(
        #[case] labels: &[usize],
        #[case] centers: Vec<usize>,
        #[case] expected: NonContiguousClusterIds,
    ) {
        assert_eq!(
            ClusteringResult::try_from_labels(labels, centers),
            Err(expected)
        );
    }

    #[test]
    fn empty_labelling_has_no_clusters() {
        let result = ClusteringResult::try_from_labels(&[], Vec::new()).expect("empty is valid");
        assert_eq!(result.cluster_count(), 0);
        assert!(result.cluster_sizes().is_empty());
    }
}
