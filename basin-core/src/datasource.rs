//! Data source abstractions for the basin clustering runtime.
//!
//! Clustering needs the raw coordinates, not only pairwise distances: the
//! gradient-forest sentinel is the coordinate-wise extent of the point cloud
//! and demoted centers are re-attached at their Euclidean distance in feature
//! space.

use crate::{distance::euclidean_distance, error::DataSourceError};

/// Abstraction over a point cloud that exposes coordinates and Euclidean
/// distances.
///
/// # Examples
/// ```
/// use basin_core::{DataSource, DataSourceError};
///
/// struct Line(Vec<[f32; 1]>);
///
/// impl DataSource for Line {
///     fn len(&self) -> usize { self.0.len() }
///     fn name(&self) -> &str { "line" }
///     fn dimension(&self) -> usize { 1 }
///     fn point(&self, index: usize) -> Result<&[f32], DataSourceError> {
///         self.0
///             .get(index)
///             .map(|row| row.as_slice())
///             .ok_or(DataSourceError::OutOfBounds { index })
///     }
/// }
///
/// let src = Line(vec![[1.0], [2.0], [4.0]]);
/// assert_eq!(src.len(), 3);
/// assert_eq!(src.distance(0, 2)?, 3.0);
/// assert_eq!(src.batch_distances(0, &[1, 2])?, [1.0, 3.0]);
/// assert_eq!(src.extent()?, 3.0);
/// # Ok::<(), DataSourceError>(())
/// ```
pub trait DataSource {
    /// Returns number of points in the source.
    fn len(&self) -> usize;

    /// Returns whether the source contains no points.
    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a human-readable name.
    fn name(&self) -> &str;

    /// Returns the number of coordinates per point.
    fn dimension(&self) -> usize;

    /// Returns the coordinates of the point at `index`.
    ///
    /// # Errors
    /// Implementations must return [`DataSourceError::OutOfBounds`] for
    /// indices outside `0..len()`.
    fn point(&self, index: usize) -> Result<&[f32], DataSourceError>;

    /// Computes the Euclidean distance between two points.
    ///
    /// # Errors
    /// Returns any [`DataSourceError`] surfaced by [`DataSource::point`] or by
    /// mismatched dimensions.
    fn distance(&self, i: usize, j: usize) -> Result<f32, DataSourceError> {
        euclidean_distance(self.point(i)?, self.point(j)?)
    }

    /// Computes the distances from `query` to every entry in `candidates`.
    ///
    /// The default implementation calls [`DataSource::distance`] repeatedly.
    ///
    /// # Errors
    /// Returns the first [`DataSourceError`] encountered.
    fn batch_distances(
        &self,
        query: usize,
        candidates: &[usize],
    ) -> Result<Vec<f32>, DataSourceError> {
        let origin = self.point(query)?;
        candidates
            .iter()
            .map(|&candidate| euclidean_distance(origin, self.point(candidate)?))
            .collect()
    }

    /// Returns the Euclidean norm of the per-coordinate ranges.
    ///
    /// No pairwise distance in the source can exceed this value, which makes
    /// it the sentinel `delta` of parent-less points in the gradient forest.
    ///
    /// # Errors
    /// Returns [`DataSourceError::EmptyData`] for empty sources and propagates
    /// failures from [`DataSource::point`].
    fn extent(&self) -> Result<f32, DataSourceError> {
        let first = self.point(0).map_err(|_| DataSourceError::EmptyData)?;
        let mut low = first.to_vec();
        let mut high = first.to_vec();
        for index in 1..self.len() {
            let row = self.point(index)?;
            if row.len() != low.len() {
                return Err(DataSourceError::DimensionMismatch {
                    left: low.len(),
                    right: row.len(),
                });
            }
            for ((lo, hi), &value) in low.iter_mut().zip(high.iter_mut()).zip(row) {
                *lo = lo.min(value);
                *hi = hi.max(value);
            }
        }
        let sum: f64 = low
            .iter()
            .zip(&high)
            .map(|(&lo, &hi)| {
                let span = f64::from(hi) - f64::from(lo);
                span * span
            })
            .sum();
        Ok(sum.sqrt() as f32)
    }
}

/// Re-indexed view over a subset of another [`DataSource`].
///
/// Used to carve holdout splits without copying coordinates.
///
/// # Examples
/// ```
/// use basin_core::{DataSource, DataSourceError, Subset};
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
/// let line = Line(vec![[0.0], [5.0], [9.0]]);
/// let subset = Subset::new(&line, vec![2, 0]);
/// assert_eq!(subset.len(), 2);
/// assert_eq!(subset.point(0)?, &[9.0]);
/// # Ok::<(), DataSourceError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Subset<'a, D: ?Sized> {
    source: &'a D,
    indices: Vec<usize>,
}

impl<'a, D: DataSource + ?Sized> Subset<'a, D> {
    /// Creates a view exposing `indices` of `source` in the given order.
    #[must_use]
    pub fn new(source: &'a D, indices: Vec<usize>) -> Self {
        Self { source, indices }
    }

    /// Returns the indices of the parent source covered by this view.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl<D: DataSource + ?Sized> DataSource for Subset<'_, D> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn name(&self) -> &str {
        self.source.name()
    }

    fn dimension(&self) -> usize {
        self.source.dimension()
    }

    fn point(&self, index: usize) -> Result<&[f32], DataSourceError> {
        let mapped = self
            .indices
            .get(index)
            .ok_or(DataSourceError::OutOfBounds { index })?;
        self.source.point(*mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::CountingSource;
    use std::sync::atomic::Ordering;

    #[test]
    fn batch_distances_reads_each_candidate_once() {
        let source = CountingSource::new(vec![vec![0.0], vec![1.0], vec![3.0]]);

        let distances = source
            .batch_distances(0, &[1, 2])
            .expect("batch distances should succeed");

        assert_eq!(distances, vec![1.0, 3.0]);
        assert_eq!(source.calls().load(Ordering::Relaxed), 3);
    }

    #[test]
    fn batch_distances_propagates_errors() {
        let source = CountingSource::new(vec![vec![0.0], vec![1.0]]);

        let err = source
            .batch_distances(0, &[1, 5])
            .expect_err("invalid candidate must fail");

        assert!(
            matches!(err, DataSourceError::OutOfBounds { index: 5 }),
            "expected OutOfBounds with index 5, got {err:?}",
        );
    }

    #[test]
    fn extent_is_norm_of_coordinate_ranges() {
        let source = CountingSource::new(vec![vec![0.0, 1.0], vec![3.0, -3.0], vec![1.0, 0.0]]);
        let extent = source.extent().expect("non-empty source");
        assert!((extent - 5.0).abs() < 1e-6);
    }

    #[test]
    fn extent_rejects_empty_sources() {
        let source = CountingSource::new(Vec::new());
        assert_eq!(source.extent(), Err(DataSourceError::EmptyData));
    }

    #[test]
    fn subset_maps_indices_and_bounds() {
        let source = CountingSource::new(vec![vec![0.0], vec![2.0], vec![7.0]]);
        let subset = Subset::new(&source, vec![2, 1]);
        assert_eq!(subset.distance(0, 1), Ok(5.0));
        assert_eq!(
            subset.point(2),
            Err(DataSourceError::OutOfBounds { index: 2 })
        );
    }
}
