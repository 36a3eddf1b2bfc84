//! Neighbour oracle: k-nearest-neighbour tables consumed by the gradient
//! forest and the stability merger.
//!
//! The clustering core never searches for neighbours itself. It reads a
//! [`NeighbourTable`] produced by any [`NeighbourOracle`]; the crate ships an
//! exact brute-force oracle and accepts tables computed elsewhere through
//! [`NeighbourTable::try_from_rows`].

use std::num::NonZeroUsize;

#[cfg(feature = "cpu")]
use rayon::prelude::*;
use tracing::instrument;

use crate::{datasource::DataSource, error::NeighbourError};

/// Dense `n × k` table of neighbour indices and distances.
///
/// Every row is ordered by ascending distance and starts with the point
/// itself at distance zero.
///
/// Restored tables pass the same validation as
/// [`NeighbourTable::try_from_rows`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "PackedNeighbours")
)]
pub struct NeighbourTable {
    k: usize,
    indices: Vec<usize>,
    distances: Vec<f32>,
}

impl NeighbourTable {
    /// Validates and packs per-point neighbour rows.
    ///
    /// # Errors
    /// Returns [`NeighbourError`] when the tables disagree in shape, a row
    /// does not start with its own point, an index is out of range, or the
    /// distances are negative, non-finite, or not ascending.
    ///
    /// # Examples
    /// ```
    /// use basin_core::NeighbourTable;
    ///
    /// let table = NeighbourTable::try_from_rows(
    ///     vec![vec![0, 1], vec![1, 0]],
    ///     vec![vec![0.0, 2.0], vec![0.0, 2.0]],
    /// )?;
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.k(), 2);
    /// assert_eq!(table.indices(1), &[1, 0]);
    /// # Ok::<(), basin_core::NeighbourError>(())
    /// ```
    pub fn try_from_rows(
        indices: Vec<Vec<usize>>,
        distances: Vec<Vec<f32>>,
    ) -> Result<Self, NeighbourError> {
        if indices.len() != distances.len() {
            return Err(NeighbourError::RowCountMismatch {
                indices: indices.len(),
                distances: distances.len(),
            });
        }
        let items = indices.len();
        let k = indices.first().map_or(0, Vec::len);
        if items == 0 || k == 0 {
            return Err(NeighbourError::InvalidK { k, items });
        }

        let mut packed_indices = Vec::with_capacity(items * k);
        let mut packed_distances = Vec::with_capacity(items * k);
        for (row, (index_row, distance_row)) in indices.into_iter().zip(distances).enumerate() {
            validate_row(row, items, k, &index_row, &distance_row)?;
            packed_indices.extend(index_row);
            packed_distances.extend(distance_row);
        }

        Ok(Self {
            k,
            indices: packed_indices,
            distances: packed_distances,
        })
    }

    /// Returns the number of points described by the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len() / self.k
    }

    /// Returns whether the table is empty. Validated tables never are.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns the number of neighbours stored per point, self included.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the neighbour indices of `point`, nearest first.
    ///
    /// # Panics
    /// Panics if `point` is outside the table.
    #[must_use]
    pub fn indices(&self, point: usize) -> &[usize] {
        let start = point * self.k;
        &self.indices[start..start + self.k]
    }

    /// Returns the neighbour distances of `point`, nearest first.
    ///
    /// # Panics
    /// Panics if `point` is outside the table.
    #[must_use]
    pub fn distances(&self, point: usize) -> &[f32] {
        let start = point * self.k;
        &self.distances[start..start + self.k]
    }

    /// Returns at most `width - 1` neighbours of `point`, excluding the point
    /// itself.
    ///
    /// `width` counts the point itself, matching how neighbourhood sizes are
    /// configured. Widths beyond the table are truncated to `k`.
    #[must_use]
    pub fn others(&self, point: usize, width: usize) -> &[usize] {
        let row = self.indices(point);
        row.get(1..width.min(self.k)).unwrap_or(&[])
    }
}

/// Serialised form of a [`NeighbourTable`], validated before use.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct PackedNeighbours {
    k: usize,
    indices: Vec<usize>,
    distances: Vec<f32>,
}

#[cfg(feature = "serde")]
impl TryFrom<PackedNeighbours> for NeighbourTable {
    type Error = NeighbourError;

    fn try_from(packed: PackedNeighbours) -> Result<Self, Self::Error> {
        let PackedNeighbours {
            k,
            indices,
            distances,
        } = packed;
        let items = indices.len().checked_div(k).unwrap_or(0);
        if items == 0 {
            return Err(NeighbourError::InvalidK { k, items });
        }
        if indices.len() % k != 0 {
            return Err(NeighbourError::RaggedRow {
                row: items,
                expected: k,
                actual: indices.len() % k,
            });
        }
        if distances.len() != indices.len() {
            return Err(NeighbourError::RowCountMismatch {
                indices: items,
                distances: distances.len().div_ceil(k),
            });
        }
        for (row, (index_row, distance_row)) in
            indices.chunks(k).zip(distances.chunks(k)).enumerate()
        {
            validate_row(row, items, k, index_row, distance_row)?;
        }
        Ok(Self {
            k,
            indices,
            distances,
        })
    }
}

fn validate_row(
    row: usize,
    items: usize,
    k: usize,
    indices: &[usize],
    distances: &[f32],
) -> Result<(), NeighbourError> {
    for width in [indices.len(), distances.len()] {
        if width != k {
            return Err(NeighbourError::RaggedRow {
                row,
                expected: k,
                actual: width,
            });
        }
    }
    if let Some(&found) = indices.first().filter(|&&found| found != row) {
        return Err(NeighbourError::MissingSelf { row, found });
    }
    if let Some(&index) = indices.iter().find(|&&index| index >= items) {
        return Err(NeighbourError::IndexOutOfRange { row, index, items });
    }
    let mut previous = 0.0_f32;
    for (column, &distance) in distances.iter().enumerate() {
        if !distance.is_finite() || distance < previous {
            return Err(NeighbourError::InvalidDistances { row, column });
        }
        previous = distance;
    }
    Ok(())
}

/// Produces k-nearest-neighbour tables for a [`DataSource`].
pub trait NeighbourOracle {
    /// Returns the `k` nearest neighbours of every point, self included.
    ///
    /// # Errors
    /// Returns [`NeighbourError`] when `k` exceeds the source size or the
    /// source fails while computing distances.
    fn neighbours<D: DataSource + Sync + ?Sized>(
        &self,
        source: &D,
        k: NonZeroUsize,
    ) -> Result<NeighbourTable, NeighbourError>;
}

/// Exact neighbour oracle that evaluates every pairwise distance.
///
/// Runs in `O(n²)` distance evaluations, spread across threads when the `cpu`
/// feature is enabled. Equal distances are ordered by the lower point index,
/// and the query point always occupies column zero.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use basin_core::{BruteForceNeighbours, DataSource, DataSourceError, NeighbourOracle};
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
/// let line = Line(vec![[0.0], [1.0], [5.0]]);
/// let k = NonZeroUsize::new(2).expect("non-zero");
/// let table = BruteForceNeighbours.neighbours(&line, k)?;
/// assert_eq!(table.indices(2), &[2, 1]);
/// # Ok::<(), basin_core::NeighbourError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceNeighbours;

impl BruteForceNeighbours {
    fn query<D: DataSource + ?Sized>(
        source: &D,
        point: usize,
        candidates: &[usize],
        k: usize,
    ) -> Result<(Vec<usize>, Vec<f32>), NeighbourError> {
        let distances = source.batch_distances(point, candidates)?;
        let mut order: Vec<(f32, usize)> = distances.into_iter().zip(candidates.iter().copied()).collect();
        order.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| (a.1 != point).cmp(&(b.1 != point)))
                .then_with(|| a.1.cmp(&b.1))
        });
        order.truncate(k);
        if let Some(first) = order.first_mut() {
            // Duplicated coordinates may tie with the point itself; pin its
            // distance so rows start at exactly zero.
            first.0 = 0.0;
        }
        Ok(order.into_iter().map(|(distance, index)| (index, distance)).unzip())
    }
}

impl NeighbourOracle for BruteForceNeighbours {
    #[instrument(
        name = "core.neighbours",
        err,
        skip(self, source),
        fields(data_source = %source.name(), items = source.len(), k = k.get()),
    )]
    fn neighbours<D: DataSource + Sync + ?Sized>(
        &self,
        source: &D,
        k: NonZeroUsize,
    ) -> Result<NeighbourTable, NeighbourError> {
        let items = source.len();
        let k = k.get();
        if k > items {
            return Err(NeighbourError::InvalidK { k, items });
        }
        let candidates: Vec<usize> = (0..items).collect();

        #[cfg(feature = "cpu")]
        let rows: Result<Vec<_>, NeighbourError> = (0..items)
            .into_par_iter()
            .map(|point| Self::query(source, point, &candidates, k))
            .collect();
        #[cfg(not(feature = "cpu"))]
        let rows: Result<Vec<_>, NeighbourError> = (0..items)
            .map(|point| Self::query(source, point, &candidates, k))
            .collect();

        let (indices, distances) = rows?.into_iter().unzip();
        NeighbourTable::try_from_rows(indices, distances)
    }
}
