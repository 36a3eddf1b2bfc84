//! Fixtures shared by the `basin-core` integration suites.
#![allow(dead_code, reason = "each suite uses a different subset of the fixtures")]

use basin_core::{DataSource, DataSourceError};
use basin_test_support::blobs::Blobs;

/// In-memory point cloud backed by coordinate rows.
#[derive(Clone, Debug)]
pub struct Points {
    name: &'static str,
    rows: Vec<Vec<f32>>,
}

impl Points {
    #[must_use]
    pub fn new(name: &'static str, rows: Vec<Vec<f32>>) -> Self {
        Self { name, rows }
    }

    /// One-dimensional cloud from scalar positions.
    #[must_use]
    pub fn line(values: &[f32]) -> Self {
        Self::new("line", values.iter().map(|&value| vec![value]).collect())
    }

    #[must_use]
    pub fn from_blobs(blobs: &Blobs) -> Self {
        Self::new("blobs", blobs.points.clone())
    }
}

impl DataSource for Points {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn name(&self) -> &str {
        self.name
    }

    fn dimension(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    fn point(&self, index: usize) -> Result<&[f32], DataSourceError> {
        self.rows
            .get(index)
            .map(Vec::as_slice)
            .ok_or(DataSourceError::OutOfBounds { index })
    }
}

/// Counts how many points carry each label.
#[must_use]
pub fn label_counts(labels: &[usize], clusters: usize) -> Vec<usize> {
    let mut counts = vec![0; clusters];
    for &label in labels {
        counts[label] += 1;
    }
    counts
}
