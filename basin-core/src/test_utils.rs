//! Shared test utilities for `basin-core`.

use basin_test_support::ci::property_test_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;

use crate::{datasource::DataSource, error::DataSourceError, neighbours::NeighbourTable};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Builds a standard proptest configuration from the shared CI profile.
///
/// This keeps property suites aligned on the same `PROGTEST_CASES` and
/// `BASIN_PBT_FORK` interpretation.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// [`DataSource`] implementation that records coordinate lookups for tests.
#[derive(Clone, Debug)]
pub(crate) struct CountingSource {
    rows: Vec<Vec<f32>>,
    calls: Arc<AtomicUsize>,
}

impl CountingSource {
    /// Creates a counting source over `rows`.
    #[must_use]
    pub(crate) fn new(rows: Vec<Vec<f32>>) -> Self {
        Self {
            rows,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a one-dimensional source from scalar positions.
    #[must_use]
    pub(crate) fn line(values: &[f32]) -> Self {
        Self::new(values.iter().map(|&value| vec![value]).collect())
    }

    /// Returns the backing lookup counter for assertions.
    #[must_use]
    pub(crate) fn calls(&self) -> &Arc<AtomicUsize> {
        &self.calls
    }
}

impl DataSource for CountingSource {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn name(&self) -> &str {
        "counting"
    }

    fn dimension(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    fn point(&self, index: usize) -> Result<&[f32], DataSourceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.rows
            .get(index)
            .map(Vec::as_slice)
            .ok_or(DataSourceError::OutOfBounds { index })
    }
}

/// Builds an exact neighbour table for one-dimensional positions.
///
/// Ties are broken by the lower index so fixtures stay deterministic.
pub(crate) fn line_neighbours(values: &[f32], k: usize) -> NeighbourTable {
    let mut indices = Vec::with_capacity(values.len());
    let mut distances = Vec::with_capacity(values.len());
    for (row, &origin) in values.iter().enumerate() {
        let mut order: Vec<(f32, usize)> = values
            .iter()
            .enumerate()
            .map(|(index, &value)| ((value - origin).abs(), index))
            .collect();
        order.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| (a.1 != row).cmp(&(b.1 != row)))
                .then_with(|| a.1.cmp(&b.1))
        });
        order.truncate(k);
        indices.push(order.iter().map(|&(_, index)| index).collect());
        distances.push(order.iter().map(|&(distance, _)| distance).collect());
    }
    NeighbourTable::try_from_rows(indices, distances).expect("line neighbours are well formed")
}
