//! Kernel bandwidth configuration and holdout selection.

use rand::{SeedableRng, rngs::SmallRng, seq::SliceRandom};
use tracing::{debug, instrument};

use super::{DensityOracle, GaussianKde};
use crate::{datasource::DataSource, error::DensityError};

const GOLDEN: f64 = 0.618_033_988_749_894_8;
const MAX_SEARCH_ITERATIONS: usize = 25;
const SEARCH_SPAN: f64 = 10.0;

/// How the kernel bandwidth is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bandwidth {
    /// Maximise the holdout log-likelihood around a Silverman estimate.
    #[default]
    Auto,
    /// Use the supplied bandwidth as-is.
    Manual(f64),
}

/// Precision controls for [`select_bandwidth`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthSearch {
    /// Relative kernel weight below which terms are pruned.
    pub rtol: f64,
    /// Width of the log-bandwidth bracket at which the search stops.
    pub xtol: f64,
}

impl Default for BandwidthSearch {
    fn default() -> Self {
        Self {
            rtol: 5e-5,
            xtol: 0.01,
        }
    }
}

/// Splits `items` indices into shuffled `(train, test)` sets.
///
/// `test_ratio` of the points land in the test set; both sets keep at least
/// one point.
///
/// # Errors
/// Returns [`DensityError::InsufficientSamples`] when fewer than two points
/// are available.
///
/// # Examples
/// ```
/// use basin_core::holdout_split;
///
/// let (train, test) = holdout_split(10, 0.8, 7)?;
/// assert_eq!((train.len(), test.len()), (2, 8));
/// # Ok::<(), basin_core::DensityError>(())
/// ```
pub fn holdout_split(
    items: usize,
    test_ratio: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), DensityError> {
    if items < 2 {
        return Err(DensityError::InsufficientSamples { items, required: 2 });
    }
    let mut order: Vec<usize> = (0..items).collect();
    let mut rng = SmallRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let test = ((items as f64) * test_ratio).round() as usize;
    let test = test.clamp(1, items - 1);
    let train = order.split_off(test);
    Ok((train, order))
}

/// Silverman's rule of thumb for an isotropic kernel.
fn silverman<D: DataSource + ?Sized>(source: &D) -> Result<f64, DensityError> {
    let n = source.len() as f64;
    let dimension = source.dimension();
    let mut sums = vec![0.0_f64; dimension];
    let mut squares = vec![0.0_f64; dimension];
    for index in 0..source.len() {
        for ((sum, square), &value) in sums.iter_mut().zip(&mut squares).zip(source.point(index)?) {
            let value = f64::from(value);
            *sum += value;
            *square += value * value;
        }
    }
    let sigma = sums
        .iter()
        .zip(&squares)
        .map(|(&sum, &square)| {
            let mean = sum / n;
            (square / n - mean * mean).max(0.0).sqrt()
        })
        .sum::<f64>()
        / dimension as f64;

    let d = dimension as f64;
    Ok(sigma * (4.0 / ((d + 2.0) * n)).powf(1.0 / (d + 4.0)))
}

/// Chooses the bandwidth maximising the mean log-likelihood of `test` under
/// a Gaussian KDE fitted on `train`.
///
/// Runs a golden-section search over `ln h` in a bracket spanning one order of
/// magnitude either side of the Silverman estimate for `train`. A training set
/// without spread gives every bandwidth the same likelihood; `1.0` is returned
/// for it.
///
/// # Errors
/// Returns [`DensityError`] when either split is empty, the splits differ in
/// dimension, or the search fails to produce a finite bandwidth.
#[instrument(
    name = "core.select_bandwidth",
    err,
    skip(train, test, search),
    fields(train = train.len(), test = test.len()),
)]
pub fn select_bandwidth<D, T>(
    train: &D,
    test: &T,
    search: BandwidthSearch,
) -> Result<f64, DensityError>
where
    D: DataSource + Sync + ?Sized,
    T: DataSource + Sync + ?Sized,
{
    if train.is_empty() || test.is_empty() {
        return Err(DensityError::InsufficientSamples {
            items: train.len() + test.len(),
            required: 2,
        });
    }
    let estimate = silverman(train)?;
    if !(estimate.is_finite() && estimate > 0.0) {
        debug!(estimate, "training split has no spread, using unit bandwidth");
        return Ok(1.0);
    }

    let likelihood = |log_bandwidth: f64| -> Result<f64, DensityError> {
        let kde = GaussianKde::new(log_bandwidth.exp(), search.rtol);
        let model = kde.fit(train)?;
        let scores = kde.score(&model, test)?;
        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let mut low = (estimate / SEARCH_SPAN).ln();
    let mut high = (estimate * SEARCH_SPAN).ln();
    let mut left = high - GOLDEN * (high - low);
    let mut right = low + GOLDEN * (high - low);
    let mut left_score = likelihood(left)?;
    let mut right_score = likelihood(right)?;

    for _ in 0..MAX_SEARCH_ITERATIONS {
        if high - low < search.xtol {
            break;
        }
        if left_score >= right_score {
            high = right;
            right = left;
            right_score = left_score;
            left = high - GOLDEN * (high - low);
            left_score = likelihood(left)?;
        } else {
            low = left;
            left = right;
            left_score = right_score;
            right = low + GOLDEN * (high - low);
            right_score = likelihood(right)?;
        }
    }

    let bandwidth = (0.5 * (low + high)).exp();
    debug!(estimate, bandwidth, "bandwidth search finished");
    if bandwidth.is_finite() && bandwidth > 0.0 {
        Ok(bandwidth)
    } else {
        Err(DensityError::BandwidthSelectionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{datasource::Subset, test_utils::CountingSource};
    use rstest::rstest;

    #[rstest]
    #[case(10, 0.8, 2, 8)]
    #[case(2, 0.8, 1, 1)]
    #[case(5, 0.01, 4, 1)]
    #[case(5, 0.99, 1, 4)]
    fn holdout_split_keeps_both_sides(
        #[case] items: usize,
        #[case] ratio: f64,
        #[case] train_len: usize,
        #[case] test_len: usize,
    ) {
        let (train, test) = holdout_split(items, ratio, 3).expect("split must succeed");
        assert_eq!(train.len(), train_len);
        assert_eq!(test.len(), test_len);
        let mut all: Vec<usize> = train.into_iter().chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, (0..items).collect::<Vec<_>>());
    }

    #[test]
    fn holdout_split_is_seeded() {
        assert_eq!(holdout_split(50, 0.5, 9), holdout_split(50, 0.5, 9));
    }

    #[test]
    fn holdout_split_rejects_single_point() {
        assert_eq!(
            holdout_split(1, 0.5, 0),
            Err(DensityError::InsufficientSamples { items: 1, required: 2 })
        );
    }

    #[test]
    fn selected_bandwidth_stays_in_bracket() {
        let values: Vec<f32> = (0..60).map(|i| ((i * 37) % 60) as f32 * 0.1).collect();
        let source = CountingSource::line(&values);
        let (train, test) = holdout_split(values.len(), 0.5, 1).expect("split");
        let train = Subset::new(&source, train);
        let test = Subset::new(&source, test);

        let estimate = silverman(&train).expect("estimate");
        let bandwidth =
            select_bandwidth(&train, &test, BandwidthSearch::default()).expect("selection");
        assert!(bandwidth >= estimate / SEARCH_SPAN * 0.99);
        assert!(bandwidth <= estimate * SEARCH_SPAN * 1.01);
    }

    #[test]
    fn flat_training_set_uses_unit_bandwidth() {
        let source = CountingSource::line(&[2.0, 2.0, 2.0, 2.0]);
        let train = Subset::new(&source, vec![0, 1]);
        let test = Subset::new(&source, vec![2, 3]);
        assert_eq!(
            select_bandwidth(&train, &test, BandwidthSearch::default()),
            Ok(1.0)
        );
    }
}
