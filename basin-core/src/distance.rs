//! Euclidean distance primitive shared by the data-source abstraction.

use crate::error::DataSourceError;

/// Computes the Euclidean distance between two coordinate slices.
///
/// Accumulates in `f64` so long vectors of small differences keep their
/// precision before narrowing back to `f32`.
///
/// # Errors
/// Returns [`DataSourceError::ZeroDimension`] when either input is empty and
/// [`DataSourceError::DimensionMismatch`] when their lengths differ.
///
/// # Examples
/// ```
/// use basin_core::{DataSourceError, euclidean_distance};
///
/// let distance = euclidean_distance(&[1.0, 2.0, 3.0], &[4.0, 6.0, 8.0])?;
/// assert!((distance - 7.071_068).abs() < 1e-6);
/// # Ok::<(), DataSourceError>(())
/// ```
pub fn euclidean_distance(left: &[f32], right: &[f32]) -> Result<f32, DataSourceError> {
    if left.is_empty() || right.is_empty() {
        return Err(DataSourceError::ZeroDimension);
    }
    if left.len() != right.len() {
        return Err(DataSourceError::DimensionMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    let sum: f64 = left
        .iter()
        .zip(right)
        .map(|(&l, &r)| {
            let diff = f64::from(l) - f64::from(r);
            diff * diff
        })
        .sum();

    Ok(sum.sqrt() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0.0, 0.0], &[3.0, 4.0], 5.0)]
    #[case(&[1.0], &[1.0], 0.0)]
    #[case(&[-1.0, 2.0, 0.5], &[-1.0, 2.0, 0.5], 0.0)]
    fn computes_expected_distance(#[case] left: &[f32], #[case] right: &[f32], #[case] expected: f32) {
        let distance = euclidean_distance(left, right).expect("valid inputs");
        assert!((distance - expected).abs() < 1e-6);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let err = euclidean_distance(&[1.0, 2.0], &[1.0]).expect_err("lengths differ");
        assert_eq!(err, DataSourceError::DimensionMismatch { left: 2, right: 1 });
    }

    #[test]
    fn rejects_empty_vectors() {
        let err = euclidean_distance(&[], &[]).expect_err("empty vectors are invalid");
        assert_eq!(err, DataSourceError::ZeroDimension);
    }
}
