//! Density oracle: per-point log-density estimates feeding the gradient forest.
//!
//! The clustering core only consumes a `Vec<f64>` of log-densities. Any
//! estimator implementing [`DensityOracle`] can supply it; the crate ships an
//! isotropic Gaussian kernel density estimator with holdout bandwidth
//! selection as the reference implementation.

mod bandwidth;
mod kde;

pub use bandwidth::{Bandwidth, BandwidthSearch, holdout_split, select_bandwidth};
pub use kde::{GaussianKde, KdeModel};

use crate::{datasource::DataSource, error::DensityError};

/// Estimates log-densities for points of a [`DataSource`].
pub trait DensityOracle {
    /// Fitted state produced from training points.
    type Model;

    /// Fits the estimator on `train`.
    ///
    /// # Errors
    /// Returns [`DensityError`] when `train` is unusable or cannot be read.
    fn fit<D: DataSource + Sync + ?Sized>(&self, train: &D) -> Result<Self::Model, DensityError>;

    /// Returns the log-density of every point in `points` under `model`.
    ///
    /// # Errors
    /// Returns [`DensityError`] when `points` lives in a different space than
    /// the model or cannot be read.
    fn score<D: DataSource + Sync + ?Sized>(
        &self,
        model: &Self::Model,
        points: &D,
    ) -> Result<Vec<f64>, DensityError>;
}
