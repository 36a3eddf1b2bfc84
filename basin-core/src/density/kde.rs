//! Isotropic Gaussian kernel density estimator.

use std::f64::consts::TAU;

#[cfg(feature = "cpu")]
use rayon::prelude::*;

use super::DensityOracle;
use crate::{
    datasource::DataSource,
    error::{DataSourceError, DensityError},
};

/// Gaussian kernel density estimator with a fixed bandwidth.
///
/// Log-densities are evaluated with a pruned log-sum-exp: kernel terms whose
/// weight relative to the dominant term falls below `rtol` are dropped. The
/// dominant term always survives, so scores stay finite for points far away
/// from every training sample.
///
/// # Examples
/// ```
/// use basin_core::{DataSource, DataSourceError, DensityOracle, GaussianKde};
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
/// let line = Line(vec![[0.0], [0.1], [0.2], [5.0]]);
/// let kde = GaussianKde::new(0.5, 5e-5);
/// let model = kde.fit(&line)?;
/// let rho = kde.score(&model, &line)?;
/// assert!(rho[1] > rho[3]);
/// # Ok::<(), basin_core::DensityError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianKde {
    bandwidth: f64,
    rtol: f64,
}

impl GaussianKde {
    /// Creates an estimator with the given bandwidth and relative tolerance.
    #[must_use]
    pub fn new(bandwidth: f64, rtol: f64) -> Self {
        Self { bandwidth, rtol }
    }

    /// Returns the kernel bandwidth.
    #[must_use]
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }
}

/// Training samples captured by [`GaussianKde::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct KdeModel {
    dimension: usize,
    samples: Vec<f32>,
}

impl KdeModel {
    /// Returns the number of training samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len() / self.dimension
    }

    /// Returns whether the model holds no samples. Fitted models never do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn samples(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.chunks_exact(self.dimension)
    }
}

impl GaussianKde {
    fn log_density(&self, model: &KdeModel, query: &[f32]) -> f64 {
        let scale = -0.5 / (self.bandwidth * self.bandwidth);
        let exponents: Vec<f64> = model
            .samples()
            .map(|sample| {
                let squared: f64 = sample
                    .iter()
                    .zip(query)
                    .map(|(&s, &q)| {
                        let diff = f64::from(s) - f64::from(q);
                        diff * diff
                    })
                    .sum();
                squared * scale
            })
            .collect();

        let peak = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let floor = self.rtol.ln();
        let sum: f64 = exponents
            .iter()
            .map(|&exponent| exponent - peak)
            .filter(|&relative| relative >= floor)
            .map(f64::exp)
            .sum();

        let dimension = model.dimension as f64;
        let normaliser =
            (model.len() as f64).ln() + 0.5 * dimension * (TAU * self.bandwidth * self.bandwidth).ln();
        peak + sum.ln() - normaliser
    }
}

impl DensityOracle for GaussianKde {
    type Model = KdeModel;

    fn fit<D: DataSource + Sync + ?Sized>(&self, train: &D) -> Result<KdeModel, DensityError> {
        if train.is_empty() {
            return Err(DensityError::InsufficientSamples {
                items: 0,
                required: 1,
            });
        }
        let dimension = train.dimension();
        if dimension == 0 {
            return Err(DataSourceError::ZeroDimension.into());
        }
        let mut samples = Vec::with_capacity(train.len() * dimension);
        for index in 0..train.len() {
            let point = train.point(index)?;
            if point.len() != dimension {
                return Err(DensityError::DimensionMismatch {
                    model: dimension,
                    points: point.len(),
                });
            }
            samples.extend_from_slice(point);
        }
        Ok(KdeModel { dimension, samples })
    }

    fn score<D: DataSource + Sync + ?Sized>(
        &self,
        model: &KdeModel,
        points: &D,
    ) -> Result<Vec<f64>, DensityError> {
        if points.dimension() != model.dimension {
            return Err(DensityError::DimensionMismatch {
                model: model.dimension,
                points: points.dimension(),
            });
        }
        let score_one = |index: usize| -> Result<f64, DensityError> {
            Ok(self.log_density(model, points.point(index)?))
        };

        #[cfg(feature = "cpu")]
        let scores = (0..points.len()).into_par_iter().map(score_one).collect();
        #[cfg(not(feature = "cpu"))]
        let scores = (0..points.len()).map(score_one).collect();

        scores
    }
}
