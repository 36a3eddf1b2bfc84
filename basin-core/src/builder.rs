//! Builder utilities for configuring density clustering.
//!
//! Exposes the neighbourhood sizing policy and builder validation used before
//! constructing [`DensityClustering`] instances.

use crate::{
    Result,
    clustering::DensityClustering,
    density::Bandwidth,
    error::ConfigError,
};

/// How many neighbours, self included, the gradient search examines.
///
/// # Examples
/// ```
/// use basin_core::NeighbourhoodSize;
///
/// assert_eq!(NeighbourhoodSize::Auto.resolve(600), 10);
/// assert_eq!(NeighbourhoodSize::Auto.resolve(5_000), 20);
/// assert_eq!(NeighbourhoodSize::Auto.resolve(6), 6);
/// assert_eq!(NeighbourhoodSize::Fixed(12).resolve(6), 12);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NeighbourhoodSize {
    /// Scale with the sample count: `n / 250`, clamped to `10..=100` and
    /// capped at `n`.
    #[default]
    Auto,
    /// Use exactly this many neighbours.
    Fixed(usize),
}

impl NeighbourhoodSize {
    /// Resolves the neighbourhood size for a source of `items` points.
    ///
    /// Never returns less than two, so sources with a single point are
    /// reported as too small rather than silently degenerate.
    #[must_use]
    pub fn resolve(self, items: usize) -> usize {
        match self {
            Self::Auto => (items / 250).clamp(10, 100).min(items).max(2),
            Self::Fixed(size) => size,
        }
    }
}

/// Configures and constructs [`DensityClustering`] instances.
///
/// # Examples
/// ```
/// use basin_core::{Bandwidth, ClusteringBuilder, NeighbourhoodSize};
///
/// let clustering = ClusteringBuilder::new()
///     .with_neighbourhood(NeighbourhoodSize::Fixed(10))
///     .with_noise_threshold(0.25)
///     .with_bandwidth(Bandwidth::Manual(0.5))
///     .build()?;
/// assert_eq!(clustering.noise_threshold(), 0.25);
/// assert_eq!(clustering.search_size(), 20);
/// # Ok::<(), basin_core::BasinError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ClusteringBuilder {
    neighbourhood: NeighbourhoodSize,
    noise_threshold: f64,
    search_size: usize,
    merge: bool,
    tie_tolerance: f64,
    max_merge_passes: usize,
    bandwidth: Bandwidth,
    test_ratio: f64,
    rtol: f64,
    xtol: f64,
    random_seed: u64,
}

impl Default for ClusteringBuilder {
    fn default() -> Self {
        Self {
            neighbourhood: NeighbourhoodSize::Auto,
            noise_threshold: 0.5,
            search_size: 20,
            merge: true,
            tie_tolerance: 1e-8,
            max_merge_passes: 1024,
            bandwidth: Bandwidth::Auto,
            test_ratio: 0.8,
            rtol: 5e-5,
            xtol: 0.01,
            random_seed: 0,
        }
    }
}

impl ClusteringBuilder {
    /// Creates a builder populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gradient-search neighbourhood size.
    #[must_use]
    pub fn with_neighbourhood(mut self, neighbourhood: NeighbourhoodSize) -> Self {
        self.neighbourhood = neighbourhood;
        self
    }

    /// Sets the noise threshold used for the final merge.
    #[must_use]
    pub fn with_noise_threshold(mut self, noise: f64) -> Self {
        self.noise_threshold = noise;
        self
    }

    /// Sets how many neighbours each expansion step of the merge examines.
    ///
    /// A fixed neighbourhood wider than `search_size` is rejected by
    /// [`Self::build`]. An automatic neighbourhood resolved at fit time
    /// widens the search to `nh_size` instead.
    #[must_use]
    pub fn with_search_size(mut self, search_size: usize) -> Self {
        self.search_size = search_size;
        self
    }

    /// Enables or disables the minimal zero-noise merge run before the
    /// noise-threshold merge.
    #[must_use]
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    /// Sets the margin by which a neighbour's density must exceed a point's
    /// own before it counts as denser.
    #[must_use]
    pub fn with_tie_tolerance(mut self, tolerance: f64) -> Self {
        self.tie_tolerance = tolerance;
        self
    }

    /// Caps the number of merge passes per noise threshold.
    #[must_use]
    pub fn with_max_merge_passes(mut self, passes: usize) -> Self {
        self.max_merge_passes = passes;
        self
    }

    /// Selects how the kernel bandwidth is chosen.
    #[must_use]
    pub fn with_bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Sets the fraction of points held out when selecting the bandwidth.
    #[must_use]
    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    /// Sets the relative kernel-weight tolerance of density evaluation.
    #[must_use]
    pub fn with_rtol(mut self, rtol: f64) -> Self {
        self.rtol = rtol;
        self
    }

    /// Sets the log-bandwidth tolerance of the bandwidth search.
    #[must_use]
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    /// Seeds the holdout split used for bandwidth selection.
    #[must_use]
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Validates the configuration and constructs a [`DensityClustering`].
    ///
    /// # Errors
    /// Returns [`crate::BasinError::InvalidConfiguration`] describing the
    /// first rejected option.
    ///
    /// # Examples
    /// ```
    /// use basin_core::{ClusteringBuilder, ConfigErrorCode, NeighbourhoodSize};
    ///
    /// let err = ClusteringBuilder::new()
    ///     .with_neighbourhood(NeighbourhoodSize::Fixed(30))
    ///     .with_search_size(20)
    ///     .build()
    ///     .expect_err("search_size must cover nh_size");
    /// assert_eq!(err.config_code(), Some(ConfigErrorCode::SearchSizeTooSmall));
    /// ```
    pub fn build(self) -> Result<DensityClustering> {
        self.validate()?;
        Ok(DensityClustering {
            neighbourhood: self.neighbourhood,
            noise_threshold: self.noise_threshold,
            search_size: self.search_size,
            merge: self.merge,
            tie_tolerance: self.tie_tolerance,
            max_merge_passes: self.max_merge_passes,
            bandwidth: self.bandwidth,
            test_ratio: self.test_ratio,
            rtol: self.rtol,
            xtol: self.xtol,
            random_seed: self.random_seed,
        })
    }

    fn validate(&self) -> core::result::Result<(), ConfigError> {
        let floor = match self.neighbourhood {
            NeighbourhoodSize::Fixed(size) if size < 2 => {
                return Err(ConfigError::NeighbourhoodTooSmall { got: size });
            }
            NeighbourhoodSize::Fixed(size) => size,
            NeighbourhoodSize::Auto => 2,
        };
        if self.search_size < floor {
            return Err(ConfigError::SearchSizeTooSmall {
                search_size: self.search_size,
                nh_size: floor,
            });
        }
        validate_noise(self.noise_threshold)?;
        if !(self.tie_tolerance.is_finite() && self.tie_tolerance >= 0.0) {
            return Err(ConfigError::InvalidTieTolerance {
                got: self.tie_tolerance,
            });
        }
        if self.max_merge_passes == 0 {
            return Err(ConfigError::ZeroMergePasses);
        }
        if let Bandwidth::Manual(bandwidth) = self.bandwidth
            && !(bandwidth.is_finite() && bandwidth > 0.0)
        {
            return Err(ConfigError::InvalidBandwidth { got: bandwidth });
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(ConfigError::InvalidTestRatio {
                got: self.test_ratio,
            });
        }
        if !(self.rtol > 0.0 && self.rtol <= 1.0) {
            return Err(ConfigError::InvalidPrecision {
                parameter: "rtol",
                got: self.rtol,
            });
        }
        if !(self.xtol.is_finite() && self.xtol > 0.0) {
            return Err(ConfigError::InvalidPrecision {
                parameter: "xtol",
                got: self.xtol,
            });
        }
        Ok(())
    }
}

/// Rejects noise thresholds that are negative or not finite.
pub(crate) fn validate_noise(noise: f64) -> core::result::Result<(), ConfigError> {
    if noise.is_finite() && noise >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidNoiseThreshold { got: noise })
    }
}
