//! Error types for the basin core library.
//!
//! Defines the error enums exposed by the public API, their stable
//! machine-readable codes, and a convenient result alias.

use std::{fmt, sync::Arc};

use thiserror::Error;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? $( ( $($tuple:tt)* ) )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? $( ( $($tuple)* ) )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// An error produced by [`crate::DataSource`] operations.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DataSourceError {
    /// Requested index was outside the source's bounds.
    #[error("index {index} is out of bounds")]
    OutOfBounds {
        /// The requested row that exceeded the source bounds.
        index: usize,
    },
    /// Compared vectors had different dimensions.
    #[error("dimension mismatch: left={left}, right={right}")]
    DimensionMismatch {
        /// Dimensionality of the left-hand vector.
        left: usize,
        /// Dimensionality of the right-hand vector.
        right: usize,
    },
    /// Data source contained no rows.
    #[error("data source contains no rows")]
    EmptyData,
    /// Data source rows must have positive dimension.
    #[error("data source vectors must have positive dimension")]
    ZeroDimension,
    /// A coordinate was NaN or infinite.
    #[error("row {row} contains a non-finite value at column {column}: {value}")]
    NonFinite {
        /// Row holding the offending coordinate.
        row: usize,
        /// Column of the offending coordinate.
        column: usize,
        /// The rejected value.
        value: f32,
    },
}

define_error_codes! {
    /// Stable codes describing [`DataSourceError`] variants.
    enum DataSourceErrorCode for DataSourceError {
        /// Requested index was outside the source's bounds.
        OutOfBounds => OutOfBounds { .. } => "DATA_SOURCE_OUT_OF_BOUNDS",
        /// Compared vectors had different dimensions.
        DimensionMismatch => DimensionMismatch { .. } => "DATA_SOURCE_DIMENSION_MISMATCH",
        /// Data source contained no rows.
        EmptyData => EmptyData => "DATA_SOURCE_EMPTY",
        /// Data source rows must have positive dimension.
        ZeroDimension => ZeroDimension => "DATA_SOURCE_ZERO_DIMENSION",
        /// A coordinate was NaN or infinite.
        NonFinite => NonFinite { .. } => "DATA_SOURCE_NON_FINITE",
    }
}

/// Rejected clustering configuration.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The gradient search needs at least one neighbour besides the point itself.
    #[error("nh_size must be at least 2 (got {got})")]
    NeighbourhoodTooSmall {
        /// The rejected neighbourhood size.
        got: usize,
    },
    /// Noise thresholds must be finite and non-negative.
    #[error("noise threshold must be finite and non-negative (got {got})")]
    InvalidNoiseThreshold {
        /// The rejected threshold.
        got: f64,
    },
    /// The extended search must look at least as far as the gradient search.
    #[error("search_size {search_size} must be at least nh_size {nh_size}")]
    SearchSizeTooSmall {
        /// Configured extended search size.
        search_size: usize,
        /// Configured neighbourhood size.
        nh_size: usize,
    },
    /// The density tie tolerance must be finite and non-negative.
    #[error("tie tolerance must be finite and non-negative (got {got})")]
    InvalidTieTolerance {
        /// The rejected tolerance.
        got: f64,
    },
    /// The merge pass cap must allow at least one pass.
    #[error("max_merge_passes must be at least 1")]
    ZeroMergePasses,
    /// A manually supplied kernel bandwidth was not a positive finite number.
    #[error("bandwidth must be finite and positive (got {got})")]
    InvalidBandwidth {
        /// The rejected bandwidth.
        got: f64,
    },
    /// The holdout ratio must leave points on both sides of the split.
    #[error("test ratio must lie strictly between 0 and 1 (got {got})")]
    InvalidTestRatio {
        /// The rejected ratio.
        got: f64,
    },
    /// A precision parameter was not a positive finite number.
    #[error("{parameter} must be finite and positive (got {got})")]
    InvalidPrecision {
        /// Name of the parameter.
        parameter: &'static str,
        /// The rejected value.
        got: f64,
    },
    /// Coarse-graining was requested without any threshold.
    #[error("coarse-graining requires at least one noise threshold")]
    EmptyNoiseSchedule,
}

define_error_codes! {
    /// Stable codes describing [`ConfigError`] variants.
    enum ConfigErrorCode for ConfigError {
        /// The gradient search needs at least one neighbour besides the point itself.
        NeighbourhoodTooSmall => NeighbourhoodTooSmall { .. } => "CONFIG_NEIGHBOURHOOD_TOO_SMALL",
        /// Noise thresholds must be finite and non-negative.
        InvalidNoiseThreshold => InvalidNoiseThreshold { .. } => "CONFIG_INVALID_NOISE_THRESHOLD",
        /// The extended search must look at least as far as the gradient search.
        SearchSizeTooSmall => SearchSizeTooSmall { .. } => "CONFIG_SEARCH_SIZE_TOO_SMALL",
        /// The density tie tolerance must be finite and non-negative.
        InvalidTieTolerance => InvalidTieTolerance { .. } => "CONFIG_INVALID_TIE_TOLERANCE",
        /// The merge pass cap must allow at least one pass.
        ZeroMergePasses => ZeroMergePasses => "CONFIG_ZERO_MERGE_PASSES",
        /// A manually supplied kernel bandwidth was invalid.
        InvalidBandwidth => InvalidBandwidth { .. } => "CONFIG_INVALID_BANDWIDTH",
        /// The holdout ratio was outside `(0, 1)`.
        InvalidTestRatio => InvalidTestRatio { .. } => "CONFIG_INVALID_TEST_RATIO",
        /// A precision parameter was invalid.
        InvalidPrecision => InvalidPrecision { .. } => "CONFIG_INVALID_PRECISION",
        /// Coarse-graining was requested without any threshold.
        EmptyNoiseSchedule => EmptyNoiseSchedule => "CONFIG_EMPTY_NOISE_SCHEDULE",
    }
}

/// Errors raised by a neighbour oracle or while validating its output.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum NeighbourError {
    /// `k` must be positive and no larger than the number of points.
    #[error("cannot query {k} neighbours from {items} points")]
    InvalidK {
        /// Requested neighbour count.
        k: usize,
        /// Points available in the source.
        items: usize,
    },
    /// Index and distance tables disagree on their number of rows.
    #[error("neighbour table has {indices} index rows but {distances} distance rows")]
    RowCountMismatch {
        /// Rows in the index table.
        indices: usize,
        /// Rows in the distance table.
        distances: usize,
    },
    /// A row did not hold exactly `k` entries.
    #[error("neighbour row {row} has {actual} entries but {expected} were expected")]
    RaggedRow {
        /// Offending row.
        row: usize,
        /// Expected row width.
        expected: usize,
        /// Observed row width.
        actual: usize,
    },
    /// Column zero of a row must be the point itself.
    #[error("neighbour row {row} starts with {found} instead of the point itself")]
    MissingSelf {
        /// Offending row.
        row: usize,
        /// Index found in column zero.
        found: usize,
    },
    /// A neighbour index referenced a point outside the table.
    #[error("neighbour row {row} references point {index} but only {items} points exist")]
    IndexOutOfRange {
        /// Offending row.
        row: usize,
        /// Out-of-range index.
        index: usize,
        /// Number of points in the table.
        items: usize,
    },
    /// Distances were negative, non-finite, or not in ascending order.
    #[error("neighbour row {row} has invalid or unsorted distances at column {column}")]
    InvalidDistances {
        /// Offending row.
        row: usize,
        /// Column where the violation was detected.
        column: usize,
    },
    /// The underlying data source failed while computing distances.
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}

define_error_codes! {
    /// Stable codes describing [`NeighbourError`] variants.
    enum NeighbourErrorCode for NeighbourError {
        /// `k` must be positive and no larger than the number of points.
        InvalidK => InvalidK { .. } => "NEIGHBOURS_INVALID_K",
        /// Index and distance tables disagree on their number of rows.
        RowCountMismatch => RowCountMismatch { .. } => "NEIGHBOURS_ROW_COUNT_MISMATCH",
        /// A row did not hold exactly `k` entries.
        RaggedRow => RaggedRow { .. } => "NEIGHBOURS_RAGGED_ROW",
        /// Column zero of a row must be the point itself.
        MissingSelf => MissingSelf { .. } => "NEIGHBOURS_MISSING_SELF",
        /// A neighbour index referenced a point outside the table.
        IndexOutOfRange => IndexOutOfRange { .. } => "NEIGHBOURS_INDEX_OUT_OF_RANGE",
        /// Distances were invalid or unsorted.
        InvalidDistances => InvalidDistances { .. } => "NEIGHBOURS_INVALID_DISTANCES",
        /// The underlying data source failed.
        DataSource => DataSource(..) => "NEIGHBOURS_DATA_SOURCE",
    }
}

/// Errors raised by a density oracle.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DensityError {
    /// Not enough points to fit or to split into training and holdout sets.
    #[error("density estimation needs at least {required} points (got {items})")]
    InsufficientSamples {
        /// Points available.
        items: usize,
        /// Points required.
        required: usize,
    },
    /// The model and the scored points live in different spaces.
    #[error("model dimension {model} does not match point dimension {points}")]
    DimensionMismatch {
        /// Dimension of the fitted model.
        model: usize,
        /// Dimension of the scored points.
        points: usize,
    },
    /// The bandwidth search failed to produce a usable value.
    #[error("bandwidth selection did not produce a finite bandwidth")]
    BandwidthSelectionFailed,
    /// The underlying data source failed.
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}

define_error_codes! {
    /// Stable codes describing [`DensityError`] variants.
    enum DensityErrorCode for DensityError {
        /// Not enough points.
        InsufficientSamples => InsufficientSamples { .. } => "DENSITY_INSUFFICIENT_SAMPLES",
        /// Model and points differ in dimension.
        DimensionMismatch => DimensionMismatch { .. } => "DENSITY_DIMENSION_MISMATCH",
        /// The bandwidth search failed.
        BandwidthSelectionFailed => BandwidthSelectionFailed => "DENSITY_BANDWIDTH_SELECTION_FAILED",
        /// The underlying data source failed.
        DataSource => DataSource(..) => "DENSITY_DATA_SOURCE",
    }
}

/// How the gradient forest was found to be broken.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ForestViolation {
    /// Following parent pointers revisited a point.
    Cycle,
    /// Two centers reached the same point during label propagation.
    LabelCollision,
    /// A parent edge does not climb in density.
    DensityNotIncreasing,
    /// A point is not reachable from any accepted center.
    Unassigned,
}

impl fmt::Display for ForestViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cycle => "cycle",
            Self::LabelCollision => "label collision",
            Self::DensityNotIncreasing => "parent density does not increase",
            Self::Unassigned => "point unreachable from accepted centers",
        })
    }
}

/// Error type produced when configuring or running a density clustering.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BasinError {
    /// The configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    /// The supplied [`crate::DataSource`] contained no items.
    #[error("data source `{data_source}` contains no items")]
    EmptySource {
        /// Identifier for the empty data source.
        data_source: Arc<str>,
    },
    /// The [`crate::DataSource`] is smaller than the configured neighbourhood.
    #[error("data source `{data_source}` has {items} items but nh_size requires {nh_size}")]
    InsufficientItems {
        /// Identifier for the data source.
        data_source: Arc<str>,
        /// Number of items available.
        items: usize,
        /// Neighbourhood size requested.
        nh_size: usize,
    },
    /// A [`crate::DataSource`] operation failed while running the algorithm.
    #[error("data source `{data_source}` failed: {error}")]
    DataSource {
        /// Identifier for the data source that produced the error.
        data_source: Arc<str>,
        #[source]
        /// Underlying data source error.
        error: DataSourceError,
    },
    /// The density oracle failed.
    #[error("density estimation failed: {0}")]
    Density(#[source] DensityError),
    /// The neighbour oracle failed or returned a malformed table.
    #[error("neighbour search failed: {0}")]
    Neighbours(#[source] NeighbourError),
    /// Densities and the neighbour table describe different point counts.
    #[error("received {densities} densities for {items} points")]
    DensityLengthMismatch {
        /// Number of density values.
        densities: usize,
        /// Number of points in the neighbour table.
        items: usize,
    },
    /// A density value was NaN or infinite.
    #[error("density of point {index} is not finite: {value}")]
    NonFiniteDensity {
        /// Offending point.
        index: usize,
        /// Offending value.
        value: f64,
    },
    /// The neighbour table is narrower than the gradient search requires.
    #[error("nh_size {nh_size} exceeds the {k} neighbours available per point")]
    NeighbourhoodExceedsTable {
        /// Configured neighbourhood size.
        nh_size: usize,
        /// Neighbours per point in the table.
        k: usize,
    },
    /// An extended neighbourhood contained no point carrying a center label.
    #[error("extended neighbourhood of center {center} holds no labelled point")]
    InconsistentGraph {
        /// Candidate center under examination.
        center: usize,
    },
    /// No density peak exists.
    #[error("no candidate cluster center was found")]
    EmptyClusterSet,
    /// The gradient forest violated one of its structural invariants.
    #[error("gradient forest invariant violated at point {point}: {violation}")]
    ForestInvariant {
        /// Point where the violation was detected.
        point: usize,
        /// Which invariant failed.
        violation: ForestViolation,
    },
    /// Stability merging did not reach a fixed point within the pass cap.
    #[error("stability merging at noise {noise} did not converge after {passes} passes")]
    ConvergenceFailed {
        /// Noise threshold being merged.
        noise: f64,
        /// Passes executed before giving up.
        passes: usize,
    },
}

define_error_codes! {
    /// Stable codes describing [`BasinError`] variants.
    enum BasinErrorCode for BasinError {
        /// The configuration was rejected.
        InvalidConfiguration => InvalidConfiguration(..) => "BASIN_INVALID_CONFIGURATION",
        /// The supplied [`crate::DataSource`] contained no items.
        EmptySource => EmptySource { .. } => "BASIN_EMPTY_SOURCE",
        /// The data source is smaller than the neighbourhood.
        InsufficientItems => InsufficientItems { .. } => "BASIN_INSUFFICIENT_ITEMS",
        /// A [`crate::DataSource`] operation failed.
        DataSourceFailure => DataSource { .. } => "BASIN_DATA_SOURCE_FAILURE",
        /// The density oracle failed.
        DensityFailure => Density(..) => "BASIN_DENSITY_FAILURE",
        /// The neighbour oracle failed.
        NeighbourFailure => Neighbours(..) => "BASIN_NEIGHBOUR_FAILURE",
        /// Densities and neighbours disagree on the point count.
        DensityLengthMismatch => DensityLengthMismatch { .. } => "BASIN_DENSITY_LENGTH_MISMATCH",
        /// A density value was not finite.
        NonFiniteDensity => NonFiniteDensity { .. } => "BASIN_NON_FINITE_DENSITY",
        /// The neighbour table is too narrow.
        NeighbourhoodExceedsTable => NeighbourhoodExceedsTable { .. } => "BASIN_NEIGHBOURHOOD_EXCEEDS_TABLE",
        /// An extended neighbourhood held no labelled point.
        InconsistentGraph => InconsistentGraph { .. } => "BASIN_INCONSISTENT_GRAPH",
        /// No density peak exists.
        EmptyClusterSet => EmptyClusterSet => "BASIN_EMPTY_CLUSTER_SET",
        /// The gradient forest is broken.
        ForestInvariant => ForestInvariant { .. } => "BASIN_FOREST_INVARIANT",
        /// Stability merging did not converge.
        ConvergenceFailed => ConvergenceFailed { .. } => "BASIN_CONVERGENCE_FAILED",
    }
}

impl BasinError {
    /// Retrieve the inner [`ConfigErrorCode`] when the configuration was rejected.
    #[must_use]
    pub const fn config_code(&self) -> Option<ConfigErrorCode> {
        match self {
            Self::InvalidConfiguration(error) => Some(error.code()),
            _ => None,
        }
    }

    /// Retrieve the inner [`DataSourceErrorCode`] when the error originated in a [`crate::DataSource`].
    #[must_use]
    pub const fn data_source_code(&self) -> Option<DataSourceErrorCode> {
        match self {
            Self::DataSource { error, .. }
            | Self::Neighbours(NeighbourError::DataSource(error))
            | Self::Density(DensityError::DataSource(error)) => Some(error.code()),
            _ => None,
        }
    }

    pub(crate) fn data_source(name: &str, error: DataSourceError) -> Self {
        Self::DataSource {
            data_source: Arc::from(name),
            error,
        }
    }
}

impl From<NeighbourError> for BasinError {
    fn from(error: NeighbourError) -> Self {
        Self::Neighbours(error)
    }
}

impl From<DensityError> for BasinError {
    fn from(error: DensityError) -> Self {
        Self::Density(error)
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, BasinError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BasinError::EmptyClusterSet, "BASIN_EMPTY_CLUSTER_SET")]
    #[case(BasinError::InconsistentGraph { center: 3 }, "BASIN_INCONSISTENT_GRAPH")]
    #[case(
        BasinError::ConvergenceFailed { noise: 0.5, passes: 9 },
        "BASIN_CONVERGENCE_FAILED"
    )]
    #[case(
        BasinError::InvalidConfiguration(ConfigError::ZeroMergePasses),
        "BASIN_INVALID_CONFIGURATION"
    )]
    fn basin_codes_are_stable(#[case] error: BasinError, #[case] expected: &str) {
        assert_eq!(error.code().as_str(), expected);
    }

    #[test]
    fn config_code_is_exposed_for_configuration_errors() {
        let error = BasinError::from(ConfigError::NeighbourhoodTooSmall { got: 1 });
        assert_eq!(
            error.config_code(),
            Some(ConfigErrorCode::NeighbourhoodTooSmall)
        );
        assert_eq!(BasinError::EmptyClusterSet.config_code(), None);
    }

    #[rstest]
    #[case(BasinError::data_source("demo", DataSourceError::EmptyData))]
    #[case(BasinError::Neighbours(NeighbourError::DataSource(DataSourceError::EmptyData)))]
    #[case(BasinError::Density(DensityError::DataSource(DataSourceError::EmptyData)))]
    fn data_source_code_unwraps_nested_failures(#[case] error: BasinError) {
        assert_eq!(error.data_source_code(), Some(DataSourceErrorCode::EmptyData));
    }

    #[test]
    fn forest_invariant_message_names_violation() {
        let error = BasinError::ForestInvariant {
            point: 7,
            violation: ForestViolation::LabelCollision,
        };
        assert_eq!(
            error.to_string(),
            "gradient forest invariant violated at point 7: label collision"
        );
    }
}
