//! Errors raised while loading dense point clouds.

use arrow_schema::{ArrowError, DataType};
use basin_core::{DataSourceError, DataSourceErrorCode};
use thiserror::Error;

/// Failure to load a dense point cloud from Arrow, Parquet or text input.
#[derive(Debug, Error)]
pub enum DenseProviderError {
    /// The requested column does not exist.
    #[error("column `{column}` not found in Parquet schema")]
    ColumnNotFound {
        /// Requested column name.
        column: String,
    },
    /// The column is not a fixed-size list.
    #[error("column `{column}` must be a FixedSizeList<Float32, _> but found {actual:?}")]
    InvalidColumnType {
        /// Requested column name.
        column: String,
        /// Type found in the schema.
        actual: DataType,
    },
    /// The list items are not `Float32`.
    #[error("FixedSizeList child type must be Float32 but found {actual:?}")]
    InvalidListValueType {
        /// Item type found in the schema.
        actual: DataType,
    },
    /// The declared list width is negative.
    #[error("invalid FixedSizeList dimension {actual}")]
    InvalidDimension {
        /// Declared width.
        actual: i32,
    },
    /// A whole row is null.
    #[error("row {row} is null")]
    NullRow {
        /// Offending row.
        row: usize,
    },
    /// A coordinate is null.
    #[error("row {row} contains null value at position {value_index}")]
    NullValue {
        /// Offending row.
        row: usize,
        /// Position of the null coordinate.
        value_index: usize,
    },
    /// Record batches disagree on the list width.
    #[error("inconsistent dimensions across batches: expected {expected}, got {actual}")]
    InconsistentBatchDimension {
        /// Width of the first batch.
        expected: usize,
        /// Width of the offending batch.
        actual: usize,
    },
    /// The coordinate buffer would not fit in memory.
    #[error("matrix with {rows} rows and dimension {dimension} exceeds capacity limits")]
    CapacityOverflow {
        /// Rows in the offending batch.
        rows: usize,
        /// Coordinates per row.
        dimension: usize,
    },
    /// A text field is not a number.
    #[error("line {line}, field {field}: `{text}` is not a number")]
    Parse {
        /// One-based line number.
        line: usize,
        /// One-based field position.
        field: usize,
        /// Rejected text.
        text: String,
    },
    /// A text line holds a different number of fields than the first point.
    #[error("line {line} has {actual} fields but expected {expected}")]
    RaggedLine {
        /// One-based line number.
        line: usize,
        /// Fields on the first point line.
        expected: usize,
        /// Fields on the offending line.
        actual: usize,
    },
    /// The loaded coordinates do not form a valid point cloud.
    #[error("invalid point cloud: {0}")]
    Points(#[from] DataSourceError),
    /// Arrow rejected the input.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
    /// Parquet decoding failed.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    /// Reading the input failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl DenseProviderError {
    /// Returns the code of the underlying point-cloud validation failure.
    #[must_use]
    pub const fn data_source_code(&self) -> Option<DataSourceErrorCode> {
        match self {
            Self::Points(error) => Some(error.code()),
            _ => None,
        }
    }
}
