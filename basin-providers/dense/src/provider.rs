//! Dense point cloud backed by a contiguous row-major buffer.
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use arrow_array::{Array, FixedSizeListArray, RecordBatchReader};
use basin_core::{DataSource, DataSourceError};
use parquet::{
    arrow::{ProjectionMask, arrow_reader::ParquetRecordBatchReaderBuilder},
    file::reader::ChunkReader,
};

use crate::{
    errors::DenseProviderError,
    ingest::{append_rows, list_width},
    text::read_delimited,
};

/// Finite `f32` points of one fixed dimension.
///
/// Every constructor rejects empty inputs, zero-width points and NaN or
/// infinite coordinates, so clustering never sees them.
///
/// # Examples
/// ```
/// use basin_core::DataSource;
/// use basin_providers_dense::DensePointCloud;
///
/// let cloud = DensePointCloud::try_from_rows("demo", vec![vec![0.0, 0.0], vec![3.0, 4.0]])?;
/// assert_eq!(cloud.len(), 2);
/// assert_eq!(cloud.dimension(), 2);
/// assert_eq!(cloud.distance(0, 1)?, 5.0);
/// # Ok::<(), basin_core::DataSourceError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DensePointCloud {
    name: String,
    dimension: usize,
    values: Vec<f32>,
}

impl DensePointCloud {
    /// Wraps a row-major buffer of `dimension`-wide points.
    ///
    /// # Errors
    /// Returns [`DataSourceError::ZeroDimension`], [`DataSourceError::EmptyData`],
    /// [`DataSourceError::DimensionMismatch`] when the buffer length is not a
    /// multiple of `dimension`, or [`DataSourceError::NonFinite`].
    pub fn try_new(
        name: impl Into<String>,
        dimension: usize,
        values: Vec<f32>,
    ) -> Result<Self, DataSourceError> {
        if dimension == 0 {
            return Err(DataSourceError::ZeroDimension);
        }
        if values.is_empty() {
            return Err(DataSourceError::EmptyData);
        }
        let trailing = values.len() % dimension;
        if trailing != 0 {
            return Err(DataSourceError::DimensionMismatch {
                left: dimension,
                right: trailing,
            });
        }
        if let Some((offset, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(DataSourceError::NonFinite {
                row: offset / dimension,
                column: offset % dimension,
                value,
            });
        }
        Ok(Self {
            name: name.into(),
            dimension,
            values,
        })
    }

    /// Builds a cloud from one vector per point.
    ///
    /// # Errors
    /// Returns [`DataSourceError::DimensionMismatch`] for ragged rows and every
    /// error of [`Self::try_new`].
    pub fn try_from_rows(
        name: impl Into<String>,
        rows: Vec<Vec<f32>>,
    ) -> Result<Self, DataSourceError> {
        let Some(dimension) = rows.first().map(Vec::len) else {
            return Err(DataSourceError::EmptyData);
        };
        if let Some(row) = rows.iter().find(|row| row.len() != dimension) {
            return Err(DataSourceError::DimensionMismatch {
                left: dimension,
                right: row.len(),
            });
        }
        Self::try_new(name, dimension, rows.into_iter().flatten().collect())
    }

    /// Returns the row-major coordinate buffer.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.values
    }

    /// Loads points from an Arrow [`FixedSizeListArray`].
    ///
    /// # Errors
    /// Returns [`DenseProviderError`] for non-`Float32` items, null rows or
    /// coordinates, and invalid point clouds.
    pub fn try_from_fixed_size_list(
        name: impl Into<String>,
        array: &FixedSizeListArray,
    ) -> Result<Self, DenseProviderError> {
        let mut values = Vec::new();
        let dimension = append_rows(array, None, 0, &mut values)?;
        Ok(Self::try_new(name, dimension, values)?)
    }

    /// Loads points from a Parquet column of `FixedSizeList<Float32, D>` rows.
    ///
    /// # Errors
    /// Returns [`DenseProviderError::Io`] when the file cannot be opened and
    /// every error of [`Self::try_from_parquet_reader`].
    pub fn try_from_parquet_path(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        column: &str,
    ) -> Result<Self, DenseProviderError> {
        let file = File::open(path)?;
        Self::try_from_parquet_reader(name, file, column)
    }

    /// Loads points from Parquet data, reading only `column`.
    ///
    /// # Errors
    /// Returns [`DenseProviderError::ColumnNotFound`] for unknown columns,
    /// type and null errors from the column, and invalid point clouds.
    pub fn try_from_parquet_reader<R>(
        name: impl Into<String>,
        reader: R,
        column: &str,
    ) -> Result<Self, DenseProviderError>
    where
        R: ChunkReader + 'static,
    {
        let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
        let mask = ProjectionMask::columns(builder.parquet_schema(), [column]);
        let batches = builder.with_projection(mask).build()?;
        let schema = batches.schema();
        let index = schema
            .index_of(column)
            .map_err(|_| DenseProviderError::ColumnNotFound {
                column: column.to_owned(),
            })?;
        let dimension = list_width(schema.field(index), column)?;

        let mut values = Vec::new();
        let mut rows = 0_usize;
        for batch in batches {
            let batch = batch?;
            let array = batch.column(index);
            let list = array
                .as_any()
                .downcast_ref::<FixedSizeListArray>()
                .ok_or_else(|| DenseProviderError::InvalidColumnType {
                    column: column.to_owned(),
                    actual: array.data_type().clone(),
                })?;
            append_rows(list, Some(dimension), rows, &mut values)?;
            rows += list.len();
        }
        Ok(Self::try_new(name, dimension, values)?)
    }

    /// Loads points from a delimited text file.
    ///
    /// # Errors
    /// Returns [`DenseProviderError::Io`] when the file cannot be read and
    /// every error of [`Self::try_from_text_reader`].
    pub fn try_from_text_path(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        delimiter: Option<char>,
    ) -> Result<Self, DenseProviderError> {
        let file = File::open(path)?;
        Self::try_from_text_reader(name, BufReader::new(file), delimiter)
    }

    /// Loads points from delimited text, one point per line.
    ///
    /// Fields are split on `delimiter`, or on commas and whitespace when
    /// `None`. Blank lines and `#` comments are skipped.
    ///
    /// # Errors
    /// Returns [`DenseProviderError::Parse`] for non-numeric fields,
    /// [`DenseProviderError::RaggedLine`] for lines of different widths, and
    /// invalid point clouds.
    ///
    /// # Examples
    /// ```
    /// use basin_core::DataSource;
    /// use basin_providers_dense::DensePointCloud;
    ///
    /// let text = "# x, y\n0.5, 1.0\n2.0 3.0\n";
    /// let cloud = DensePointCloud::try_from_text_reader("demo", text.as_bytes(), None)?;
    /// assert_eq!(cloud.point(1)?, &[2.0, 3.0]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_from_text_reader<R: BufRead>(
        name: impl Into<String>,
        reader: R,
        delimiter: Option<char>,
    ) -> Result<Self, DenseProviderError> {
        let (values, dimension) = read_delimited(reader, delimiter)?;
        if values.is_empty() {
            return Err(DataSourceError::EmptyData.into());
        }
        Ok(Self::try_new(name, dimension, values)?)
    }
}

impl DataSource for DensePointCloud {
    fn len(&self) -> usize {
        self.values.len() / self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn point(&self, index: usize) -> Result<&[f32], DataSourceError> {
        index
            .checked_mul(self.dimension)
            .and_then(|start| self.values.get(start..start.checked_add(self.dimension)?))
            .ok_or(DataSourceError::OutOfBounds { index })
    }
}
