//! Copies Arrow `FixedSizeList<Float32, D>` columns into row-major buffers.
use arrow_array::{Array, FixedSizeListArray, Float32Array};
use arrow_schema::{DataType, Field};

use crate::errors::DenseProviderError;

/// Returns the list width declared by `field`.
pub(crate) fn list_width(field: &Field, column: &str) -> Result<usize, DenseProviderError> {
    let DataType::FixedSizeList(child, width) = field.data_type() else {
        return Err(DenseProviderError::InvalidColumnType {
            column: column.to_owned(),
            actual: field.data_type().clone(),
        });
    };
    if child.data_type() != &DataType::Float32 {
        return Err(DenseProviderError::InvalidListValueType {
            actual: child.data_type().clone(),
        });
    }
    usize::try_from(*width).map_err(|_| DenseProviderError::InvalidDimension { actual: *width })
}

/// Appends every row of `array` to `out` and returns the row width.
///
/// `start_row` offsets row numbers in errors so multi-batch reads report
/// positions in the whole file.
pub(crate) fn append_rows(
    array: &FixedSizeListArray,
    expected: Option<usize>,
    start_row: usize,
    out: &mut Vec<f32>,
) -> Result<usize, DenseProviderError> {
    let value_type = array.value_type();
    if value_type != DataType::Float32 {
        return Err(DenseProviderError::InvalidListValueType { actual: value_type });
    }
    let dimension = usize::try_from(array.value_length()).map_err(|_| {
        DenseProviderError::InvalidDimension {
            actual: array.value_length(),
        }
    })?;
    if let Some(expected) = expected.filter(|&expected| expected != dimension) {
        return Err(DenseProviderError::InconsistentBatchDimension {
            expected,
            actual: dimension,
        });
    }

    let rows = array.len();
    let additional = rows
        .checked_mul(dimension)
        .ok_or(DenseProviderError::CapacityOverflow { rows, dimension })?;
    out.reserve(additional);
    for offset in 0..rows {
        let row = start_row + offset;
        if array.is_null(offset) {
            return Err(DenseProviderError::NullRow { row });
        }
        let list = array.value(offset);
        let floats = list
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| DenseProviderError::InvalidListValueType {
                actual: list.data_type().clone(),
            })?;
        if let Some(value_index) = (0..floats.len()).find(|&index| floats.is_null(index)) {
            return Err(DenseProviderError::NullValue { row, value_index });
        }
        out.extend(floats.values().iter().copied());
    }
    Ok(dimension)
}
