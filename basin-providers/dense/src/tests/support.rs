//! Builders for in-memory Arrow arrays and Parquet files.
use std::sync::Arc;

use arrow_array::{ArrayRef, FixedSizeListArray, Float32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use parquet::arrow::arrow_writer::ArrowWriter;

pub(crate) fn list_array(rows: &[Vec<f32>], dimension: usize) -> FixedSizeListArray {
    assert!(rows.iter().all(|row| row.len() == dimension));
    let values = Float32Array::from_iter_values(rows.iter().flatten().copied());
    FixedSizeListArray::new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        i32::try_from(dimension).expect("dimension fits in i32"),
        Arc::new(values) as ArrayRef,
        None,
    )
}

pub(crate) fn points_field(dimension: usize) -> Field {
    Field::new(
        "points",
        DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float32, true)),
            i32::try_from(dimension).expect("dimension fits in i32"),
        ),
        true,
    )
}

/// Writes `batches`, all sharing the schema of the first, as one Parquet file.
pub(crate) fn parquet_bytes(batches: &[RecordBatch]) -> Bytes {
    let schema = batches.first().expect("at least one batch").schema();
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, None).expect("writer");
    for batch in batches {
        writer.write(batch).expect("write");
    }
    writer.close().expect("close");
    Bytes::from(buffer)
}

pub(crate) fn points_batch(rows: &[Vec<f32>], dimension: usize) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![points_field(dimension)]));
    RecordBatch::try_new(schema, vec![Arc::new(list_array(rows, dimension)) as ArrayRef])
        .expect("batch")
}
