use super::{
    DensePointCloud, DenseProviderError,
    support::{parquet_bytes, points_batch},
};
use arrow_array::{ArrayRef, Int32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use basin_core::DataSource;
use rstest::rstest;
use std::{io::Write, sync::Arc};

#[rstest]
fn loads_every_batch_of_the_column() {
    let bytes = parquet_bytes(&[
        points_batch(&[vec![1.0, 2.0], vec![3.0, 4.0]], 2),
        points_batch(&[vec![5.0, 6.0]], 2),
    ]);
    let cloud =
        DensePointCloud::try_from_parquet_reader("demo", bytes, "points").expect("parquet load");
    assert_eq!(cloud.len(), 3);
    assert_eq!(cloud.dimension(), 2);
    assert_eq!(cloud.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[rstest]
fn missing_columns_are_reported() {
    let bytes = parquet_bytes(&[points_batch(&[vec![1.0]], 1)]);
    let err = DensePointCloud::try_from_parquet_reader("demo", bytes, "unknown")
        .expect_err("missing column");
    assert!(matches!(
        err,
        DenseProviderError::ColumnNotFound { column } if column == "unknown"
    ));
}

#[rstest]
fn scalar_columns_are_rejected() {
    let schema = Arc::new(Schema::new(vec![Field::new("points", DataType::Int32, false)]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef],
    )
    .expect("batch");
    let err = DensePointCloud::try_from_parquet_reader("demo", parquet_bytes(&[batch]), "points")
        .expect_err("wrong type");
    assert!(matches!(err, DenseProviderError::InvalidColumnType { .. }));
}

#[rstest]
fn files_are_read_from_disk() {
    let bytes = parquet_bytes(&[points_batch(&[vec![0.5], vec![1.5]], 1)]);
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(&bytes).expect("write parquet");
    let cloud =
        DensePointCloud::try_from_parquet_path("disk", file.path(), "points").expect("load");
    assert_eq!(cloud.name(), "disk");
    assert_eq!(cloud.data(), &[0.5, 1.5]);
}

#[rstest]
fn missing_files_are_io_errors() {
    let err = DensePointCloud::try_from_parquet_path("gone", "/nonexistent/points.parquet", "points")
        .expect_err("file does not exist");
    assert!(matches!(err, DenseProviderError::Io(_)));
}
