pub(crate) use super::{DensePointCloud, DenseProviderError};

mod parquet_input;
mod support;
