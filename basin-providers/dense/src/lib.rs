//! Dense point-cloud provider for basin.
//!
//! Loads `f32` points from Arrow `FixedSizeList<Float32, D>` arrays, Parquet
//! columns of that type, or delimited text, and exposes them as a
//! [`basin_core::DataSource`].

mod errors;
mod ingest;
mod provider;
mod text;

pub use errors::DenseProviderError;
pub use provider::DensePointCloud;

#[cfg(test)]
mod tests;
