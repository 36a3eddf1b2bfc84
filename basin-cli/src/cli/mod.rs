//! Argument parsing and command execution for the `basin` binary.
//!
//! `basin run` loads a dense point cloud from delimited text or Parquet,
//! fits a density clustering, optionally coarse-grains it over a noise
//! schedule, and renders labels as tab-separated rows.

mod commands;
mod schedule;

pub use commands::{
    Cli, CliError, Command, ExecutionSummary, LevelSummary, ParquetArgs, RunCommand, RunSource,
    TextArgs, render_summary, run_cli,
};
pub use schedule::{MAX_LEVELS, NoiseSchedule, ScheduleError};
