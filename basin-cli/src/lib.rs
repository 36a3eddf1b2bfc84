//! Support library for the `basin` binary.
//!
//! Exposes argument parsing, command execution and logging set-up so tests
//! can drive the pipeline without spawning a process.

pub mod cli;
pub mod logging;
