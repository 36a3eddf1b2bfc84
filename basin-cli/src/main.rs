//! `basin` command-line entry point.
//!
//! Parses arguments with clap, runs density clustering over the requested
//! point cloud, prints labels to stdout and maps failures to a non-zero exit
//! code. Logging is initialised first so every later step can emit
//! structured diagnostics.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use basin_cli::{
    cli::{Cli, CliError, render_summary, run_cli},
    logging::{self, LoggingError},
};
use tracing::{error, field};

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let summary = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_summary(&summary, &mut writer).context("failed to render summary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    if let Err(err) = try_main() {
        let (code, data_source_code) = match err.downcast_ref::<CliError>() {
            Some(CliError::Core(core)) => (
                Some(core.code().as_str()),
                core.data_source_code().map(|code| code.as_str()),
            ),
            Some(CliError::Dense(dense)) => {
                (None, dense.data_source_code().map(|code| code.as_str()))
            }
            _ => (None, None),
        };
        let message = format!("{err:#}");
        error!(
            error = %message,
            code = code.map(field::display),
            data_source_code = data_source_code.map(field::display),
            "command execution failed"
        );
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[expect(
    clippy::print_stderr,
    reason = "tracing is unavailable until logging initialises"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialise logging: {err}");
}
