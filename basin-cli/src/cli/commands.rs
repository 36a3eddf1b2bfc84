//! `basin run`: argument types, execution and rendering.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use basin_core::{
    Bandwidth, BasinError, ClusteringBuilder, ClusteringResult, DataSource, DensityClustering,
    NeighbourhoodSize, NonContiguousClusterIds,
};
use basin_providers_dense::{DensePointCloud, DenseProviderError};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

use super::schedule::NoiseSchedule;

const DEFAULT_NOISE_THRESHOLD: f64 = 0.5;
const DEFAULT_SEARCH_SIZE: usize = 20;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "basin", about = "Density-peak clustering of dense point clouds.")]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Cluster a point cloud and print one label per point.
    Run(RunCommand),
}

/// Options accepted by the `run` command.
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Neighbours examined by the gradient search, self included: `auto` or a count.
    #[arg(long = "nh-size", default_value = "auto", value_parser = parse_neighbourhood)]
    pub nh_size: NeighbourhoodSize,

    /// Noise threshold below which competing peaks are merged.
    #[arg(long, default_value_t = DEFAULT_NOISE_THRESHOLD)]
    pub eta: f64,

    /// Neighbours examined per expansion step while merging.
    #[arg(long = "search-size", default_value_t = DEFAULT_SEARCH_SIZE)]
    pub search_size: usize,

    /// Skip the zero-noise merge of plateau peaks.
    #[arg(long = "no-merge")]
    pub no_merge: bool,

    /// Kernel bandwidth: `auto` or a positive number.
    #[arg(long, default_value = "auto", value_parser = parse_bandwidth)]
    pub bandwidth: Bandwidth,

    /// Seed for the bandwidth holdout split.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Noise schedule `START:STOP:STEP` for a cluster hierarchy.
    #[arg(long = "coarse-grain")]
    pub coarse_grain: Option<NoiseSchedule>,

    /// Data source configuration.
    #[command(subcommand)]
    pub source: RunSource,
}

impl RunCommand {
    fn clustering(&self) -> Result<DensityClustering, BasinError> {
        ClusteringBuilder::new()
            .with_neighbourhood(self.nh_size)
            .with_noise_threshold(self.eta)
            .with_search_size(self.search_size)
            .with_merge(!self.no_merge)
            .with_bandwidth(self.bandwidth)
            .with_random_seed(self.seed)
            .build()
    }
}

/// Point-cloud inputs.
#[derive(Debug, Subcommand, Clone)]
pub enum RunSource {
    /// Delimited text, one point per line.
    Text(TextArgs),
    /// A Parquet `FixedSizeList<Float32, D>` column.
    Parquet(ParquetArgs),
}

/// Text ingestion arguments.
#[derive(Debug, Args, Clone)]
pub struct TextArgs {
    /// Path to the text file.
    pub path: PathBuf,

    /// Field delimiter; commas and whitespace when omitted.
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Override name for the data source (defaults to the file stem).
    #[arg(long)]
    pub name: Option<String>,
}

/// Parquet ingestion arguments.
#[derive(Debug, Args, Clone)]
pub struct ParquetArgs {
    /// Path to the Parquet file.
    pub path: PathBuf,

    /// Column containing `FixedSizeList<Float32, D>` rows.
    #[arg(long)]
    pub column: String,

    /// Override name for the data source (defaults to the file stem).
    #[arg(long)]
    pub name: Option<String>,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The input file could not be opened.
    #[error("failed to open `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// Point-cloud ingestion failed.
    #[error(transparent)]
    Dense(#[from] DenseProviderError),
    /// Clustering failed.
    #[error(transparent)]
    Core(#[from] BasinError),
    /// The fitted labels do not form contiguous clusters.
    #[error(transparent)]
    Labels(#[from] NonContiguousClusterIds),
}

/// One coarse-graining level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSummary {
    /// Noise threshold of the level.
    pub noise: f64,
    /// Clusters surviving at that threshold.
    pub clusters: usize,
}

/// Outcome of executing a CLI command.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Name reported by the data source.
    pub data_source: String,
    /// Kernel bandwidth used for density estimation.
    pub bandwidth: Option<f64>,
    /// Labels at the `--eta` threshold.
    pub result: ClusteringResult,
    /// Hierarchy levels, empty unless `--coarse-grain` was given.
    pub levels: Vec<LevelSummary>,
    /// Threshold at which the cluster count last changed.
    pub max_noise: Option<f64>,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading the input or clustering fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use basin_cli::cli::{Cli, Command, RunCommand, RunSource, TextArgs, run_cli};
/// # use basin_core::{Bandwidth, NeighbourhoodSize};
/// # use tempfile::NamedTempFile;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let file = NamedTempFile::new()?;
/// std::fs::write(file.path(), "0\n0.1\n0.2\n5\n5.1\n5.2\n")?;
/// let cli = Cli {
///     command: Command::Run(RunCommand {
///         nh_size: NeighbourhoodSize::Fixed(3),
///         eta: 0.0,
///         search_size: 3,
///         no_merge: false,
///         bandwidth: Bandwidth::Manual(0.3),
///         seed: 0,
///         coarse_grain: None,
///         source: RunSource::Text(TextArgs {
///             path: file.path().to_path_buf(),
///             delimiter: None,
///             name: None,
///         }),
///     }),
/// };
/// let summary = run_cli(cli)?;
/// assert_eq!(summary.result.assignments().len(), 6);
/// assert_eq!(summary.result.cluster_count(), 2);
/// # Ok(())
/// # }
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Run(run) => {
            Span::current().record("command", field::display("run"));
            run_command(run)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(source = field::Empty, eta = command.eta, coarse_grain = command.coarse_grain.is_some()),
)]
pub(super) fn run_command(command: RunCommand) -> Result<ExecutionSummary, CliError> {
    let clustering = command.clustering()?;
    let span = Span::current();
    let cloud = match &command.source {
        RunSource::Text(args) => {
            span.record("source", field::display("text"));
            load_text(args)?
        }
        RunSource::Parquet(args) => {
            span.record("source", field::display("parquet"));
            load_parquet(args)?
        }
    };
    let summary = cluster(&clustering, &cloud, command.coarse_grain)?;
    info!(
        data_source = summary.data_source.as_str(),
        points = cloud.len(),
        clusters = summary.result.cluster_count(),
        "command completed"
    );
    Ok(summary)
}

fn cluster(
    clustering: &DensityClustering,
    cloud: &DensePointCloud,
    schedule: Option<NoiseSchedule>,
) -> Result<ExecutionSummary, CliError> {
    let mut model = clustering.fit(cloud)?;
    let result = model.result()?;
    let (levels, max_noise) = match schedule {
        Some(schedule) => {
            let hierarchy = model.coarse_grain(cloud, schedule.thresholds())?;
            let levels = hierarchy
                .levels()
                .iter()
                .map(|level| LevelSummary {
                    noise: level.noise,
                    clusters: level.cluster_count(),
                })
                .collect();
            (levels, Some(hierarchy.max_noise()))
        }
        None => (Vec::new(), None),
    };
    Ok(ExecutionSummary {
        data_source: cloud.name().to_owned(),
        bandwidth: model.bandwidth(),
        result,
        levels,
        max_noise,
    })
}

#[instrument(
    name = "cli.load_text",
    err,
    skip(args),
    fields(path = %args.path.display(), delimiter = field::Empty),
)]
pub(super) fn load_text(args: &TextArgs) -> Result<DensePointCloud, CliError> {
    if let Some(delimiter) = args.delimiter {
        Span::current().record("delimiter", field::debug(delimiter));
    }
    let name = derive_data_source_name(&args.path, args.name.as_deref());
    let reader = BufReader::new(open(&args.path)?);
    Ok(DensePointCloud::try_from_text_reader(
        name,
        reader,
        args.delimiter,
    )?)
}

#[instrument(
    name = "cli.load_parquet",
    err,
    skip(args),
    fields(path = %args.path.display(), column = args.column.as_str()),
)]
pub(super) fn load_parquet(args: &ParquetArgs) -> Result<DensePointCloud, CliError> {
    let name = derive_data_source_name(&args.path, args.name.as_deref());
    let file = open(&args.path)?;
    Ok(DensePointCloud::try_from_parquet_reader(
        name,
        file,
        &args.column,
    )?)
}

fn open(path: &Path) -> Result<File, CliError> {
    File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(super) fn derive_data_source_name(path: &Path, override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_owned();
    }

    path.file_stem()
        .and_then(|value| value.to_str())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "data_source".to_owned())
}

pub(super) fn parse_neighbourhood(raw: &str) -> Result<NeighbourhoodSize, String> {
    if raw.eq_ignore_ascii_case("auto") {
        return Ok(NeighbourhoodSize::Auto);
    }
    raw.parse()
        .map(NeighbourhoodSize::Fixed)
        .map_err(|_| format!("expected `auto` or a neighbour count, found `{raw}`"))
}

pub(super) fn parse_bandwidth(raw: &str) -> Result<Bandwidth, String> {
    if raw.eq_ignore_ascii_case("auto") {
        return Ok(Bandwidth::Auto);
    }
    raw.parse()
        .map(Bandwidth::Manual)
        .map_err(|_| format!("expected `auto` or a bandwidth, found `{raw}`"))
}

/// Renders `summary` as text.
///
/// A header names the source, cluster count and bandwidth, followed by one
/// `index<TAB>label` row per point. With a hierarchy, one
/// `noise<TAB>clusters` row per level and the maximum noise follow.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use basin_cli::cli::{ExecutionSummary, render_summary};
/// # use basin_core::ClusteringResult;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let summary = ExecutionSummary {
///     data_source: "demo".into(),
///     bandwidth: Some(0.5),
///     result: ClusteringResult::try_from_labels(&[0, 1], vec![0, 1])?,
///     levels: Vec::new(),
///     max_noise: None,
/// };
/// let mut buffer = Vec::new();
/// render_summary(&summary, &mut buffer)?;
/// assert_eq!(
///     String::from_utf8(buffer)?,
///     "data source: demo\nclusters: 2\nbandwidth: 0.5\n0\t0\n1\t1\n"
/// );
/// # Ok(())
/// # }
/// ```
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "data source: {}", summary.data_source)?;
    writeln!(writer, "clusters: {}", summary.result.cluster_count())?;
    match summary.bandwidth {
        Some(bandwidth) => writeln!(writer, "bandwidth: {bandwidth}")?,
        None => writeln!(writer, "bandwidth: precomputed")?,
    }
    for (index, cluster) in summary.result.assignments().iter().enumerate() {
        writeln!(writer, "{index}\t{}", cluster.get())?;
    }
    if summary.levels.is_empty() {
        return Ok(());
    }
    writeln!(writer, "hierarchy:")?;
    for level in &summary.levels {
        writeln!(writer, "{}\t{}", level.noise, level.clusters)?;
    }
    if let Some(max_noise) = summary.max_noise {
        writeln!(writer, "max noise: {max_noise}")?;
    }
    Ok(())
}
