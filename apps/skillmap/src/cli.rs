use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::models::Population;

/// Top-level CLI parser for the `skillmap` binary.
#[derive(Debug, Parser)]
#[command(
    name = "skillmap",
    version,
    about = "Competency extraction and demand/supply matching"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Data directory (overrides SKILLMAP_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Generate competency lists for one population of source records.
    Analyze(AnalyzeArgs),
    /// Build the competency matrix, gap summaries and stats.
    Matrix(MatrixArgs),
    /// Ask the generation backend for per-industry recommendations.
    Recommend(RecommendArgs),
    /// Analyze both populations, build the matrix and recommend.
    Run(RunArgs),
    /// Extract a competency list from one raw response.
    Extract(ExtractArgs),
    /// Serve the HTTP API.
    Serve(ServeArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PopulationArg {
    Vacancies,
    Projects,
}

impl From<PopulationArg> for Population {
    fn from(value: PopulationArg) -> Self {
        match value {
            PopulationArg::Vacancies => Population::Demand,
            PopulationArg::Projects => Population::Supply,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct AnalyzeArgs {
    #[arg(long, value_enum)]
    pub population: PopulationArg,
    /// Source records (JSON array)
    #[arg(long)]
    pub input: PathBuf,
    /// Defaults to the population's file under <data-dir>/derived
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Adapter to serve for this pass
    #[arg(long)]
    pub adapter: Option<String>,
    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(Clone, Debug, Args)]
pub struct MatrixArgs {
    #[arg(long)]
    pub vacancies: Option<PathBuf>,
    #[arg(long)]
    pub projects: Option<PathBuf>,
    /// Competency whitelist (JSON array of names)
    #[arg(long)]
    pub whitelist: Option<PathBuf>,
    #[arg(long)]
    pub top_n: Option<usize>,
}

#[derive(Clone, Debug, Args)]
pub struct RecommendArgs {
    #[arg(long)]
    pub gaps: Option<PathBuf>,
    #[arg(long)]
    pub stats: Option<PathBuf>,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub vacancies_source: PathBuf,
    #[arg(long)]
    pub projects_source: PathBuf,
    #[arg(long)]
    pub whitelist: Option<PathBuf>,
    #[arg(long)]
    pub top_n: Option<usize>,
}

#[derive(Clone, Debug, Args)]
pub struct ExtractArgs {
    /// File holding the raw response; stdin when omitted
    pub input: Option<PathBuf>,
    /// Recover a JSON object instead of a competency list
    #[arg(long)]
    pub object: bool,
    /// Print the list as extracted, without normalizing
    #[arg(long, conflicts_with = "object")]
    pub raw: bool,
}

#[derive(Clone, Debug, Args)]
pub struct ServeArgs {
    /// Overrides PORT
    #[arg(long)]
    pub port: Option<u16>,
}
