//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Downloads, reorganises and pre-processes CORDEX regional climate model data
pub struct Cli {
    /// Configuration file (default: ./cordex.yaml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root of the data tree, overrides `paths.data_root`
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search ESGF and download every matching dataset not yet on disk
    Download(DownloadArgs),
    /// Download the historical, rcp85 and evaluation runs of domains and variables
    DownloadAll {
        #[arg(short, long = "domain", required = true)]
        domains: Vec<String>,

        #[arg(short, long = "variable", required = true)]
        variables: Vec<String>,

        #[arg(short, long)]
        time_frequency: String,
    },
    /// Move datasets between directory layouts
    Reorganise {
        #[command(subcommand)]
        action: ReorganiseAction,

        /// Log the moves without touching any file
        #[arg(long, global = true)]
        dry_run: bool,
    },
    /// Run a pre-processing stage for a domain
    Preprocess {
        #[arg(value_enum)]
        stage: PreprocessStage,

        #[command(flatten)]
        selection: Selection,
    },
    /// Compute city trend slopes and tabulate them
    Trend {
        #[arg(value_enum)]
        step: TrendStep,

        #[command(flatten)]
        selection: Selection,
    },
    /// Rename YYYYMMDD-YYYYMMDD files of a directory to YYYYMM-YYYYMM
    FixMonthFormat {
        #[arg(short, long)]
        path: PathBuf,

        #[arg(long)]
        dry_run: bool,
    },
    /// Print the directory of a dataset
    Resolve(FacetArgs),
    /// List the datasets under the data root
    List {
        #[arg(short, long = "domain")]
        domains: Vec<String>,

        #[arg(short, long = "variable")]
        variables: Vec<String>,

        #[arg(short, long = "time-frequency")]
        time_frequencies: Vec<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[arg(short, long = "domain", required = true)]
    pub domains: Vec<String>,

    #[arg(short, long = "variable", required = true)]
    pub variables: Vec<String>,

    #[arg(short, long = "time-frequency", required = true)]
    pub time_frequencies: Vec<String>,

    #[arg(short, long = "experiment", required = true)]
    pub experiments: Vec<String>,

    #[arg(short = 'g', long = "driving-model")]
    pub driving_models: Vec<String>,

    #[arg(short, long = "rcm-name")]
    pub rcm_names: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct FacetArgs {
    #[arg(short, long)]
    pub time_frequency: String,

    #[arg(short, long)]
    pub domain: String,

    #[arg(short, long)]
    pub variable: String,

    #[arg(short, long)]
    pub experiment: String,

    #[arg(short = 'g', long)]
    pub driving_model: String,

    #[arg(short, long)]
    pub rcm_name: String,
}

/// Domain and variables a stage works on.
#[derive(Args, Debug, Clone, Default)]
pub struct Selection {
    #[arg(short, long)]
    pub domain: String,

    /// Single variable; every variable of the domain when left out
    #[arg(short, long)]
    pub variable: Option<String>,

    /// Overrides `analysis.time_frequency`
    #[arg(short, long)]
    pub time_frequency: Option<String>,

    /// Subset of city codes; every city of the domain when left out
    #[arg(short, long = "city")]
    pub cities: Vec<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorganiseAction {
    /// Move the staging tree from the old variable-first layout to the canonical one
    ChangeStructure,
    /// Move the staging tree to the data root
    ToHardDrive,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessStage {
    /// Merge and aggregate the evaluation runs
    Evaluation,
    /// Merge historical and rcp85 runs and aggregate them
    Rcp,
    /// Extract city series from the combined runs
    Timeseries,
    /// Baseline means and trend slopes of the combined runs
    Slope,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendStep {
    /// Trend slope of every city series
    PreProcess,
    /// Tabulate the city slopes
    MakeTable,
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size)
        .with_message(message)
        .with_style(bar_style("[{eta_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}").progress_chars("##-"))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn should_have_consistent_arguments() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_parse_repeated_download_facets() {
        let cli = Cli::parse_from([
            "cordex", "download", "-d", "EUR-44", "-d", "AUS-44", "-v", "pr", "-t", "mon", "-e",
            "rcp85", "-g", "MPI-M-MPI-ESM-LR",
        ]);

        match cli.command {
            Commands::Download(args) => {
                assert_eq!(args.domains, vec!["EUR-44", "AUS-44"]);
                assert_eq!(args.driving_models, vec!["MPI-M-MPI-ESM-LR"]);
                assert!(args.rcm_names.is_empty());
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn should_parse_stage_names() {
        let cli = Cli::parse_from(["cordex", "--root", "/data", "trend", "make-table", "-d", "EUR-44"]);
        assert_eq!(cli.root, Some(PathBuf::from("/data")));
        assert!(matches!(
            cli.command,
            Commands::Trend {
                step: TrendStep::MakeTable,
                ..
            }
        ));

        let cli = Cli::parse_from(["cordex", "reorganise", "to-hard-drive", "--dry-run"]);
        assert!(matches!(
            cli.command,
            Commands::Reorganise {
                action: ReorganiseAction::ToHardDrive,
                dry_run: true
            }
        ));
    }

    #[test]
    fn should_track_progress() {
        let pb = create_progress_bar(4, "Moving datasets".to_string());
        pb.inc(3);

        assert_eq!(pb.length(), Some(4));
        assert_eq!(pb.position(), 3);
        pb.finish_and_clear();
    }
}
