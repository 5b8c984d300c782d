mod catalog;
mod cli;
mod config;
mod download;
mod errors;
mod parquet;
mod registry;
mod report;
mod tool;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{
    command::{self, Context},
    Cli, Commands,
};
use config::Config;
use download::SearchQuery;
use env_logger::Env;
use log::error;
use registry::CityRegistry;
use report::Report;
use tool::SystemRunner;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().filter_or("CORDEX_LOG_LEVEL", "info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) if report.has_failures() => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Report> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.paths.data_root = root;
    }
    let registry = CityRegistry::load(config.cities.as_deref())?;
    let ctx = Context::new(config, registry);
    let mut runner = SystemRunner;

    let report = match cli.command {
        Commands::Download(args) => command::download(&ctx, &SearchQuery::from(&args), &mut runner).await?,
        Commands::DownloadAll {
            domains,
            variables,
            time_frequency,
        } => command::download_all(&ctx, &domains, &variables, &time_frequency, &mut runner).await?,
        Commands::Reorganise { action, dry_run } => command::reorganise(&ctx, action, dry_run)?,
        Commands::Preprocess { stage, selection } => command::preprocess(&ctx, stage, &selection, &mut runner)?,
        Commands::Trend { step, selection } => command::trend(&ctx, step, &selection, &mut runner)?,
        Commands::FixMonthFormat { path, dry_run } => command::fix_month_format(&path, dry_run)?,
        Commands::Resolve(args) => {
            println!("{}", command::resolve(&ctx, &args)?.display());
            return Ok(Report::new());
        }
        Commands::List {
            domains,
            variables,
            time_frequencies,
        } => {
            for dataset in command::list(&ctx, &domains, &variables, &time_frequencies)? {
                println!("{}", dataset);
            }
            return Ok(Report::new());
        }
    };

    report.log_summary();

    Ok(report)
}
