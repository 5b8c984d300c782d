//! Searches ESGF and downloads the datasets that are not on disk yet.

use std::fs;

use anyhow::{Context as _, Result};
use log::{info, warn};

use super::Context;
use crate::{
    catalog::experiment,
    cli::{create_progress_bar, create_spinner, DownloadArgs},
    download::{count_nc_files, script_invocation, DatasetDoc, DownloadPlan, SearchClient, SearchQuery},
    report::Report,
    tool::{run_checked, Runner},
};

impl From<&DownloadArgs> for SearchQuery {
    fn from(args: &DownloadArgs) -> Self {
        SearchQuery {
            domains: args.domains.clone(),
            variables: args.variables.clone(),
            time_frequencies: args.time_frequencies.clone(),
            experiments: args.experiments.clone(),
            driving_models: args.driving_models.clone(),
            rcm_names: args.rcm_names.clone(),
        }
    }
}

pub async fn download<R: Runner + ?Sized>(ctx: &Context, query: &SearchQuery, runner: &mut R) -> Result<Report> {
    let client = SearchClient::new(&ctx.config.search);
    download_with(ctx, &client, query, runner).await
}

/// Downloads the historical, scenario and evaluation runs of the given
/// domains and variables.
pub async fn download_all<R: Runner + ?Sized>(
    ctx: &Context,
    domains: &[String],
    variables: &[String],
    time_frequency: &str,
    runner: &mut R,
) -> Result<Report> {
    let query = SearchQuery {
        domains: domains.to_vec(),
        variables: variables.to_vec(),
        time_frequencies: vec![time_frequency.to_string()],
        experiments: experiment::ALL.iter().map(|e| e.to_string()).collect(),
        ..SearchQuery::default()
    };

    download(ctx, &query, runner).await
}

async fn download_with<R: Runner + ?Sized>(
    ctx: &Context,
    client: &SearchClient,
    query: &SearchQuery,
    runner: &mut R,
) -> Result<Report> {
    let spinner = create_spinner("Searching ESGF...".to_string());
    let (hits, datasets) = client.search(query).await.context("ESGF search failed")?;
    spinner.finish_and_clear();

    let mut report = Report::new();
    if hits == 0 {
        info!("No models matching search arguments.");
        return Ok(report);
    }
    info!("Number of datasets matching search arguments: {}", hits);

    let pb = create_progress_bar(datasets.len() as u64, "Downloading datasets".to_string());
    for dataset in &datasets {
        let result = download_dataset(ctx, client, dataset, runner, &mut report).await;
        if let Err(e) = result {
            report.fail(dataset.id.clone(), e);
        }
        pb.inc(1);
    }
    pb.finish_with_message("Datasets downloaded");

    Ok(report)
}

async fn download_dataset<R: Runner + ?Sized>(
    ctx: &Context,
    client: &SearchClient,
    dataset: &DatasetDoc,
    runner: &mut R,
    report: &mut Report,
) -> Result<()> {
    let facets = dataset.facets()?;
    let dir = facets.path(ctx.data_root());
    info!("Saving files to: {}", dir.display());
    fs::create_dir_all(&dir).with_context(|| format!("Cannot create {}", dir.display()))?;

    let present = count_nc_files(&dir)?;
    match DownloadPlan::new(present, dataset.number_of_files) {
        DownloadPlan::AlreadyDownloaded => {
            info!("Files already downloaded.");
            report.skip(facets.to_string(), "already downloaded");
        }
        DownloadPlan::Mismatch { present, expected } => {
            warn!(
                "Files in directory != files to download ({} present, {} expected)",
                present, expected
            );
            report.skip(facets.to_string(), "partially downloaded");
        }
        DownloadPlan::Fetch => {
            info!("Downloading {} files.", dataset.number_of_files);

            let script = tempfile::Builder::new()
                .prefix("download-")
                .suffix(".sh")
                .tempfile()?;
            let spinner = create_spinner(format!("Fetching script for {}", facets));
            client
                .fetch_to_file(client.script_url(&dataset.id)?, script.path(), &spinner)
                .await?;
            spinner.finish_and_clear();

            run_checked(runner, &script_invocation(&ctx.config.search.shell, script.path(), &dir))?;
            report.complete();
        }
    }

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        cli::command::testing::{context, touch},
        config,
        download::testing::{client, search_body, serve},
        tool::testing::RecordingRunner,
    };

    fn search_client(base: &str) -> SearchClient {
        let search = config::Search {
            node: base.to_string(),
            ..config::Search::default()
        };
        SearchClient::with_client(client(), &search)
    }

    #[tokio::test]
    async fn should_fetch_only_missing_datasets() {
        let done = ["mon", "EUR-44", "pr", "rcp85", "MPI-M-MPI-ESM-LR", "RCA4"];
        let partial = ["mon", "EUR-44", "pr", "rcp85", "ICHEC-EC-EARTH", "RACMO22E"];
        let missing = ["mon", "EUR-44", "pr", "historical", "MPI-M-MPI-ESM-LR", "RCA4"];
        let base = serve(vec![
            (
                200,
                search_body(3, &[("done", 1, done), ("partial", 3, partial), ("missing", 2, missing)]),
            ),
            (200, "#!/bin/bash\n".to_string()),
        ]);

        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        touch(&done.iter().fold(ctx.data_root().to_path_buf(), |p, f| p.join(f)), &["a.nc"]);
        touch(&partial.iter().fold(ctx.data_root().to_path_buf(), |p, f| p.join(f)), &["a.nc"]);

        let mut runner = RecordingRunner::default();
        let report = download_with(&ctx, &search_client(&base), &SearchQuery::default(), &mut runner)
            .await
            .unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(!report.has_failures());

        assert_eq!(runner.invocations.len(), 1);
        let inv = &runner.invocations[0];
        let target = missing.iter().fold(ctx.data_root().to_path_buf(), |p, f| p.join(f));
        assert_eq!(inv.program, "bash");
        assert_eq!(inv.current_dir.as_deref(), Some(target.as_path()));
        assert!(inv.args[0].contains("download-"));
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn should_report_no_hits() {
        let base = serve(vec![(200, search_body(0, &[]))]);
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let mut runner = RecordingRunner::default();
        let report = download_with(&ctx, &search_client(&base), &SearchQuery::default(), &mut runner)
            .await
            .unwrap();

        assert_eq!(report, Report::new());
        assert!(runner.invocations.is_empty());
    }

    #[tokio::test]
    async fn should_record_failing_script() {
        let missing = ["mon", "AUS-44", "tasmax", "evaluation", "ECMWF-ERAINT", "WRF360J"];
        let base = serve(vec![
            (200, search_body(1, &[("missing", 4, missing)])),
            (200, "exit 1\n".to_string()),
        ]);
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let mut runner = RecordingRunner::failing_on("bash");
        let report = download_with(&ctx, &search_client(&base), &SearchQuery::default(), &mut runner)
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].context, "missing");
    }

    #[test]
    fn should_build_query_from_arguments() {
        let args = DownloadArgs {
            domains: vec!["EUR-44".to_string()],
            variables: vec!["pr".to_string()],
            time_frequencies: vec!["mon".to_string()],
            experiments: vec!["rcp85".to_string()],
            driving_models: Vec::new(),
            rcm_names: Vec::new(),
        };
        let query = SearchQuery::from(&args);

        assert_eq!(query.domains, vec!["EUR-44"]);
        assert_eq!(query.experiments, vec!["rcp85"]);
        assert!(query.rcm_names.is_empty());
    }
}
