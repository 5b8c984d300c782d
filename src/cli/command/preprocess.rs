//! Pre-processing stages of a domain: combined series, city series, baseline
//! means and trend slopes.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use log::{info, warn};
use tempfile::TempDir;

use super::{selected_variables, Context};
use crate::{
    catalog::{
        experiment,
        listing::{file_paths, find_file, first_file, last_file},
        naming, Aggregation, DatasetFileName, Level, Product, Traversal,
    },
    cli::{create_progress_bar, PreprocessStage, Selection},
    config::YearSpan,
    errors::CatalogError,
    registry::City,
    report::Report,
    tool::{run_checked, Operator, Runner},
};

/// Directory of the evaluation ensemble mean, next to the rcm runs.
pub const ENSMEAN: &str = "ensmean";

/// `<root>/<tf>/<domain>/<var>` and what it belongs to.
pub struct VariableDir<'a> {
    pub ctx: &'a Context,
    pub domain: &'a str,
    pub variable: &'a str,
    pub path: PathBuf,
}

impl VariableDir<'_> {
    pub fn product(&self, product: Product) -> PathBuf {
        self.path.join(product.dir_name())
    }

    pub fn experiment(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

pub fn preprocess<R: Runner + ?Sized>(
    ctx: &Context,
    stage: PreprocessStage,
    selection: &Selection,
    runner: &mut R,
) -> Result<Report> {
    let domain_dir = ctx.domain_dir(selection);
    let variables = selected_variables(&domain_dir, selection)?;

    let mut report = Report::new();
    let cities = match stage {
        PreprocessStage::Timeseries => {
            let cities = ctx.registry.select(&selection.domain, &selection.cities)?;
            cities.report_unknown(&mut report);
            cities.found
        }
        _ => Vec::new(),
    };

    let pb = create_progress_bar(
        variables.len() as u64,
        format!("Pre-processing {}", selection.domain),
    );

    for variable in &variables {
        let var = VariableDir {
            ctx,
            domain: &selection.domain,
            variable,
            path: domain_dir.join(variable),
        };
        info!("{:?} stage for {}", stage, var.path.display());

        let result = match stage {
            PreprocessStage::Evaluation => combine_evaluation(&var, runner, &mut report),
            PreprocessStage::Rcp => combine_rcp85(&var, runner, &mut report),
            PreprocessStage::Timeseries => city_timeseries(&var, &cities, runner, &mut report)
                .and_then(|_| evaluation_ensemble_mean(&var, &cities, runner, &mut report)),
            PreprocessStage::Slope => means_and_slopes(&var, runner, &mut report),
        };
        if let Err(e) = result {
            report.fail(var.path.display().to_string(), e);
        }

        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(report)
}

/// Runs a `cdo` operator chain, creating the directories of the outputs.
pub fn produce<R: Runner + ?Sized>(
    ctx: &Context,
    runner: &mut R,
    operators: &[Operator],
    inputs: &[PathBuf],
    outputs: &[PathBuf],
) -> Result<()> {
    for output in outputs {
        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir)?;
        }
    }

    run_checked(runner, &ctx.cdo.chain(operators, inputs, outputs))?;

    Ok(())
}

/// Base name shared by the files of a dataset directory.
pub fn base_name(dir: &Path) -> Result<String> {
    Ok(DatasetFileName::parse(&first_file(dir)?)?.base)
}

/// First file of `dir` that belongs to the `agg` series.
fn aggregated_file(dir: &Path, agg: Aggregation) -> Result<PathBuf, CatalogError> {
    let name = find_file(dir, agg.as_str(), |name| name.contains(agg.as_str()))?;
    Ok(dir.join(name))
}

fn combine_evaluation<R: Runner + ?Sized>(var: &VariableDir, runner: &mut R, report: &mut Report) -> Result<()> {
    let driver = var.ctx.config.analysis.evaluation_driver.as_str();
    let runs = Traversal::new(var.experiment(experiment::EVALUATION).join(driver), &[Level::RcmName])
        .with_context(Level::DrivingModel, driver)
        .collect()?;

    for run in runs {
        let rcm = run.facet(Level::RcmName);
        let label = format!("{}/{}/{}", var.variable, driver, rcm);

        let (base, span, inputs) = match evaluation_inputs(&run.path) {
            Ok(inputs) => inputs,
            Err(e) => {
                report.fail(label, e);
                continue;
            }
        };

        let out_dir = var.product(Product::CombinedEval).join(driver).join(rcm);
        for agg in Aggregation::for_variable(var.variable) {
            let output = out_dir.join(naming::merged(&base, span.start, span.end, agg));
            let result = produce(
                var.ctx,
                runner,
                &[agg.into(), Operator::MergeTime],
                &inputs,
                &[output],
            );
            report.record(format!("{} {}", label, agg), result);
        }
    }

    Ok(())
}

/// Base name, covered years and files of an evaluation run.
fn evaluation_inputs(dir: &Path) -> Result<(String, YearSpan, Vec<PathBuf>)> {
    let first = DatasetFileName::parse(&first_file(dir)?)?;
    let last = DatasetFileName::parse(&last_file(dir)?)?;
    let span = YearSpan::new(first.start_year(), last.end_year());

    Ok((first.base, span, file_paths(dir)?))
}

fn combine_rcp85<R: Runner + ?Sized>(var: &VariableDir, runner: &mut R, report: &mut Report) -> Result<()> {
    let span = var.ctx.config.analysis.scenario_span;
    let runs = Traversal::new(
        var.experiment(experiment::RCP85),
        &[Level::DrivingModel, Level::RcmName],
    )
    .with_context(Level::Experiment, experiment::RCP85)
    .collect()?;

    for run in runs {
        let gcm = run.facet(Level::DrivingModel);
        let rcm = run.facet(Level::RcmName);
        let label = format!("{}/{}/{}", var.variable, gcm, rcm);
        let historical = var.experiment(experiment::HISTORICAL).join(gcm).join(rcm);

        let inputs = scenario_inputs(&historical, &run.path, span);
        let (base, inputs) = match inputs {
            Ok(inputs) => inputs,
            Err(e) => {
                report.fail(label, e);
                continue;
            }
        };

        let out_dir = var.product(Product::CombinedRcp85).join(gcm).join(rcm);
        for agg in Aggregation::for_variable(var.variable) {
            let output = out_dir.join(naming::merged(&base, span.start, span.end, agg));
            let result = produce(
                var.ctx,
                runner,
                &[agg.into(), Operator::MergeTime],
                &inputs,
                &[output],
            );
            report.record(format!("{} {}", label, agg), result);
        }
    }

    Ok(())
}

/// Base name of the scenario run and the historical followed by the scenario
/// files.
///
/// The combined series is always named after `span`; a run that covers other
/// years is reported.
fn scenario_inputs(historical: &Path, scenario: &Path, span: YearSpan) -> Result<(String, Vec<PathBuf>)> {
    let base = base_name(scenario)?;

    let historical_files = file_paths(historical)?;
    let scenario_files = file_paths(scenario)?;

    let start = DatasetFileName::parse(&first_file(historical)?)?.start_year();
    let end = DatasetFileName::parse(&last_file(scenario)?)?.end_year();
    if start != span.start || end != span.end {
        warn!(
            "{} covers {}-{} but is combined as {}-{}",
            scenario.display(),
            start,
            end,
            span.start,
            span.end
        );
    }

    Ok((base, [historical_files, scenario_files].concat()))
}

/// Where a city series comes from.
struct SeriesSource {
    driving_model: String,
    rcm: String,
    /// Raw experiment directory, for the base name.
    raw: PathBuf,
    /// Directory of the combined yearly series.
    combined: PathBuf,
    /// Years to keep; the span of the combined file when `None`.
    span: Option<YearSpan>,
}

fn series_sources(var: &VariableDir) -> Result<Vec<SeriesSource>> {
    let analysis = &var.ctx.config.analysis;
    let driver = analysis.evaluation_driver.as_str();
    let mut sources = Vec::new();

    let combined_rcp85 = var.product(Product::CombinedRcp85);
    if combined_rcp85.is_dir() {
        let combined = Traversal::new(&combined_rcp85, &[Level::DrivingModel]).collect()?;
        let driving_models: Vec<String> = combined
            .iter()
            .map(|leaf| leaf.facet(Level::DrivingModel).to_string())
            .collect();

        let runs = Traversal::new(
            var.experiment(experiment::RCP85),
            &[Level::DrivingModel, Level::RcmName],
        )
        .only(Level::DrivingModel, &driving_models)
        .collect()?;

        for run in runs {
            let gcm = run.facet(Level::DrivingModel);
            let rcm = run.facet(Level::RcmName);
            sources.push(SeriesSource {
                driving_model: gcm.to_string(),
                rcm: rcm.to_string(),
                raw: run.path.clone(),
                combined: combined_rcp85.join(gcm).join(rcm),
                span: Some(analysis.scenario_span),
            });
        }
    }

    let evaluation = var.experiment(experiment::EVALUATION).join(driver);
    if evaluation.is_dir() {
        let runs = Traversal::new(&evaluation, &[Level::RcmName])
            .except(Level::RcmName, ENSMEAN)
            .collect()?;

        for run in runs {
            let rcm = run.facet(Level::RcmName);
            sources.push(SeriesSource {
                driving_model: driver.to_string(),
                rcm: rcm.to_string(),
                raw: run.path.clone(),
                combined: var.product(Product::CombinedEval).join(driver).join(rcm),
                span: None,
            });
        }
    }

    if sources.is_empty() {
        warn!("No combined series under {}", var.path.display());
    }

    Ok(sources)
}

fn city_timeseries<R: Runner + ?Sized>(
    var: &VariableDir,
    cities: &[&City],
    runner: &mut R,
    report: &mut Report,
) -> Result<()> {
    let analysis = &var.ctx.config.analysis;

    for source in series_sources(var)? {
        let label = format!("{}/{}/{}", var.variable, source.driving_model, source.rcm);
        if analysis.is_excluded(var.domain, var.variable, &source.rcm) {
            report.skip(label, "excluded model");
            continue;
        }

        let base = match base_name(&source.raw) {
            Ok(base) => base,
            Err(e) => {
                report.fail(label, e);
                continue;
            }
        };

        let out_dir = var
            .product(Product::Timeseries)
            .join(&source.driving_model)
            .join(&source.rcm);

        for agg in Aggregation::for_variable(var.variable) {
            let input = match aggregated_file(&source.combined, agg) {
                Ok(input) => input,
                Err(CatalogError::NoMatch { .. }) => {
                    report.skip(format!("{} {}", label, agg), "no combined series");
                    continue;
                }
                Err(e) => {
                    report.fail(format!("{} {}", label, agg), e);
                    continue;
                }
            };

            let span = match source.span {
                Some(span) => span,
                None => {
                    let name = input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                    match DatasetFileName::parse(&name) {
                        Ok(f) => YearSpan::new(f.start_year(), f.end_year()),
                        Err(e) => {
                            report.fail(format!("{} {}", label, agg), e);
                            continue;
                        }
                    }
                }
            };

            for city in cities {
                let mut operators = vec![Operator::FldMean, Operator::SelYear(span.start, span.end)];
                if let Some((lat, lon)) = city.location() {
                    operators.push(Operator::around(lat, lon, analysis.city_box));
                }

                let output = out_dir.join(naming::city_series(&base, span.start, span.end, agg, &city.code));
                let result = produce(var.ctx, runner, &operators, &[input.clone()], &[output]);
                report.record(format!("{} {} {}", label, agg, city.code), result);
            }
        }
    }

    Ok(())
}

/// Ensemble mean of the evaluation city series over all regional models.
fn evaluation_ensemble_mean<R: Runner + ?Sized>(
    var: &VariableDir,
    cities: &[&City],
    runner: &mut R,
    report: &mut Report,
) -> Result<()> {
    let driver = var.ctx.config.analysis.evaluation_driver.as_str();
    let series_dir = var.product(Product::Timeseries).join(driver);
    if !series_dir.is_dir() {
        return Ok(());
    }

    let runs = Traversal::new(&series_dir, &[Level::RcmName])
        .except(Level::RcmName, ENSMEAN)
        .collect()?;
    let out_dir = series_dir.join(ENSMEAN);

    for city in cities {
        for agg in Aggregation::for_variable(var.variable) {
            let label = format!("{}/{}/{} {} {}", var.variable, driver, ENSMEAN, agg, city.code);
            let suffix = [agg.as_str(), city.code.as_str()];

            let mut inputs = Vec::new();
            for run in &runs {
                let found = find_file(&run.path, &suffix.join("_"), |name| {
                    DatasetFileName::parse(name).is_ok_and(|f| f.has_suffix(&suffix))
                });
                match found {
                    Ok(name) => inputs.push(run.path.join(name)),
                    Err(e) => warn!("{}", e),
                }
            }

            if inputs.is_empty() {
                report.skip(label, "no evaluation series");
                continue;
            }

            let output = out_dir.join(naming::ensemble_mean(var.variable, var.domain, driver, agg, &city.code));
            let result = produce(var.ctx, runner, &[Operator::EnsMean], &inputs, &[output]);
            report.record(label, result);
        }
    }

    Ok(())
}

fn means_and_slopes<R: Runner + ?Sized>(var: &VariableDir, runner: &mut R, report: &mut Report) -> Result<()> {
    let analysis = &var.ctx.config.analysis;
    let runs = Traversal::new(
        var.product(Product::CombinedRcp85),
        &[Level::DrivingModel, Level::RcmName],
    )
    .collect()?;

    // trend writes the intercept too; it is not kept
    let scratch = TempDir::new()?;

    for run in runs {
        let gcm = run.facet(Level::DrivingModel);
        let rcm = run.facet(Level::RcmName);

        for agg in Aggregation::for_variable(var.variable) {
            let label = format!("{}/{}/{} {}", var.variable, gcm, rcm, agg);
            let input = match aggregated_file(&run.path, agg) {
                Ok(input) => input,
                Err(e) => {
                    report.fail(label, e);
                    continue;
                }
            };

            let name = |stat: &str| naming::model_statistic(var.variable, var.domain, gcm, rcm, agg, stat);
            let timmean = var.product(Product::Timmean).join(gcm).join(rcm).join(name("timmean"));
            let slope = var.product(Product::Slope).join(gcm).join(rcm).join(name("slope"));
            let intercept = scratch.path().join(name("intercept"));

            let baseline = analysis.baseline;
            let trend = analysis.trend;
            let result = produce(
                var.ctx,
                runner,
                &[Operator::TimMean, Operator::SelYear(baseline.start, baseline.end)],
                &[input.clone()],
                &[timmean],
            )
            .and_then(|_| {
                produce(
                    var.ctx,
                    runner,
                    &[Operator::Trend, Operator::SelYear(trend.start, trend.end)],
                    &[input],
                    &[intercept, slope],
                )
            });
            report.record(label, result);
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
        cli::command::testing::{context, selection, touch},
        tool::testing::RecordingRunner,
    };

    const HIST: &str = "pr_EUR-44_MPI-M-MPI-ESM-LR_historical_r1i1p1_SMHI-RCA4_v1_mon_";
    const RCP: &str = "pr_EUR-44_MPI-M-MPI-ESM-LR_rcp85_r1i1p1_SMHI-RCA4_v1_mon_";

    fn eur_pr(ctx: &Context) -> PathBuf {
        ctx.data_root().join("mon/EUR-44/pr")
    }

    fn scenario_tree(ctx: &Context) {
        let var = eur_pr(ctx);
        touch(
            &var.join("historical/MPI-M-MPI-ESM-LR/RCA4"),
            &[
                &format!("{HIST}195001-195012.nc"),
                &format!("{HIST}195101-196012.nc"),
            ],
        );
        touch(
            &var.join("rcp85/MPI-M-MPI-ESM-LR/RCA4"),
            &[
                &format!("{RCP}200601-201012.nc"),
                &format!("{RCP}209101-210012.nc"),
            ],
        );
    }

    #[test]
    fn should_combine_historical_and_scenario_runs() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        scenario_tree(&ctx);

        let mut runner = RecordingRunner::default();
        let report = preprocess(&ctx, PreprocessStage::Rcp, &selection("EUR-44", Some("pr")), &mut runner).unwrap();

        assert_eq!(report.completed, 2);
        assert!(!report.has_failures());

        let var = eur_pr(&ctx);
        let out = var.join("combined_rcp85/MPI-M-MPI-ESM-LR/RCA4");
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("cdo -L -yearmax -mergetime "));
        assert!(lines[0].ends_with(&format!(
            "{} {}",
            var.join("rcp85/MPI-M-MPI-ESM-LR/RCA4").join(format!("{RCP}209101-210012.nc")).display(),
            out.join(format!("{RCP}1950-2100_yearmax.nc")).display()
        )));
        assert!(lines[1].ends_with(&format!("{RCP}1950-2100_yearsum.nc")));

        // historical files come first
        let args = &runner.invocations[0].args;
        assert!(args[3].ends_with(&format!("{HIST}195001-195012.nc")));
        assert!(out.is_dir());
    }

    #[test]
    fn should_name_evaluation_series_after_raw_files() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let var = ctx.data_root().join("mon/AUS-44/tasmax");
        let base = "tasmax_AUS-44_ECMWF-ERAINT_evaluation_r1i1p1_UNSW-WRF360J_v1_mon_";
        touch(
            &var.join("evaluation/ECMWF-ERAINT/WRF360J"),
            &[&format!("{base}197901-198012.nc"), &format!("{base}198101-199012.nc"), ".DS_Store"],
        );

        let mut runner = RecordingRunner::default();
        let report = preprocess(&ctx, PreprocessStage::Evaluation, &selection("AUS-44", None), &mut runner).unwrap();

        assert_eq!(report.completed, 1);
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].contains(".DS_Store"));
        assert!(lines[0].ends_with(&format!(
            "combined_eval/ECMWF-ERAINT/WRF360J/{base}1979-1990_yearmax.nc"
        )));
    }

    fn combined_tree(ctx: &Context) {
        scenario_tree(ctx);
        let var = eur_pr(ctx);
        touch(
            &var.join("combined_rcp85/MPI-M-MPI-ESM-LR/RCA4"),
            &[&format!("{RCP}1950-2100_yearmax.nc"), &format!("{RCP}1950-2100_yearsum.nc")],
        );
    }

    #[test]
    fn should_skip_unknown_city_and_continue_after_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        combined_tree(&ctx);

        let mut sel = selection("EUR-44", Some("pr"));
        sel.cities = vec!["wr".to_string(), "xyz".to_string(), "ldn".to_string()];
        let mut runner = RecordingRunner::failing_on("_yearmax_ldn.nc");

        let report = preprocess(&ctx, PreprocessStage::Timeseries, &sel, &mut runner).unwrap();

        // wr and ldn for both aggregations, nothing for xyz
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|l| !l.contains("xyz")));
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].context.ends_with("yearmax ldn"));
        assert_eq!(report.completed, 3);

        let wr = lines.iter().find(|l| l.ends_with("_yearmax_wr.nc")).unwrap();
        assert!(wr.contains("-fldmean -selyear,1950/2100 "));
        assert!(!wr.contains("sellonlatbox"));
        assert!(wr.ends_with(&format!("timeseries/MPI-M-MPI-ESM-LR/RCA4/{RCP}1950-2100_yearmax_wr.nc")));

        let ldn = lines.iter().find(|l| l.ends_with("_yearsum_ldn.nc")).unwrap();
        assert!(ldn.contains("-fldmean -selyear,1950/2100 -sellonlatbox,"));
    }

    #[test]
    fn should_extract_evaluation_series_over_combined_span() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let var = eur_pr(&ctx);
        let base = "pr_EUR-44_ECMWF-ERAINT_evaluation_r1i1p1_SMHI-RCA4_v1_mon_";
        touch(&var.join("evaluation/ECMWF-ERAINT/RCA4"), &[&format!("{base}197901-201212.nc")]);
        touch(
            &var.join("evaluation/ECMWF-ERAINT/ensmean"),
            &["pr_EUR-44_ECMWF-ERAINT_evaluation_ensmean_197901-201212.nc"],
        );
        touch(
            &var.join("combined_eval/ECMWF-ERAINT/RCA4"),
            &[&format!("{base}1979-2012_yearmax.nc")],
        );

        let mut sel = selection("EUR-44", Some("pr"));
        sel.cities = vec!["ldn".to_string()];
        let mut runner = RecordingRunner::default();

        let report = preprocess(&ctx, PreprocessStage::Timeseries, &sel, &mut runner).unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("-fldmean -selyear,1979/2012 -sellonlatbox,"));
        assert!(lines[0].contains(&format!("combined_eval/ECMWF-ERAINT/RCA4/{base}1979-2012_yearmax.nc ")));
        assert!(lines[0].ends_with(&format!("timeseries/ECMWF-ERAINT/RCA4/{base}1979-2012_yearmax_ldn.nc")));
        assert!(lines.iter().all(|l| !l.contains("ensmean")));
        assert_eq!(report.completed, 1);
        // no yearsum series, and no city series to average yet
        assert!(!report.has_failures());
    }

    #[test]
    fn should_fail_missing_combined_dir_but_skip_missing_series() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        scenario_tree(&ctx);
        let var = eur_pr(&ctx);
        touch(
            &var.join("rcp85/MPI-M-MPI-ESM-LR/RACMO22E"),
            &["pr_EUR-44_MPI-M-MPI-ESM-LR_rcp85_r1i1p1_KNMI-RACMO22E_v1_mon_200601-210012.nc"],
        );
        touch(
            &var.join("combined_rcp85/MPI-M-MPI-ESM-LR/RCA4"),
            &[&format!("{RCP}1950-2100_yearmax.nc")],
        );

        let mut sel = selection("EUR-44", Some("pr"));
        sel.cities = vec!["wr".to_string()];
        let mut runner = RecordingRunner::default();

        let report = preprocess(&ctx, PreprocessStage::Timeseries, &sel, &mut runner).unwrap();

        assert_eq!(runner.invocations.len(), 1);
        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped, vec!["pr/MPI-M-MPI-ESM-LR/RCA4 yearsum".to_string()]);
        let failed: Vec<&str> = report.failures.iter().map(|f| f.context.as_str()).collect();
        assert_eq!(
            failed,
            vec!["pr/MPI-M-MPI-ESM-LR/RACMO22E yearmax", "pr/MPI-M-MPI-ESM-LR/RACMO22E yearsum"]
        );
    }

    #[test]
    fn should_count_unknown_cities_as_skipped() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        combined_tree(&ctx);

        let mut sel = selection("EUR-44", Some("pr"));
        sel.cities = vec!["xyz".to_string()];
        let mut runner = RecordingRunner::default();

        let report = preprocess(&ctx, PreprocessStage::Timeseries, &sel, &mut runner).unwrap();

        assert!(runner.invocations.is_empty());
        assert_eq!(report.skipped, vec!["EUR-44 xyz".to_string()]);
    }

    #[test]
    fn should_fail_up_front_without_domain_dir() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let mut runner = RecordingRunner::default();
        let result = preprocess(&ctx, PreprocessStage::Rcp, &selection("EUR-44", Some("pr")), &mut runner);

        assert!(result.is_err());
        assert!(runner.invocations.is_empty());
    }

    #[test]
    fn should_skip_excluded_models() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let var = eur_pr(&ctx);
        touch(
            &var.join("rcp85/NCC-NorESM1-M/WRF331F"),
            &["pr_EUR-44_NCC-NorESM1-M_rcp85_r1i1p1_IPSL-WRF331F_v1_mon_200601-210012.nc"],
        );
        touch(
            &var.join("combined_rcp85/NCC-NorESM1-M/WRF331F"),
            &["pr_EUR-44_NCC-NorESM1-M_rcp85_r1i1p1_IPSL-WRF331F_v1_mon_1950-2100_yearmax.nc"],
        );

        let mut runner = RecordingRunner::default();
        let report = preprocess(&ctx, PreprocessStage::Timeseries, &selection("EUR-44", Some("pr")), &mut runner).unwrap();

        assert!(runner.invocations.is_empty());
        assert_eq!(report.skipped, vec!["pr/NCC-NorESM1-M/WRF331F".to_string()]);
    }

    #[test]
    fn should_average_evaluation_series_over_models() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let series = ctx.data_root().join("mon/EUR-44/tasmax/timeseries/ECMWF-ERAINT");
        touch(
            &series.join("RCA4"),
            &["tasmax_EUR-44_ECMWF-ERAINT_evaluation_r1i1p1_SMHI-RCA4_v1_mon_1989-2008_yearmax_ldn.nc"],
        );
        touch(
            &series.join("RACMO22E"),
            &[
                "tasmax_EUR-44_ECMWF-ERAINT_evaluation_r1i1p1_KNMI-RACMO22E_v1_mon_1979-2012_yearmax_ldn.nc",
                "tasmax_EUR-44_ECMWF-ERAINT_evaluation_r1i1p1_KNMI-RACMO22E_v1_mon_1979-2012_yearmax_wr.nc",
            ],
        );

        let registry = &ctx.registry;
        let ldn = registry.city("EUR-44", "ldn").unwrap();
        let var = VariableDir {
            ctx: &ctx,
            domain: "EUR-44",
            variable: "tasmax",
            path: ctx.data_root().join("mon/EUR-44/tasmax"),
        };
        let mut runner = RecordingRunner::default();
        let mut report = Report::new();

        evaluation_ensemble_mean(&var, &[ldn], &mut runner, &mut report).unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("cdo -L -ensmean "));
        assert!(lines[0].contains("RACMO22E_v1_mon_1979-2012_yearmax_ldn.nc"));
        assert!(!lines[0].contains("_wr.nc"));
        assert!(lines[0].ends_with("ensmean/tasmax_EUR-44_ECMWF-ERAINT_evaluation_ensmean_yearmax_ldn.nc"));
        assert_eq!(report.completed, 1);
    }

    #[test]
    fn should_compute_baseline_means_and_slopes() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let var = ctx.data_root().join("mon/EUR-44/tasmax");
        let combined = var.join("combined_rcp85/MPI-M-MPI-ESM-LR/RCA4");
        touch(
            &combined,
            &["tasmax_EUR-44_MPI-M-MPI-ESM-LR_rcp85_r1i1p1_SMHI-RCA4_v1_mon_1950-2100_yearmax.nc"],
        );

        let mut runner = RecordingRunner::default();
        let report = preprocess(&ctx, PreprocessStage::Slope, &selection("EUR-44", None), &mut runner).unwrap();

        assert_eq!(report.completed, 1);
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("-timmean -selyear,1981/2010 "));
        assert!(lines[0].ends_with(
            "timmean/MPI-M-MPI-ESM-LR/RCA4/tasmax_EUR-44_MPI-M-MPI-ESM-LR_rcp85_RCA4_yearmax_timmean.nc"
        ));
        assert!(lines[1].contains("-trend -selyear,2000/2100 "));
        assert!(lines[1].contains("_yearmax_intercept.nc "));
        assert!(lines[1].ends_with(
            "slope/MPI-M-MPI-ESM-LR/RCA4/tasmax_EUR-44_MPI-M-MPI-ESM-LR_rcp85_RCA4_yearmax_slope.nc"
        ));
    }

    #[test]
    fn should_record_missing_experiment() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        fs::create_dir_all(eur_pr(&ctx)).unwrap();

        let mut runner = RecordingRunner::default();
        let report = preprocess(&ctx, PreprocessStage::Rcp, &selection("EUR-44", None), &mut runner).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("not found"));
    }
}
