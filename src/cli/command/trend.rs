//! Trend slopes of the city series and the tables that collect them.

use std::{fs, path::Path};

use anyhow::{Context as _, Result};
use log::{info, warn};
use tempfile::TempDir;

use super::{
    preprocess::{produce, VariableDir},
    selected_variables, Context,
};
use crate::{
    catalog::{listing::find_file, naming, Aggregation, DatasetFileName, Level, Product, Traversal},
    cli::{create_progress_bar, Selection, TrendStep},
    errors::CatalogError,
    parquet::{save_slopes, SlopeRow},
    registry::City,
    report::Report,
    tool::{cdo::first_value, run_checked, Operator, Runner},
};

pub fn trend<R: Runner + ?Sized>(
    ctx: &Context,
    step: TrendStep,
    selection: &Selection,
    runner: &mut R,
) -> Result<Report> {
    let domain_dir = ctx.domain_dir(selection);
    let variables = selected_variables(&domain_dir, selection)?;
    let cities = ctx.registry.select(&selection.domain, &selection.cities)?;

    let mut report = Report::new();
    cities.report_unknown(&mut report);
    let cities = cities.found;
    let pb = create_progress_bar(variables.len() as u64, format!("Trends of {}", selection.domain));

    for variable in &variables {
        let var = VariableDir {
            ctx,
            domain: &selection.domain,
            variable,
            path: domain_dir.join(variable),
        };

        let result = match step {
            TrendStep::PreProcess => city_slopes(&var, &cities, runner, &mut report),
            TrendStep::MakeTable => slope_tables(&var, &cities, runner, &mut report),
        };
        if let Err(e) = result {
            report.fail(var.path.display().to_string(), e);
        }

        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(report)
}

fn city_slopes<R: Runner + ?Sized>(
    var: &VariableDir,
    cities: &[&City],
    runner: &mut R,
    report: &mut Report,
) -> Result<()> {
    let analysis = &var.ctx.config.analysis;
    let runs = Traversal::new(
        var.product(Product::Timeseries),
        &[Level::DrivingModel, Level::RcmName],
    )
    .except(Level::DrivingModel, analysis.evaluation_driver.as_str())
    .collect()?;

    let scratch = TempDir::new()?;

    for run in runs {
        let gcm = run.facet(Level::DrivingModel);
        let rcm = run.facet(Level::RcmName);
        let out_dir = var.product(Product::TimeseriesSlopes).join(gcm).join(rcm);

        for city in cities {
            for agg in Aggregation::for_variable(var.variable) {
                let label = format!("{}/{}/{} {} {}", var.variable, gcm, rcm, agg, city.code);
                let suffix = [agg.as_str(), city.code.as_str()];
                let found = find_file(&run.path, &suffix.join("_"), |name| {
                    DatasetFileName::parse(name).is_ok_and(|f| f.has_suffix(&suffix))
                });
                let series = match found {
                    Ok(series) => series,
                    Err(CatalogError::NoMatch { .. }) => {
                        report.skip(label, "no city series");
                        continue;
                    }
                    Err(e) => {
                        report.fail(label, e);
                        continue;
                    }
                };

                let slope_name = naming::city_slope(gcm, rcm, &city.code, agg);
                let intercept = scratch.path().join(slope_name.replace("_slope.nc", "_intercept.nc"));
                let result = produce(
                    var.ctx,
                    runner,
                    &[Operator::Trend, Operator::SelYear(analysis.trend.start, analysis.trend.end)],
                    &[run.path.join(series)],
                    &[intercept, out_dir.join(slope_name)],
                );
                report.record(label, result);
            }
        }
    }

    Ok(())
}

fn slope_tables<R: Runner + ?Sized>(
    var: &VariableDir,
    cities: &[&City],
    runner: &mut R,
    report: &mut Report,
) -> Result<()> {
    let analysis = &var.ctx.config.analysis;
    let runs = Traversal::new(
        var.product(Product::TimeseriesSlopes),
        &[Level::DrivingModel, Level::RcmName],
    )
    .collect()?;

    let table_dir = &var.ctx.config.paths.slope_tables;
    fs::create_dir_all(table_dir)
        .with_context(|| format!("Cannot create {}", table_dir.display()))?;

    for agg in Aggregation::for_variable(var.variable) {
        let mut rows = Vec::new();

        for run in &runs {
            let gcm = run.facet(Level::DrivingModel);
            let rcm = run.facet(Level::RcmName);
            let divisor = analysis.slope_divisor(var.domain, var.variable, gcm, rcm);

            for city in cities {
                let label = format!("{}/{}/{} {} {}", var.variable, gcm, rcm, agg, city.code);
                let file = run.path.join(naming::city_slope(gcm, rcm, &city.code, agg));
                if !file.is_file() {
                    report.skip(label, "no slope file");
                    continue;
                }

                let invocation = var.ctx.cdo.values(&file);
                let value = run_checked(runner, &invocation).and_then(|outcome| first_value(&invocation, &outcome));
                if let Some(slope) = report.record(label, value) {
                    rows.push(SlopeRow {
                        driving_model: gcm.to_string(),
                        rcm: rcm.to_string(),
                        city: city.code.clone(),
                        slope: slope / divisor,
                    });
                }
            }
        }

        if rows.is_empty() {
            warn!("No slopes for {} {} {}", var.domain, var.variable, agg);
            continue;
        }

        let stem = table_dir.join(naming::slope_table(var.domain, var.variable, agg));
        let csv_path = stem.with_extension("csv");
        info!("Saving table to: {}", csv_path.display());
        save_csv(&rows, &csv_path)?;

        let parquet_path = stem.with_extension("parquet");
        info!("Saving table to: {}", parquet_path.display());
        save_slopes(&rows, &parquet_path)?;
    }

    Ok(())
}

fn save_csv(rows: &[SlopeRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
