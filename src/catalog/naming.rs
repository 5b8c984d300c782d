//! Names of the files produced by the processing stages.

use super::facets::Aggregation;

/// Yearly aggregate of a merged series: `<base><start>-<end>_<agg>.nc`.
pub fn merged(base: &str, start: i32, end: i32, agg: Aggregation) -> String {
    format!("{base}{start}-{end}_{agg}.nc")
}

/// Field-mean series of one city: `<base><start>-<end>_<agg>_<city>.nc`.
pub fn city_series(base: &str, start: i32, end: i32, agg: Aggregation, city: &str) -> String {
    format!("{base}{start}-{end}_{agg}_{city}.nc")
}

pub fn ensemble_mean(
    variable: &str,
    domain: &str,
    driving_model: &str,
    agg: Aggregation,
    city: &str,
) -> String {
    format!("{variable}_{domain}_{driving_model}_evaluation_ensmean_{agg}_{city}.nc")
}

/// Statistic of one scenario model, `stat` being `timmean` or `slope`.
pub fn model_statistic(
    variable: &str,
    domain: &str,
    driving_model: &str,
    rcm: &str,
    agg: Aggregation,
    stat: &str,
) -> String {
    format!("{variable}_{domain}_{driving_model}_rcp85_{rcm}_{agg}_{stat}.nc")
}

pub fn city_slope(driving_model: &str, rcm: &str, city: &str, agg: Aggregation) -> String {
    format!("{driving_model}_{rcm}_{city}_{agg}_slope.nc")
}

/// Slope table stem; callers add `.csv` or `.parquet`.
pub fn slope_table(domain: &str, variable: &str, agg: Aggregation) -> String {
    format!("{domain}_{variable}_{agg}")
}
