//! Facet tuples and their canonical place in the data tree.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::errors::CatalogError;

/// One categorical axis of a dataset, i.e. one level of the data tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    TimeFrequency,
    Domain,
    Variable,
    Experiment,
    DrivingModel,
    RcmName,
}

impl Level {
    /// Levels in the order of the canonical directory template.
    pub const ALL: [Level; 6] = [
        Level::TimeFrequency,
        Level::Domain,
        Level::Variable,
        Level::Experiment,
        Level::DrivingModel,
        Level::RcmName,
    ];

    /// Facet name as used by the ESGF search service.
    pub fn name(&self) -> &'static str {
        match self {
            Level::TimeFrequency => "time_frequency",
            Level::Domain => "domain",
            Level::Variable => "variable",
            Level::Experiment => "experiment",
            Level::DrivingModel => "driving_model",
            Level::RcmName => "rcm_name",
        }
    }

    pub fn value<'a>(&self, facets: &'a Facets) -> &'a str {
        match self {
            Level::TimeFrequency => &facets.time_frequency,
            Level::Domain => &facets.domain,
            Level::Variable => &facets.variable,
            Level::Experiment => &facets.experiment,
            Level::DrivingModel => &facets.driving_model,
            Level::RcmName => &facets.rcm_name,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The facet values that identify a single dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Facets {
    pub time_frequency: String,
    pub domain: String,
    pub variable: String,
    pub experiment: String,
    pub driving_model: String,
    pub rcm_name: String,
}

impl Facets {
    /// Directory of the dataset below `root`:
    /// `<root>/<time_frequency>/<domain>/<variable>/<experiment>/<driving_model>/<rcm_name>`.
    ///
    /// Values are not checked against any vocabulary.
    pub fn path(&self, root: &Path) -> PathBuf {
        Level::ALL
            .iter()
            .fold(root.to_path_buf(), |path, level| path.join(level.value(self)))
    }

    /// Rejects values that would escape or collapse a directory level.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for level in Level::ALL {
            let value = level.value(self);
            if value.is_empty()
                || value == "."
                || value == ".."
                || value.contains('/')
                || value.contains(std::path::MAIN_SEPARATOR)
            {
                return Err(CatalogError::BadFacet {
                    level: level.name(),
                    value: value.to_string(),
                });
            }
        }

        Ok(())
    }
}

impl fmt::Display for Facets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}",
            self.time_frequency,
            self.domain,
            self.variable,
            self.experiment,
            self.driving_model,
            self.rcm_name
        )
    }
}

/// Named yearly reduction of a monthly series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    YearMax,
    YearSum,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::YearMax => "yearmax",
            Aggregation::YearSum => "yearsum",
        }
    }

    /// Reductions that are meaningful for a variable: precipitation is both
    /// an extreme (flood) and an accumulated (drought) hazard.
    pub fn for_variable(variable: &str) -> Vec<Aggregation> {
        if variable == "pr" {
            vec![Aggregation::YearMax, Aggregation::YearSum]
        } else {
            vec![Aggregation::YearMax]
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Experiments downloaded from ESGF.
pub mod experiment {
    pub const HISTORICAL: &str = "historical";
    pub const RCP85: &str = "rcp85";
    pub const EVALUATION: &str = "evaluation";

    /// Everything needed to build the combined scenario and evaluation series.
    pub const ALL: [&str; 3] = [HISTORICAL, RCP85, EVALUATION];
}

/// Derived products, stored at the experiment level of a variable directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    CombinedRcp85,
    CombinedEval,
    Timeseries,
    Timmean,
    Slope,
    TimeseriesSlopes,
}

impl Product {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Product::CombinedRcp85 => "combined_rcp85",
            Product::CombinedEval => "combined_eval",
            Product::Timeseries => "timeseries",
            Product::Timmean => "timmean",
            Product::Slope => "slope",
            Product::TimeseriesSlopes => "timeseries_slopes",
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn facets(values: [&str; 6]) -> Facets {
        Facets {
            time_frequency: values[0].to_string(),
            domain: values[1].to_string(),
            variable: values[2].to_string(),
            experiment: values[3].to_string(),
            driving_model: values[4].to_string(),
            rcm_name: values[5].to_string(),
        }
    }

    #[test]
    fn should_resolve_canonical_path() {
        let f = facets(["mon", "EUR-44", "pr", "rcp85", "MPI-M-MPI-ESM-LR", "RCA4"]);
        assert_eq!(
            f.path(Path::new("data-link/cordex-data")),
            PathBuf::from("data-link/cordex-data/mon/EUR-44/pr/rcp85/MPI-M-MPI-ESM-LR/RCA4")
        );
    }

    #[test]
    fn should_map_distinct_tuples_to_distinct_paths() {
        let vocab = ["a", "b", "ab"];
        let mut seen = HashSet::new();
        let mut count = 0;

        for tf in vocab {
            for dom in vocab {
                for var in vocab {
                    for exp in ["rcp85", "historical"] {
                        for gcm in vocab {
                            for rcm in vocab {
                                let f = facets([tf, dom, var, exp, gcm, rcm]);
                                assert!(f.validate().is_ok());
                                seen.insert(f.path(Path::new("root")));
                                count += 1;
                            }
                        }
                    }
                }
            }
        }

        assert_eq!(seen.len(), count);
    }

    #[test]
    fn should_reject_values_that_break_the_template() {
        let nested = facets(["mon", "EUR-44", "pr", "rcp85", "MPI/ESM", "RCA4"]);
        assert!(matches!(
            nested.validate(),
            Err(CatalogError::BadFacet { level: "driving_model", .. })
        ));

        let empty = facets(["mon", "", "pr", "rcp85", "MPI", "RCA4"]);
        assert!(empty.validate().is_err());

        let parent = facets(["mon", "EUR-44", "..", "rcp85", "MPI", "RCA4"]);
        assert!(parent.validate().is_err());
    }

    #[test]
    fn should_pick_aggregations_per_variable() {
        assert_eq!(
            Aggregation::for_variable("pr"),
            vec![Aggregation::YearMax, Aggregation::YearSum]
        );
        assert_eq!(Aggregation::for_variable("tasmax"), vec![Aggregation::YearMax]);
    }
}
