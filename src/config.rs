//! Configuration file parsing and checking.
//!
//! The configuration is a YAML file. Every field is optional and defaults to
//! the values the processing chain was built around, so an empty file (or no
//! file at all) is a valid configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::Deserialize;

use crate::errors::ConfigError;

/// Name of the configuration file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "cordex.yaml";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub paths: Paths,

    /// Program name or path of the Climate Data Operators executable.
    pub cdo: String,

    pub search: Search,

    pub analysis: Analysis,

    /// _(Optional)_ City registry file. The built-in registry is used when
    /// this is not set.
    pub cities: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            paths: Paths::default(),
            cdo: "cdo".to_string(),
            search: Search::default(),
            analysis: Analysis::default(),
            cities: None,
        }
    }
}

/// Where the data tree and derived tables live.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Paths {
    /// Root of the canonical tree `<tf>/<domain>/<var>/<exp>/<gcm>/<rcm>`.
    pub data_root: PathBuf,

    /// Local working tree, moved to `data_root` by `reorganise to-hard-drive`.
    pub staging_root: PathBuf,

    pub slope_tables: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Paths {
            data_root: PathBuf::from("data-link/cordex-data"),
            staging_root: PathBuf::from("data/cordex-data"),
            slope_tables: PathBuf::from("slope_tables"),
        }
    }
}

/// ESGF search service settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Search {
    /// Base URL of the search API of an ESGF index node.
    pub node: String,

    /// Search across all federated nodes rather than the local one.
    pub distrib: bool,

    /// Datasets requested per search page. Cannot be `0`.
    pub page_size: u32,

    /// Shell used to run the generated download scripts.
    pub shell: String,
}

impl Default for Search {
    fn default() -> Self {
        Search {
            node: "https://esgf-node.llnl.gov/esg-search".to_string(),
            distrib: true,
            page_size: 50,
            shell: "bash".to_string(),
        }
    }
}

/// Inclusive range of years.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YearSpan {
    pub start: i32,
    pub end: i32,
}

impl YearSpan {
    pub const fn new(start: i32, end: i32) -> Self {
        YearSpan { start, end }
    }
}

/// A regional model run that is known to be broken for a domain and variable.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Exclusion {
    pub domain: String,
    pub variable: String,
    pub rcm: String,
}

/// Unit correction for slopes of a model that reports a different time base.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlopeDivisor {
    pub domain: String,
    pub variable: String,
    pub driving_model: String,
    pub rcm: String,
    pub divisor: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Analysis {
    /// Time frequency directory the pre-processing works on.
    pub time_frequency: String,

    /// Driving model of the reanalysis-driven evaluation runs.
    pub evaluation_driver: String,

    /// Half width (in degrees) of the box selected around a city.
    ///
    /// Must be positive.
    pub city_box: f64,

    /// Years covered by historical + scenario combined series.
    pub scenario_span: YearSpan,

    /// Reference period for time means.
    pub baseline: YearSpan,

    /// Period over which linear trends are computed.
    pub trend: YearSpan,

    pub excluded: Vec<Exclusion>,

    pub slope_divisors: Vec<SlopeDivisor>,
}

impl Default for Analysis {
    fn default() -> Self {
        let cclm_hourly = |driving_model: &str| SlopeDivisor {
            domain: "AUS-44".to_string(),
            variable: "pr".to_string(),
            driving_model: driving_model.to_string(),
            rcm: "CCLM4-8-17-CLM3-5".to_string(),
            divisor: 24.0,
        };

        Analysis {
            time_frequency: "mon".to_string(),
            evaluation_driver: "ECMWF-ERAINT".to_string(),
            city_box: 1.0,
            scenario_span: YearSpan::new(1950, 2100),
            baseline: YearSpan::new(1981, 2010),
            trend: YearSpan::new(2000, 2100),
            excluded: vec![Exclusion {
                domain: "EUR-44".to_string(),
                variable: "pr".to_string(),
                rcm: "WRF331F".to_string(),
            }],
            slope_divisors: vec![
                cclm_hourly("ICHEC-EC-EARTH"),
                cclm_hourly("MPI-M-MPI-ESM-LR"),
            ],
        }
    }
}

impl Analysis {
    pub fn is_excluded(&self, domain: &str, variable: &str, rcm: &str) -> bool {
        self.excluded
            .iter()
            .any(|e| e.domain == domain && e.variable == variable && e.rcm == rcm)
    }

    /// Divisor applied to a model's slope, `1.0` for most models.
    pub fn slope_divisor(&self, domain: &str, variable: &str, driving_model: &str, rcm: &str) -> f64 {
        self.slope_divisors
            .iter()
            .find(|d| {
                d.domain == domain
                    && d.variable == variable
                    && d.driving_model == driving_model
                    && d.rcm == rcm
            })
            .map_or(1.0, |d| d.divisor)
    }
}

impl Config {
    /// Loads the configuration from `explicit`, or else from the first file
    /// found in the default locations, or else falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_locations().into_iter().find(|p| p.is_file()),
        };

        let config = match path {
            Some(path) => {
                debug!("Reading configuration from {}", path.display());
                Config::from_file(&path)?
            }
            None => Config::default(),
        };

        config.check_bounds()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::CantOpenFile {
            path: path.to_path_buf(),
            source,
        })?;

        Config::from_yaml(&text).map_err(|source| ConfigError::CantDeserialize {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // an empty document deserializes to unit, not to an empty map
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(text)
    }

    /// Checks if the configuration follows conventions and limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        let analysis = &self.analysis;

        for span in [analysis.scenario_span, analysis.baseline, analysis.trend] {
            if span.start > span.end {
                return Err(ConfigError::OutOfBounds(
                    "Year spans must not end before they start",
                ));
            }
        }

        if analysis.city_box <= 0.0 {
            return Err(ConfigError::OutOfBounds("City box must be positive"));
        }

        if self.search.page_size < 1 {
            return Err(ConfigError::OutOfBounds(
                "Search page size cannot be smaller than 1",
            ));
        }

        if analysis.slope_divisors.iter().any(|d| d.divisor == 0.0) {
            return Err(ConfigError::OutOfBounds("Slope divisors cannot be 0"));
        }

        Ok(())
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(LOCAL_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("cordex").join("config.yaml"));
    }

    locations
}

// -- Tests -------------------------------------------------------------------
