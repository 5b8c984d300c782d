//! Registry of the cities analysed in each domain.
//!
//! Loaded once at startup, from the file named in the configuration or from
//! the built-in `data/cities.yaml`, and passed to the stages that need it.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{errors::ConfigError, report::Report};

const BUILTIN: &str = include_str!("../data/cities.yaml");

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct City {
    /// Short code used in file names, e.g. `ldn`.
    pub code: String,

    /// Human readable name for labels.
    pub name: String,

    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl City {
    /// `(lat, lon)` of the city, `None` for the whole region.
    pub fn location(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CityRegistry {
    domains: BTreeMap<String, Vec<City>>,
}

impl CityRegistry {
    /// Registry from `path`, or the built-in one.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let registry = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::CantOpenFile {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml(&text, path)?
            }
            None => Self::from_yaml(BUILTIN, Path::new("data/cities.yaml"))?,
        };

        registry.check_bounds()?;

        Ok(registry)
    }

    fn from_yaml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::CantDeserialize {
            path: PathBuf::from(origin),
            source,
        })
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        for cities in self.domains.values() {
            let mut codes = HashSet::new();
            for city in cities {
                if !codes.insert(city.code.as_str()) {
                    return Err(ConfigError::OutOfBounds(
                        "City codes must be unique within a domain",
                    ));
                }

                if city.lat.is_some() != city.lon.is_some() {
                    return Err(ConfigError::OutOfBounds(
                        "Cities need both latitude and longitude, or neither",
                    ));
                }

                if let Some((lat, lon)) = city.location() {
                    if !(-90.0..=90.0).contains(&lat) {
                        return Err(ConfigError::OutOfBounds(
                            "City latitude is too low or too high",
                        ));
                    }
                    if !(-180.0..=180.0).contains(&lon) {
                        return Err(ConfigError::OutOfBounds(
                            "City longitude is too low or too high",
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn cities(&self, domain: &str) -> Result<&[City], ConfigError> {
        self.domains
            .get(domain)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::UnknownDomain(domain.to_string()))
    }

    pub fn city(&self, domain: &str, code: &str) -> Option<&City> {
        self.domains.get(domain)?.iter().find(|c| c.code == code)
    }

    /// The requested cities of a domain, all of them if `codes` is empty.
    ///
    /// Codes that are not registered for the domain are handed back so the
    /// caller can report them.
    pub fn select(&self, domain: &str, codes: &[String]) -> Result<CitySelection<'_>, ConfigError> {
        let cities = self.cities(domain)?;
        if codes.is_empty() {
            return Ok(CitySelection {
                found: cities.iter().collect(),
                unknown: Vec::new(),
            });
        }

        let mut selection = CitySelection::default();
        for code in codes {
            match self.city(domain, code) {
                Some(city) => selection.found.push(city),
                None => selection.unknown.push(format!("{} {}", domain, code)),
            }
        }

        Ok(selection)
    }
}

/// Cities picked for a stage.
#[derive(Debug, Default)]
pub struct CitySelection<'a> {
    pub found: Vec<&'a City>,
    /// `<domain> <code>` of every requested code that is not registered.
    pub unknown: Vec<String>,
}

impl CitySelection<'_> {
    /// Records the unknown codes as skipped.
    pub fn report_unknown(&self, report: &mut Report) {
        for code in &self.unknown {
            report.skip(code.clone(), "city not found");
        }
    }
}

// -- Tests -------------------------------------------------------------------
