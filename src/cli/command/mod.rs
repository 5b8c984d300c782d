pub mod download;
pub mod fix_month_format;
pub mod list;
pub mod preprocess;
pub mod reorganise;
pub mod resolve;
pub mod trend;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

pub use download::{download, download_all};
pub use fix_month_format::fix_month_format;
pub use list::list;
pub use preprocess::preprocess;
pub use reorganise::reorganise;
pub use resolve::resolve;
pub use trend::trend;

use super::Selection;
use crate::{
    catalog::listing::list_subdirs, config::Config, errors::CatalogError, registry::CityRegistry, tool::Cdo,
};

/// Settings shared by every command, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub registry: CityRegistry,
    pub cdo: Cdo,
}

impl Context {
    pub fn new(config: Config, registry: CityRegistry) -> Self {
        let cdo = Cdo::new(&config.cdo);
        Context {
            config,
            registry,
            cdo,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.config.paths.data_root
    }

    /// `<root>/<tf>/<domain>` for a selection.
    pub fn domain_dir(&self, selection: &Selection) -> PathBuf {
        let time_frequency = selection
            .time_frequency
            .as_deref()
            .unwrap_or(&self.config.analysis.time_frequency);

        self.data_root().join(time_frequency).join(&selection.domain)
    }
}

/// The variable directories a stage works on.
///
/// A missing domain directory is an error even when the variable is given.
pub fn selected_variables(domain_dir: &Path, selection: &Selection) -> Result<Vec<String>> {
    if !domain_dir.is_dir() {
        return Err(CatalogError::NotFound(domain_dir.to_path_buf()).into());
    }

    match &selection.variable {
        Some(variable) => Ok(vec![variable.clone()]),
        None => list_subdirs(domain_dir)
            .with_context(|| format!("Cannot list the variables of {}", selection.domain)),
    }
}
