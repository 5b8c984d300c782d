//! Inventory of the datasets under the data root.

use std::fmt;

use anyhow::Result;
use log::debug;

use super::Context;
use crate::{
    catalog::{listing::list_files, traverse::CANONICAL, DatasetFileName, Facets, Level, Traversal},
    errors::CatalogError,
};

/// One dataset directory with the files it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub facets: Facets,
    pub files: usize,
    /// First start year and last end year of the named files.
    pub span: Option<(i32, i32)>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {} files", self.facets, self.files)?;
        if let Some((start, end)) = self.span {
            write!(f, "  {}-{}", start, end)?;
        }

        Ok(())
    }
}

/// Lists every dataset, optionally restricted to some domains, variables
/// and time frequencies.
pub fn list(
    ctx: &Context,
    domains: &[String],
    variables: &[String],
    time_frequencies: &[String],
) -> Result<Vec<DatasetSummary>> {
    let traversal = Traversal::new(ctx.data_root(), CANONICAL)
        .only(Level::TimeFrequency, time_frequencies)
        .only(Level::Domain, domains)
        .only(Level::Variable, variables);

    let mut summaries = Vec::new();
    traversal.walk(|leaf| {
        let Some(facets) = leaf.context.to_facets() else {
            return Ok::<(), CatalogError>(());
        };

        let names = list_files(&leaf.path)?;
        let parsed: Vec<DatasetFileName> = names
            .iter()
            .filter_map(|name| DatasetFileName::parse(name).ok())
            .collect();
        if parsed.len() < names.len() {
            debug!("{} holds {} unnamed files", facets, names.len() - parsed.len());
        }

        let span = parsed
            .iter()
            .map(DatasetFileName::start_year)
            .min()
            .zip(parsed.iter().map(DatasetFileName::end_year).max());

        summaries.push(DatasetSummary {
            facets,
            files: names.len(),
            span,
        });
        Ok(())
    })?;

    Ok(summaries)
}

// -- Tests -------------------------------------------------------------------
