use std::path::PathBuf;

use anyhow::Result;

use super::Context;
use crate::{catalog::Facets, cli::FacetArgs};

impl From<&FacetArgs> for Facets {
    fn from(args: &FacetArgs) -> Self {
        Facets {
            time_frequency: args.time_frequency.clone(),
            domain: args.domain.clone(),
            variable: args.variable.clone(),
            experiment: args.experiment.clone(),
            driving_model: args.driving_model.clone(),
            rcm_name: args.rcm_name.clone(),
        }
    }
}

/// Directory of a dataset under the data root.
pub fn resolve(ctx: &Context, args: &FacetArgs) -> Result<PathBuf> {
    let facets = Facets::from(args);
    facets.validate()?;

    Ok(facets.path(ctx.data_root()))
}

// -- Tests -------------------------------------------------------------------
