//! Walks a nested facet hierarchy and visits every dataset directory.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use super::{
    facets::{Facets, Level},
    listing::list_subdirs,
};
use crate::errors::CatalogError;

/// Level order of the tree under the data root.
pub const CANONICAL: &[Level] = &Level::ALL;

/// Level order of trees written before the data was reorganised.
pub const LEGACY: &[Level] = &[
    Level::Variable,
    Level::Domain,
    Level::DrivingModel,
    Level::RcmName,
    Level::TimeFrequency,
    Level::Experiment,
];

/// Facet values collected on the way down to a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetContext {
    values: Vec<(Level, String)>,
}

impl FacetContext {
    pub fn get(&self, level: Level) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(l, _)| *l == level)
            .map(|(_, v)| v.as_str())
    }

    /// The full facet tuple, if every level is known.
    pub fn to_facets(&self) -> Option<Facets> {
        let get = |level: Level| self.get(level).map(str::to_string);

        Some(Facets {
            time_frequency: get(Level::TimeFrequency)?,
            domain: get(Level::Domain)?,
            variable: get(Level::Variable)?,
            experiment: get(Level::Experiment)?,
            driving_model: get(Level::DrivingModel)?,
            rcm_name: get(Level::RcmName)?,
        })
    }

    fn push(&mut self, level: Level, value: String) {
        self.values.push((level, value));
    }

    fn pop(&mut self) {
        self.values.pop();
    }
}

/// A dataset directory reached by a [`Traversal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub path: PathBuf,
    /// Path relative to the traversal root.
    pub relative: PathBuf,
    pub context: FacetContext,
}

impl Leaf {
    /// Value of a facet that the caller knows is part of the walk.
    pub fn facet(&self, level: Level) -> &str {
        self.context.get(level).unwrap_or_default()
    }
}

/// A walk over `levels` directory levels below `root`.
#[derive(Debug, Clone)]
pub struct Traversal {
    root: PathBuf,
    levels: Vec<Level>,
    fixed: Vec<(Level, String)>,
    only: HashMap<Level, Vec<String>>,
    except: HashMap<Level, Vec<String>>,
}

impl Traversal {
    pub fn new(root: impl Into<PathBuf>, levels: &[Level]) -> Self {
        Traversal {
            root: root.into(),
            levels: levels.to_vec(),
            fixed: Vec::new(),
            only: HashMap::new(),
            except: HashMap::new(),
        }
    }

    /// Records a facet that is implied by the root rather than walked.
    pub fn with_context(mut self, level: Level, value: impl Into<String>) -> Self {
        self.fixed.push((level, value.into()));
        self
    }

    /// Restricts a level to the given values. An empty list keeps everything.
    pub fn only(mut self, level: Level, values: &[String]) -> Self {
        if !values.is_empty() {
            self.only.insert(level, values.to_vec());
        }
        self
    }

    /// Skips entries of a level whose name contains `fragment`.
    pub fn except(mut self, level: Level, fragment: impl Into<String>) -> Self {
        self.except.entry(level).or_default().push(fragment.into());
        self
    }

    fn accepts(&self, level: Level, name: &str) -> bool {
        if let Some(values) = self.only.get(&level) {
            if !values.iter().any(|v| v == name) {
                return false;
            }
        }

        match self.except.get(&level) {
            Some(fragments) => !fragments.iter().any(|f| name.contains(f.as_str())),
            None => true,
        }
    }

    /// Calls `visitor` for every leaf and returns the number of leaves.
    ///
    /// Leaves are visited depth first in name order. The walk stops at the
    /// first error returned by the visitor.
    pub fn walk<F, E>(&self, mut visitor: F) -> Result<usize, E>
    where
        F: FnMut(&Leaf) -> Result<(), E>,
        E: From<CatalogError>,
    {
        if !self.root.is_dir() {
            return Err(CatalogError::NotFound(self.root.clone()).into());
        }

        let mut context = FacetContext::default();
        for (level, value) in &self.fixed {
            context.push(*level, value.clone());
        }

        self.descend(&self.root, PathBuf::new(), 0, &mut context, &mut visitor)
    }

    fn descend<F, E>(
        &self,
        dir: &Path,
        relative: PathBuf,
        depth: usize,
        context: &mut FacetContext,
        visitor: &mut F,
    ) -> Result<usize, E>
    where
        F: FnMut(&Leaf) -> Result<(), E>,
        E: From<CatalogError>,
    {
        let Some(&level) = self.levels.get(depth) else {
            let leaf = Leaf {
                path: dir.to_path_buf(),
                relative,
                context: context.clone(),
            };
            visitor(&leaf)?;
            return Ok(1);
        };

        let mut count = 0;
        for name in list_subdirs(dir)? {
            if !self.accepts(level, &name) {
                continue;
            }

            let child = dir.join(&name);
            let child_relative = relative.join(&name);
            context.push(level, name);
            count += self.descend(&child, child_relative, depth + 1, context, visitor)?;
            context.pop();
        }

        Ok(count)
    }

    /// All leaves, gathered before any of them is processed.
    pub fn collect(&self) -> Result<Vec<Leaf>, CatalogError> {
        let mut leaves = Vec::new();
        self.walk(|leaf| {
            leaves.push(leaf.clone());
            Ok::<(), CatalogError>(())
        })?;

        Ok(leaves)
    }
}

// -- Tests -------------------------------------------------------------------
