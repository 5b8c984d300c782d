//! Directory listings with filesystem artifacts removed.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::errors::CatalogError;

/// Finder metadata file that macOS leaves in every directory it touches.
pub const JUNK_ENTRY: &str = ".DS_Store";

/// Removes every [`JUNK_ENTRY`] from a listing, keeping the order of the rest.
pub fn filter_listing<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| name != JUNK_ENTRY)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EntryKind {
    Any,
    Dir,
    File,
}

fn list(path: &Path, kind: EntryKind) -> Result<Vec<String>, CatalogError> {
    if !path.is_dir() {
        return Err(CatalogError::NotFound(path.to_path_buf()));
    }

    let unreadable = |source| CatalogError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(path).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let entry_path = entry.path();
        let keep = match kind {
            EntryKind::Any => true,
            EntryKind::Dir => entry_path.is_dir(),
            EntryKind::File => entry_path.is_file(),
        };
        if keep {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }

    // read_dir order is platform dependent; file names sort chronologically
    let mut names = filter_listing(names);
    names.sort();

    Ok(names)
}

/// Lists a directory, sorted by name.
pub fn list_dir(path: &Path) -> Result<Vec<String>, CatalogError> {
    list(path, EntryKind::Any)
}

/// Lists the sub-directories of a directory, sorted by name.
pub fn list_subdirs(path: &Path) -> Result<Vec<String>, CatalogError> {
    list(path, EntryKind::Dir)
}

/// Lists the regular files of a directory, sorted by name.
pub fn list_files(path: &Path) -> Result<Vec<String>, CatalogError> {
    list(path, EntryKind::File)
}

/// Full paths of the files in a directory, failing if there are none.
pub fn file_paths(path: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let files = list_files(path)?;
    if files.is_empty() {
        return Err(CatalogError::Empty(path.to_path_buf()));
    }

    Ok(files.into_iter().map(|f| path.join(f)).collect())
}

pub fn first_file(path: &Path) -> Result<String, CatalogError> {
    list_files(path)?
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::Empty(path.to_path_buf()))
}

pub fn last_file(path: &Path) -> Result<String, CatalogError> {
    list_files(path)?
        .into_iter()
        .last()
        .ok_or_else(|| CatalogError::Empty(path.to_path_buf()))
}

/// First file (by name) whose name satisfies `predicate`.
pub fn find_file<F>(path: &Path, pattern: &str, predicate: F) -> Result<String, CatalogError>
where
    F: Fn(&str) -> bool,
{
    list_files(path)?
        .into_iter()
        .find(|name| predicate(name))
        .ok_or_else(|| CatalogError::NoMatch {
            dir: path.to_path_buf(),
            pattern: pattern.to_string(),
        })
}

// -- Tests -------------------------------------------------------------------
