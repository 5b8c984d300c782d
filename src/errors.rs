//! Error types shared by the catalog, the external tool adapter, the
//! configuration loader and the search client.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Directory is empty: {}", .0.display())]
    Empty(PathBuf),

    #[error("Cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No file matching `{pattern}` in {}", dir.display())]
    NoMatch { dir: PathBuf, pattern: String },

    #[error("File name does not follow the CORDEX naming scheme: {0}")]
    BadFileName(String),

    #[error("Invalid {level} facet value: `{value}`")]
    BadFacet { level: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Cannot start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Cannot interpret output of `{command}`: {output}")]
    BadOutput { command: String, output: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open {}: {source}", path.display())]
    CantOpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot deserialize {}: {source}", path.display())]
    CantDeserialize {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Configuration component is out of bounds: {0}")]
    OutOfBounds(&'static str),

    #[error("No cities registered for domain {0}")]
    UnknownDomain(String),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Request to the search service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search service answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Cannot write download script: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected search response: {0}")]
    Response(String),
}
