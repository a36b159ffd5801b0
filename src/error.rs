use std::path::PathBuf;
use thiserror::Error;

use crate::variable::ClimateVariable;

/// Errors raised by a dataset catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The dataset does not offer the requested variable.
    /// Callers iterating over every variable should skip and continue.
    #[error("Variable {variable} is not offered by dataset {dataset}")]
    UnsupportedVariable {
        dataset: String,
        variable: ClimateVariable,
    },

    /// The descriptor is missing naming tokens or has a malformed template.
    /// Only raised when a catalog is constructed.
    #[error("Invalid dataset descriptor: {0}")]
    InvalidDescriptor(String),

    /// A directory could not be enumerated during wildcard expansion
    #[error("Cannot enumerate {}: {source}", .path.display())]
    FilesystemAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    /// True if the error only means "this dataset has no such variable"
    pub fn is_unsupported(&self) -> bool {
        matches!(self, CatalogError::UnsupportedVariable { .. })
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CatalogError::InvalidDescriptor(msg.into())
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::FilesystemAccess {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while assembling the command-line configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Descriptor parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Invalid chunk sizes: {0}")]
    InvalidChunkSizes(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
