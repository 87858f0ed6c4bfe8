//! Error types surfaced by the save and load entry points.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::options::Format;

/// Failure while writing a table to disk.
#[derive(Error, Debug)]
pub enum FileSaveError {
    #[error("Invalid file path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("A dataset key is required when saving raw HDF5 data")]
    MissingKey,

    #[error("Cannot save {} in read-only mode", .0.display())]
    ReadOnly(PathBuf),

    #[error("{format} cannot store this table: {reason}")]
    Unsupported { format: Format, reason: String },

    #[error("Cannot append to '{key}': {reason}")]
    SchemaMismatch { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Pickle error: {0}")]
    Pickle(#[from] serde_pickle::Error),

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

/// Failure while reading a table from disk.
#[derive(Error, Debug)]
pub enum FileLoadError {
    #[error("Invalid file path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("File does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Dataset does not exist: {0}")]
    DatasetNotFound(String),

    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("{0} support is not available in this build")]
    Unsupported(Format),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Pickle error: {0}")]
    Pickle(#[from] serde_pickle::Error),

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

/// An option string that does not name a known format or mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseOptionError {
    pub kind: &'static str,
    pub value: String,
}
