//! frame-persist - save and load polars DataFrames in several on-disk formats
//!
//! One entry point per direction routes to a backend picked by typed options:
//!
//! - **pickle**: Python pickle protocol, whole table in one blob
//! - **hdf5**: named datasets inside an HDF5 file (cargo feature `hdf5`)
//! - **csv**: delimited text with header/dtype/converter control
//!
//! Each backend stores a table either *structured* (column names and dtypes
//! kept) or *raw* (a plain numeric matrix).
//!
//! ## Quick Start
//!
//! ```ignore
//! use frame_persist::{Hdf5Options, LoadOptions, OpenMode, SaveOptions, load, save};
//!
//! let options = SaveOptions::hdf5(Hdf5Options::raw("data")).with_mode(OpenMode::Overwrite);
//! save("out/train.h5", &df, &options)?;
//!
//! let matrix = load("out/train.h5", &LoadOptions::hdf5(Hdf5Options::raw("data")))?
//!     .into_array();
//! ```
//!
//! ## Logging
//!
//! Progress and failures go through the `log` facade. The library never
//! installs a logger; the host application picks one (e.g. `env_logger`).

mod data;
mod dispatch;
mod error;
mod options;
mod paths;

pub mod csv;
#[cfg(feature = "hdf5")]
pub mod h5;
pub mod pickle;

// ============ Primary Public API ============

pub use dispatch::{load, save};

pub use data::{Data, values_matrix};
pub use options::{
    BackendOptions, Converter, CsvLoadOptions, CsvSaveOptions, DEFAULT_HDF5_KEY, Format, Hdf5Options,
    Header, LoadBackend, LoadOptions, OpenMode, RawOptions, Representation, SaveOptions,
    StructuredOptions,
};

// ============ Errors ============

pub use error::{FileLoadError, FileSaveError, ParseOptionError};
