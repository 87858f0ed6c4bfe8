//! Format routing for the top-level `save` and `load`

use std::path::Path;

use polars::prelude::DataFrame;

use crate::data::Data;
use crate::error::{FileLoadError, FileSaveError};
use crate::options::{
    BackendOptions, Format, Hdf5Options, LoadBackend, LoadOptions, OpenMode, SaveOptions,
};
use crate::{csv, paths, pickle};

/// Save `df` to `path` with the backend selected by `options`.
///
/// `Read` mode is refused before anything on disk is touched. Missing parent
/// directories are created first. An existing file is
/// deleted beforehand when the mode is `Overwrite` or the format is pickle,
/// which has no notion of appending.
pub fn save(path: impl AsRef<Path>, df: &DataFrame, options: &SaveOptions) -> Result<(), FileSaveError> {
    let path = path.as_ref();
    let format = options.format();
    log::info!("Attempting to save {format} data to {}...", path.display());

    if options.mode == OpenMode::Read {
        log::error!("Refusing to save {} in read-only mode", path.display());
        return Err(FileSaveError::ReadOnly(path.to_path_buf()));
    }
    let (dir, _file_name) = paths::split_path(path).inspect_err(|e| log::error!("{e}"))?;
    paths::ensure_dir(&dir)?;
    if options.mode == OpenMode::Overwrite || format == Format::Pickle {
        paths::remove_existing(path)?;
    }

    let result = match &options.backend {
        BackendOptions::Hdf5(opts) => save_hdf5(path, df, options.mode, opts),
        BackendOptions::Csv(opts) => csv::save(path, df, options.mode, opts),
        BackendOptions::Pickle { representation } => pickle::save(path, df, *representation),
    };
    result.inspect_err(|e| log::error!("Error saving file {}: {e}", path.display()))
}

/// Load the table at `path` with the backend selected by `options`.
pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Data, FileLoadError> {
    let path = path.as_ref();
    log::debug!(
        "Loading {} data from {}",
        options.backend.format(),
        path.display()
    );
    match &options.backend {
        LoadBackend::Hdf5(opts) => load_hdf5(path, options.read_only, opts),
        LoadBackend::Csv(opts) => csv::load(path, opts).map(Data::Frame),
        LoadBackend::Pickle { representation } => pickle::load(path, *representation),
    }
}

#[cfg(feature = "hdf5")]
fn save_hdf5(
    path: &Path,
    df: &DataFrame,
    mode: OpenMode,
    options: &Hdf5Options,
) -> Result<(), FileSaveError> {
    crate::h5::save(path, df, mode, options)
}

#[cfg(not(feature = "hdf5"))]
fn save_hdf5(
    _path: &Path,
    _df: &DataFrame,
    _mode: OpenMode,
    _options: &Hdf5Options,
) -> Result<(), FileSaveError> {
    Err(FileSaveError::Unsupported {
        format: Format::Hdf5,
        reason: "built without the `hdf5` feature".to_string(),
    })
}

#[cfg(feature = "hdf5")]
fn load_hdf5(path: &Path, read_only: bool, options: &Hdf5Options) -> Result<Data, FileLoadError> {
    crate::h5::load(path, read_only, options)
}

#[cfg(not(feature = "hdf5"))]
fn load_hdf5(_path: &Path, _read_only: bool, _options: &Hdf5Options) -> Result<Data, FileLoadError> {
    Err(FileLoadError::Unsupported(Format::Hdf5))
}
