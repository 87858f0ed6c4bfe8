//! Path checks shared by the backends

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FileLoadError, FileSaveError};

/// Split a target into its parent directory and file name.
///
/// The directory is empty for bare file names.
pub fn split_path(path: &Path) -> Result<(PathBuf, String), FileSaveError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| FileSaveError::InvalidPath(path.to_path_buf()))?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((dir, file_name.to_string()))
}

/// Create `dir` and any missing ancestors. Returns whether anything was created.
pub fn ensure_dir(dir: &Path) -> Result<bool, FileSaveError> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(false);
    }
    log::info!("Directory {} does not exist. Creating...", dir.display());
    fs::create_dir_all(dir)?;
    Ok(true)
}

/// Delete an existing file so the next write starts from nothing.
pub fn remove_existing(path: &Path) -> Result<bool, FileSaveError> {
    if !path.is_file() {
        return Ok(false);
    }
    log::warn!("File {} will be overwritten", path.display());
    fs::remove_file(path)?;
    Ok(true)
}

/// A load target must be non-empty and name an existing file.
pub fn require_file(path: &Path) -> Result<(), FileLoadError> {
    require_non_empty(path)?;
    if !path.is_file() {
        log::error!("File {} does not exist", path.display());
        return Err(FileLoadError::NotFound(path.to_path_buf()));
    }
    Ok(())
}

pub fn require_non_empty(path: &Path) -> Result<(), FileLoadError> {
    if path.as_os_str().is_empty() {
        log::error!("Invalid file path");
        return Err(FileLoadError::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}
