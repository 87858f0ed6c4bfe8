//! HDF5 backend
//!
//! Raw tables become one plain 2-D `f64` dataset under the caller's key.
//! Structured tables become a group holding `columns` and `dtypes` string
//! attributes plus one resizable 1-D dataset per column (`c0`, `c1`, ...),
//! which is what lets `append` extend a table in place. Float nulls are
//! written as `NaN`; nulls in other column types are refused.

use std::path::Path;

use hdf5::types::VarLenUnicode;
use hdf5::{Dataset, File, Group, H5Type};
use polars::prelude::*;

use crate::data::{ColumnKind, Data, values_matrix};
use crate::error::{FileLoadError, FileSaveError};
use crate::options::{Format, Hdf5Options, OpenMode, StructuredOptions};
use crate::paths;

const CHUNK_ROWS: usize = 4096;
const COLUMNS_ATTR: &str = "columns";
const DTYPES_ATTR: &str = "dtypes";

// ============ Save ============

/// Write `df` into the HDF5 file at `path`.
pub fn save(
    path: &Path,
    df: &DataFrame,
    mode: OpenMode,
    options: &Hdf5Options,
) -> Result<(), FileSaveError> {
    log::info!("Writing HDF5 to {}...", path.display());
    let result = match options {
        Hdf5Options::Structured(opts) => save_structured(path, df, mode, opts),
        Hdf5Options::Raw(opts) => save_raw(path, df, mode, &opts.key),
    };
    result.inspect_err(|e| log::error!("Failed to write {}: {e}", path.display()))?;
    log::info!("Successfully saved hdf5 data to {}", path.display());
    Ok(())
}

fn open_for_write(path: &Path, mode: OpenMode) -> Result<File, FileSaveError> {
    match mode {
        OpenMode::Read => Err(FileSaveError::ReadOnly(path.to_path_buf())),
        OpenMode::Append => Ok(File::append(path)?),
        OpenMode::Overwrite => Ok(File::create(path)?),
    }
}

fn save_raw(path: &Path, df: &DataFrame, mode: OpenMode, key: &str) -> Result<(), FileSaveError> {
    if key.trim().is_empty() {
        log::error!("Need a key when saving as raw HDF5");
        return Err(FileSaveError::MissingKey);
    }
    let matrix = values_matrix(df)?;
    let file = open_for_write(path, mode)?;
    if file.link_exists(key) {
        log::debug!("Replacing dataset '{key}' in {}", path.display());
        file.unlink(key)?;
    }
    file.new_dataset_builder().with_data(&matrix).create(key)?;
    Ok(())
}

fn save_structured(
    path: &Path,
    df: &DataFrame,
    mode: OpenMode,
    opts: &StructuredOptions,
) -> Result<(), FileSaveError> {
    let key = opts.key();
    let kinds = column_kinds(df)?;
    let file = open_for_write(path, mode)?;

    let group = if file.link_exists(key) && opts.append {
        let group = file.group(key)?;
        check_schema(&group, key, df, &kinds)?;
        log::debug!("Appending {} rows to '{key}'", df.height());
        group
    } else {
        if file.link_exists(key) {
            file.unlink(key)?;
        }
        create_table_group(&file, key, df, &kinds)?
    };

    for (i, (column, kind)) in df.get_columns().iter().zip(&kinds).enumerate() {
        let ds = group.dataset(&column_dataset(i))?;
        append_column(&ds, column, *kind)?;
    }
    Ok(())
}

fn column_kinds(df: &DataFrame) -> Result<Vec<ColumnKind>, FileSaveError> {
    df.get_columns()
        .iter()
        .map(|column| {
            let unsupported = |reason: String| FileSaveError::Unsupported {
                format: Format::Hdf5,
                reason,
            };
            let kind = ColumnKind::of(column.dtype()).ok_or_else(|| {
                unsupported(format!("column '{}' has type {}", column.name(), column.dtype()))
            })?;
            if column.null_count() > 0 && !kind.is_float() {
                return Err(unsupported(format!(
                    "column '{}' contains nulls",
                    column.name()
                )));
            }
            Ok(kind)
        })
        .collect()
}

fn create_table_group(
    file: &File,
    key: &str,
    df: &DataFrame,
    kinds: &[ColumnKind],
) -> Result<Group, FileSaveError> {
    let group = file.create_group(key)?;
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let tags: Vec<String> = kinds.iter().map(|k| k.tag().to_string()).collect();
    write_str_attr(&group, COLUMNS_ATTR, &names)?;
    write_str_attr(&group, DTYPES_ATTR, &tags)?;

    for (i, kind) in kinds.iter().enumerate() {
        let name = column_dataset(i);
        match kind {
            ColumnKind::Bool => empty_dataset::<bool>(&group, &name)?,
            ColumnKind::Str => empty_dataset::<VarLenUnicode>(&group, &name)?,
            ColumnKind::UInt64 => empty_dataset::<u64>(&group, &name)?,
            k if k.is_float() => empty_dataset::<f64>(&group, &name)?,
            _ => empty_dataset::<i64>(&group, &name)?,
        };
    }
    Ok(group)
}

fn empty_dataset<T: H5Type>(group: &Group, name: &str) -> Result<Dataset, FileSaveError> {
    Ok(group
        .new_dataset::<T>()
        .chunk(CHUNK_ROWS)
        .shape(0..)
        .create(name)?)
}

fn check_schema(
    group: &Group,
    key: &str,
    df: &DataFrame,
    kinds: &[ColumnKind],
) -> Result<(), FileSaveError> {
    let mismatch = |reason: String| FileSaveError::SchemaMismatch {
        key: key.to_string(),
        reason,
    };
    let stored_names = read_str_attr(group, COLUMNS_ATTR)?;
    let stored_tags = read_str_attr(group, DTYPES_ATTR)?;

    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    if stored_names != names {
        return Err(mismatch(format!(
            "stored columns {stored_names:?}, got {names:?}"
        )));
    }
    for ((name, stored), kind) in names.iter().zip(&stored_tags).zip(kinds) {
        if stored != kind.tag() {
            return Err(mismatch(format!(
                "column '{name}' is stored as {stored}, got {}",
                kind.tag()
            )));
        }
    }
    Ok(())
}

fn append_column(ds: &Dataset, column: &Column, kind: ColumnKind) -> Result<(), FileSaveError> {
    match kind {
        ColumnKind::Bool => {
            let values: Vec<bool> = column.bool()?.into_iter().map(Option::unwrap_or_default).collect();
            extend(ds, &values)
        }
        ColumnKind::Str => {
            let values = column
                .str()?
                .into_iter()
                .map(|v| to_varlen(v.unwrap_or_default()))
                .collect::<Result<Vec<_>, _>>()?;
            extend(ds, &values)
        }
        ColumnKind::UInt64 => {
            let values: Vec<u64> = column.u64()?.into_iter().map(Option::unwrap_or_default).collect();
            extend(ds, &values)
        }
        k if k.is_float() => {
            let floats = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = floats
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            extend(ds, &values)
        }
        _ => {
            let ints = column.cast(&DataType::Int64)?;
            let values: Vec<i64> = ints.i64()?.into_iter().map(Option::unwrap_or_default).collect();
            extend(ds, &values)
        }
    }
}

fn extend<T: H5Type>(ds: &Dataset, values: &[T]) -> Result<(), FileSaveError> {
    if values.is_empty() {
        return Ok(());
    }
    let start = ds.size();
    let end = start + values.len();
    ds.resize(end)?;
    ds.write_slice(values, start..end)?;
    Ok(())
}

// ============ Load ============

/// Read a table back from the HDF5 file at `path`.
///
/// With `read_only == false` a missing file is created by the open, so the
/// call then fails only because the key is absent.
pub fn load(path: &Path, read_only: bool, options: &Hdf5Options) -> Result<Data, FileLoadError> {
    paths::require_non_empty(path)?;
    log::info!("Attempting to open HDF5 file {}...", path.display());
    if !path.is_file() {
        if read_only {
            log::error!("File {} does not exist", path.display());
            return Err(FileLoadError::NotFound(path.to_path_buf()));
        }
        log::info!("File {} does not exist. Creating...", path.display());
    }

    let file = if read_only {
        File::open(path)?
    } else {
        File::append(path)?
    };

    let result = match options {
        Hdf5Options::Structured(opts) => load_structured(&file, opts.key()).map(Data::Frame),
        Hdf5Options::Raw(opts) => load_raw(&file, &opts.key).map(Data::Array),
    };
    result.inspect_err(|e| log::error!("Problem loading {}: {e}", path.display()))
}

fn require_link(file: &File, key: &str) -> Result<(), FileLoadError> {
    if key.is_empty() || !file.link_exists(key) {
        return Err(FileLoadError::DatasetNotFound(key.to_string()));
    }
    Ok(())
}

fn load_raw(file: &File, key: &str) -> Result<ndarray::ArrayD<f64>, FileLoadError> {
    require_link(file, key)?;
    let ds = file.dataset(key)?;
    Ok(ds.read_dyn::<f64>()?)
}

fn load_structured(file: &File, key: &str) -> Result<DataFrame, FileLoadError> {
    require_link(file, key)?;
    let group = file.group(key)?;
    let names = read_str_attr(&group, COLUMNS_ATTR)?;
    let tags = read_str_attr(&group, DTYPES_ATTR)?;
    if names.len() != tags.len() {
        return Err(FileLoadError::Malformed(format!(
            "'{key}' lists {} columns but {} dtypes",
            names.len(),
            tags.len()
        )));
    }

    let mut columns = Vec::with_capacity(names.len());
    for (i, (name, tag)) in names.into_iter().zip(tags).enumerate() {
        let kind = ColumnKind::from_tag(&tag)
            .ok_or_else(|| FileLoadError::Malformed(format!("unknown dtype '{tag}' for '{name}'")))?;
        let ds = group.dataset(&column_dataset(i))?;
        let name = PlSmallStr::from(name);
        let series = match kind {
            ColumnKind::Bool => Series::new(name, ds.read_raw::<bool>()?),
            ColumnKind::Str => {
                let values: Vec<String> = ds
                    .read_raw::<VarLenUnicode>()?
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect();
                Series::new(name, values)
            }
            ColumnKind::UInt64 => Series::new(name, ds.read_raw::<u64>()?),
            k if k.is_float() => Series::new(name, ds.read_raw::<f64>()?),
            _ => Series::new(name, ds.read_raw::<i64>()?),
        };
        columns.push(series.strict_cast(&kind.dtype())?.into_column());
    }

    Ok(DataFrame::new(columns)?)
}

// ============ Helpers ============

fn column_dataset(index: usize) -> String {
    format!("c{index}")
}

fn to_varlen(value: &str) -> Result<VarLenUnicode, FileSaveError> {
    value.parse::<VarLenUnicode>().map_err(|e| FileSaveError::Unsupported {
        format: Format::Hdf5,
        reason: format!("string {value:?} cannot be stored: {e}"),
    })
}

fn write_str_attr(group: &Group, name: &str, values: &[String]) -> Result<(), FileSaveError> {
    let encoded = values
        .iter()
        .map(|v| to_varlen(v))
        .collect::<Result<Vec<_>, _>>()?;
    group
        .new_attr_builder()
        .with_data(encoded.as_slice())
        .create(name)?;
    Ok(())
}

fn read_str_attr(group: &Group, name: &str) -> hdf5::Result<Vec<String>> {
    let values = group.attr(name)?.read_raw::<VarLenUnicode>()?;
    Ok(values.iter().map(|v| v.as_str().to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn sample() -> DataFrame {
        df! {
            "id" => &[1i32, 2, 3],
            "value" => &[0.5f64, 1.0, 1.5],
            "name" => &["a", "b", "c"],
            "ok" => &[true, false, true],
        }
        .unwrap()
    }

    #[test]
    fn structured_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.h5");
        let df = sample();

        save(&path, &df, OpenMode::Append, &Hdf5Options::structured("frames")).unwrap();
        let loaded = load(&path, true, &Hdf5Options::structured("frames"))
            .unwrap()
            .into_frame()
            .unwrap();
        assert!(loaded.equals_missing(&df));
        assert_eq!(loaded.column("id").unwrap().dtype(), &DataType::Int32);
    }

    #[test]
    fn float_nulls_come_back_as_nan() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.h5");
        let df = df! { "v" => &[Some(1.0f32), None] }.unwrap();

        save(&path, &df, OpenMode::Append, &Hdf5Options::default()).unwrap();
        let loaded = load(&path, true, &Hdf5Options::default())
            .unwrap()
            .into_frame()
            .unwrap();
        let v = loaded.column("v").unwrap().f32().unwrap();
        assert_eq!(v.get(0), Some(1.0));
        assert!(v.get(1).unwrap().is_nan());
    }

    #[test]
    fn structured_append_extends_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.h5");
        let opts = Hdf5Options::structured("frames").with_append(true);

        save(&path, &sample(), OpenMode::Append, &opts).unwrap();
        save(&path, &sample(), OpenMode::Append, &opts).unwrap();

        let loaded = load(&path, true, &opts).unwrap().into_frame().unwrap();
        assert_eq!(loaded.height(), 6);
        assert_eq!(loaded.column("name").unwrap().str().unwrap().get(3), Some("a"));
    }

    #[test]
    fn structured_without_append_replaces_table() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.h5");
        let opts = Hdf5Options::structured("frames");

        save(&path, &sample(), OpenMode::Append, &opts).unwrap();
        let second = df! { "x" => &[9i64] }.unwrap();
        save(&path, &second, OpenMode::Append, &opts).unwrap();

        let loaded = load(&path, true, &opts).unwrap().into_frame().unwrap();
        assert!(loaded.equals(&second));
    }

    #[test]
    fn append_with_different_columns_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.h5");
        let opts = Hdf5Options::structured("frames").with_append(true);

        save(&path, &sample(), OpenMode::Append, &opts).unwrap();
        let other = df! { "x" => &[1i64] }.unwrap();
        let err = save(&path, &other, OpenMode::Append, &opts).unwrap_err();
        assert!(matches!(err, FileSaveError::SchemaMismatch { .. }));
    }

    #[test]
    fn nulls_in_integer_columns_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.h5");
        let df = df! { "n" => &[Some(1i64), None] }.unwrap();
        let err = save(&path, &df, OpenMode::Append, &Hdf5Options::default()).unwrap_err();
        assert!(matches!(err, FileSaveError::Unsupported { .. }));
    }

    #[test]
    fn raw_requires_a_key() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.h5");
        let df = df! { "a" => &[1.0f64] }.unwrap();
        let err = save(&path, &df, OpenMode::Append, &Hdf5Options::raw("")).unwrap_err();
        assert!(matches!(err, FileSaveError::MissingKey));
        assert!(!path.exists());
    }

    #[test]
    fn raw_save_replaces_dataset_with_new_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.h5");
        let opts = Hdf5Options::raw("data");

        let first = df! { "a" => &[1.0f64, 2.0, 3.0] }.unwrap();
        save(&path, &first, OpenMode::Append, &opts).unwrap();
        let second = df! { "a" => &[4.0f64], "b" => &[5.0f64] }.unwrap();
        save(&path, &second, OpenMode::Append, &opts).unwrap();

        let arr = load(&path, true, &opts).unwrap().into_array().unwrap();
        assert_eq!(arr.shape(), &[1, 2]);
        assert_eq!(arr[[0, 1]], 5.0);
    }

    #[test]
    fn read_mode_cannot_save() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.h5");
        let err = save(&path, &sample(), OpenMode::Read, &Hdf5Options::default()).unwrap_err();
        assert!(matches!(err, FileSaveError::ReadOnly(_)));
    }
}
