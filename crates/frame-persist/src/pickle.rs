//! Pickle backend
//!
//! Writes Python pickle protocol so the files open with `pickle.load`.
//! Structured tables are stored as a dict of `columns`, `dtypes` and
//! per-column value lists; raw tables as a dict of `shape` and `rows`.
//! A bare list of row lists is also accepted on load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::{Array2, ArrayD};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_pickle::{DeOptions, SerOptions, Value};

use crate::data::{ColumnKind, Data, values_matrix};
use crate::error::{FileLoadError, FileSaveError};
use crate::options::{Format, Representation};
use crate::paths;

#[derive(Debug, Serialize)]
struct PickledFrame {
    columns: Vec<String>,
    dtypes: Vec<String>,
    data: Vec<PickledColumn>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PickledColumn {
    Bool(Vec<Option<bool>>),
    Int(Vec<Option<i64>>),
    UInt(Vec<Option<u64>>),
    Float(Vec<Option<f64>>),
    Str(Vec<Option<String>>),
}

/// Structured payload as read back; columns are decoded by their `dtypes` tag.
#[derive(Debug, Deserialize)]
struct StoredFrame {
    columns: Vec<String>,
    dtypes: Vec<String>,
    data: Vec<Value>,
}

/// Raw payload. The shape is kept so tables without rows keep their width.
#[derive(Debug, Serialize, Deserialize)]
struct PickledMatrix {
    shape: Vec<usize>,
    rows: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredMatrix {
    Shaped(PickledMatrix),
    Rows(Vec<Vec<Option<f64>>>),
}

/// Pickle `df` to `path`, replacing whatever was there.
pub fn save(path: &Path, df: &DataFrame, representation: Representation) -> Result<(), FileSaveError> {
    log::info!("Pickling and writing {} to disk...", path.display());
    write_pickle(path, df, representation)
        .inspect_err(|e| log::error!("Failed to pickle {}: {e}", path.display()))?;
    log::info!("Successfully pickled and saved {}", path.display());
    Ok(())
}

/// Unpickle a table written by [`save`] (or a compatible Python payload).
pub fn load(path: &Path, representation: Representation) -> Result<Data, FileLoadError> {
    log::info!("Opening {} to read and unpickle...", path.display());
    paths::require_file(path)?;
    let data = read_pickle(path, representation)
        .inspect_err(|e| log::error!("Failed to unpickle {}: {e}", path.display()))?;
    log::info!("Successfully read and unpickled {}", path.display());
    Ok(data)
}

fn write_pickle(path: &Path, df: &DataFrame, representation: Representation) -> Result<(), FileSaveError> {
    let mut writer = BufWriter::new(File::create(path)?);
    match representation {
        Representation::Structured => {
            let payload = encode_frame(df)?;
            serde_pickle::to_writer(&mut writer, &payload, SerOptions::new())?;
        }
        Representation::Raw => {
            let matrix = values_matrix(df)?;
            let payload = PickledMatrix {
                shape: matrix.shape().to_vec(),
                rows: matrix
                    .outer_iter()
                    .map(|row| row.iter().copied().map(Some).collect())
                    .collect(),
            };
            serde_pickle::to_writer(&mut writer, &payload, SerOptions::new())?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_pickle(path: &Path, representation: Representation) -> Result<Data, FileLoadError> {
    let reader = BufReader::new(File::open(path)?);
    match representation {
        Representation::Structured => {
            let payload: StoredFrame = serde_pickle::from_reader(reader, DeOptions::new())?;
            Ok(Data::Frame(decode_frame(payload)?))
        }
        Representation::Raw => {
            let payload: StoredMatrix = serde_pickle::from_reader(reader, DeOptions::new())?;
            let array = match payload {
                StoredMatrix::Shaped(PickledMatrix { shape, rows }) => {
                    rows_to_array(rows, Some(shape.as_slice()))?
                }
                StoredMatrix::Rows(rows) => rows_to_array(rows, None)?,
            };
            Ok(Data::Array(array))
        }
    }
}

fn encode_frame(df: &DataFrame) -> Result<PickledFrame, FileSaveError> {
    let mut payload = PickledFrame {
        columns: Vec::with_capacity(df.width()),
        dtypes: Vec::with_capacity(df.width()),
        data: Vec::with_capacity(df.width()),
    };

    for column in df.get_columns() {
        let kind = ColumnKind::of(column.dtype()).ok_or_else(|| FileSaveError::Unsupported {
            format: Format::Pickle,
            reason: format!("column '{}' has type {}", column.name(), column.dtype()),
        })?;
        let values = match kind {
            ColumnKind::Bool => PickledColumn::Bool(column.bool()?.into_iter().collect()),
            ColumnKind::Str => PickledColumn::Str(
                column
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect(),
            ),
            ColumnKind::UInt64 => PickledColumn::UInt(column.u64()?.into_iter().collect()),
            k if k.is_float() => {
                PickledColumn::Float(column.cast(&DataType::Float64)?.f64()?.into_iter().collect())
            }
            _ => PickledColumn::Int(column.cast(&DataType::Int64)?.i64()?.into_iter().collect()),
        };
        payload.columns.push(column.name().to_string());
        payload.dtypes.push(kind.tag().to_string());
        payload.data.push(values);
    }

    Ok(payload)
}

fn decode_frame(payload: StoredFrame) -> Result<DataFrame, FileLoadError> {
    let StoredFrame {
        columns,
        dtypes,
        data,
    } = payload;
    if columns.len() != dtypes.len() || columns.len() != data.len() {
        return Err(FileLoadError::Malformed(format!(
            "{} column names, {} dtypes and {} value lists",
            columns.len(),
            dtypes.len(),
            data.len()
        )));
    }

    let mut decoded = Vec::with_capacity(columns.len());
    for ((name, tag), values) in columns.into_iter().zip(dtypes).zip(data) {
        let kind = ColumnKind::from_tag(&tag)
            .ok_or_else(|| FileLoadError::Malformed(format!("unknown dtype '{tag}' for '{name}'")))?;
        let series = decode_column(PlSmallStr::from(name), kind, values)?;
        decoded.push(series.strict_cast(&kind.dtype())?.into_column());
    }

    Ok(DataFrame::new(decoded)?)
}

fn decode_column(name: PlSmallStr, kind: ColumnKind, values: Value) -> Result<Series, FileLoadError> {
    let series = match kind {
        ColumnKind::Bool => {
            Series::new(name, serde_pickle::from_value::<Vec<Option<bool>>>(values)?)
        }
        ColumnKind::Str => {
            Series::new(name, serde_pickle::from_value::<Vec<Option<String>>>(values)?)
        }
        ColumnKind::UInt64 => {
            let values = decode_u64s(&name, values)?;
            Series::new(name, values)
        }
        k if k.is_float() => {
            Series::new(name, serde_pickle::from_value::<Vec<Option<f64>>>(values)?)
        }
        _ => Series::new(name, serde_pickle::from_value::<Vec<Option<i64>>>(values)?),
    };
    Ok(series)
}

// Values above `i64::MAX` arrive as Python longs, which the typed decoder
// refuses, so unsigned 64-bit columns are read element by element.
fn decode_u64s(name: &str, values: Value) -> Result<Vec<Option<u64>>, FileLoadError> {
    let items = match values {
        Value::List(items) | Value::Tuple(items) => items,
        other => {
            return Err(FileLoadError::Malformed(format!(
                "column '{name}' holds {other} instead of a list"
            )));
        }
    };
    items
        .into_iter()
        .map(|item| {
            let value = match &item {
                Value::None => return Ok(None),
                Value::I64(v) => u64::try_from(*v).ok(),
                Value::Int(v) => u64::try_from(v).ok(),
                _ => None,
            };
            value.map(Some).ok_or_else(|| {
                FileLoadError::Malformed(format!("column '{name}' holds {item}, not a uint64"))
            })
        })
        .collect()
}

fn rows_to_array(
    rows: Vec<Vec<Option<f64>>>,
    shape: Option<&[usize]>,
) -> Result<ArrayD<f64>, FileLoadError> {
    let height = rows.len();
    let width = match shape {
        Some(&[h, w]) if h == height => w,
        Some(shape) => {
            return Err(FileLoadError::Malformed(format!(
                "stored shape {shape:?} does not match {height} rows"
            )));
        }
        None => rows.first().map_or(0, Vec::len),
    };
    let mut flat = Vec::with_capacity(height * width);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != width {
            return Err(FileLoadError::Malformed(format!(
                "row {i} has {} values, expected {width}",
                row.len()
            )));
        }
        flat.extend(row.into_iter().map(|v| v.unwrap_or(f64::NAN)));
    }
    let matrix = Array2::from_shape_vec((height, width), flat)
        .map_err(|e| FileLoadError::Malformed(e.to_string()))?;
    Ok(matrix.into_dyn())
}
