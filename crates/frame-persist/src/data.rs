//! In-memory values moved through the backends
//!
//! Structured loads produce a polars `DataFrame`; raw loads produce a plain
//! `f64` array. `ColumnKind` is the small set of column types the structured
//! on-disk layouts know how to encode.

use ndarray::{Array2, ArrayD};
use polars::prelude::*;

/// Result of a load: a labelled table or a label-free numeric array.
#[derive(Debug, Clone)]
pub enum Data {
    Frame(DataFrame),
    Array(ArrayD<f64>),
}

impl Data {
    pub fn as_frame(&self) -> Option<&DataFrame> {
        match self {
            Data::Frame(df) => Some(df),
            Data::Array(_) => None,
        }
    }

    pub fn into_frame(self) -> Option<DataFrame> {
        match self {
            Data::Frame(df) => Some(df),
            Data::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayD<f64>> {
        match self {
            Data::Array(arr) => Some(arr),
            Data::Frame(_) => None,
        }
    }

    pub fn into_array(self) -> Option<ArrayD<f64>> {
        match self {
            Data::Array(arr) => Some(arr),
            Data::Frame(_) => None,
        }
    }

    /// `[rows, columns]` for frames, the array shape otherwise.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Data::Frame(df) => vec![df.height(), df.width()],
            Data::Array(arr) => arr.shape().to_vec(),
        }
    }
}

impl From<DataFrame> for Data {
    fn from(df: DataFrame) -> Self {
        Data::Frame(df)
    }
}

impl From<ArrayD<f64>> for Data {
    fn from(arr: ArrayD<f64>) -> Self {
        Data::Array(arr)
    }
}

/// Row-major `f64` matrix of a frame's values. Nulls become `NaN`.
///
/// Fails for columns that do not cast to `Float64` (strings, nested types).
pub fn values_matrix(df: &DataFrame) -> PolarsResult<Array2<f64>> {
    let (height, width) = (df.height(), df.width());
    let mut matrix = Array2::<f64>::from_elem((height, width), f64::NAN);

    for (j, column) in df.get_columns().iter().enumerate() {
        match ColumnKind::of(column.dtype()) {
            Some(ColumnKind::Str) | None => {
                return Err(PolarsError::ComputeError(
                    format!(
                        "column '{}' of type {} has no numeric representation",
                        column.name(),
                        column.dtype()
                    )
                    .into(),
                ));
            }
            Some(_) => {}
        }
        let floats = column.cast(&DataType::Float64)?;
        for (i, value) in floats.f64()?.into_iter().enumerate() {
            if let Some(v) = value {
                matrix[[i, j]] = v;
            }
        }
    }

    Ok(matrix)
}

/// Column types that the structured pickle and HDF5 layouts can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Str,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Option<Self> {
        let kind = match dtype {
            DataType::Boolean => ColumnKind::Bool,
            DataType::Int8 => ColumnKind::Int8,
            DataType::Int16 => ColumnKind::Int16,
            DataType::Int32 => ColumnKind::Int32,
            DataType::Int64 => ColumnKind::Int64,
            DataType::UInt8 => ColumnKind::UInt8,
            DataType::UInt16 => ColumnKind::UInt16,
            DataType::UInt32 => ColumnKind::UInt32,
            DataType::UInt64 => ColumnKind::UInt64,
            DataType::Float32 => ColumnKind::Float32,
            DataType::Float64 => ColumnKind::Float64,
            DataType::String => ColumnKind::Str,
            _ => return None,
        };
        Some(kind)
    }

    pub fn dtype(self) -> DataType {
        match self {
            ColumnKind::Bool => DataType::Boolean,
            ColumnKind::Int8 => DataType::Int8,
            ColumnKind::Int16 => DataType::Int16,
            ColumnKind::Int32 => DataType::Int32,
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::UInt8 => DataType::UInt8,
            ColumnKind::UInt16 => DataType::UInt16,
            ColumnKind::UInt32 => DataType::UInt32,
            ColumnKind::UInt64 => DataType::UInt64,
            ColumnKind::Float32 => DataType::Float32,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Str => DataType::String,
        }
    }

    /// Tag written next to the column so the exact width survives a round trip.
    pub fn tag(self) -> &'static str {
        match self {
            ColumnKind::Bool => "bool",
            ColumnKind::Int8 => "int8",
            ColumnKind::Int16 => "int16",
            ColumnKind::Int32 => "int32",
            ColumnKind::Int64 => "int64",
            ColumnKind::UInt8 => "uint8",
            ColumnKind::UInt16 => "uint16",
            ColumnKind::UInt32 => "uint32",
            ColumnKind::UInt64 => "uint64",
            ColumnKind::Float32 => "float32",
            ColumnKind::Float64 => "float64",
            ColumnKind::Str => "str",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "bool" => ColumnKind::Bool,
            "int8" => ColumnKind::Int8,
            "int16" => ColumnKind::Int16,
            "int32" => ColumnKind::Int32,
            "int64" => ColumnKind::Int64,
            "uint8" => ColumnKind::UInt8,
            "uint16" => ColumnKind::UInt16,
            "uint32" => ColumnKind::UInt32,
            "uint64" => ColumnKind::UInt64,
            "float32" => ColumnKind::Float32,
            "float64" => ColumnKind::Float64,
            "str" => ColumnKind::Str,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_float(self) -> bool {
        matches!(self, ColumnKind::Float32 | ColumnKind::Float64)
    }
}
