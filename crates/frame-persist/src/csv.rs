//! CSV backend

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use polars::prelude::*;

use crate::error::{FileLoadError, FileSaveError};
use crate::options::{Converter, CsvLoadOptions, CsvSaveOptions, Header, OpenMode};
use crate::paths;

// ============ Load ============

/// Parse the CSV file at `path` into a DataFrame.
///
/// Columns with a converter are handed to it cell by cell; every other
/// column is strictly cast to `options.dtype` when one is set.
pub fn load(path: &Path, options: &CsvLoadOptions) -> Result<DataFrame, FileLoadError> {
    paths::require_file(path)?;
    log::info!("Loading CSV data from {}...", path.display());
    let df = read_csv(path, options)
        .inspect_err(|e| log::error!("Problem reading CSV {}: {e}", path.display()))?;
    log::info!("Successfully loaded CSV data ({} rows)", df.height());
    Ok(df)
}

fn read_csv(path: &Path, options: &CsvLoadOptions) -> Result<DataFrame, FileLoadError> {
    let (has_header, skip_rows) = match options.header {
        Header::Infer => (true, options.skip_rows),
        Header::None => (false, options.skip_rows),
        Header::Row(row) => (true, options.skip_rows + row),
    };

    let mut read = CsvReadOptions::default()
        .with_has_header(has_header)
        .with_skip_rows(skip_rows)
        .with_parse_options(CsvParseOptions::default().with_separator(options.separator));
    if options.dtype.is_some() {
        // Read everything as text so the cast below sees the original cells.
        read = read.with_infer_schema_length(Some(0));
    } else if !options.converters.is_empty() {
        let text_columns: Schema = options
            .converters
            .keys()
            .map(|name| Field::new(name.as_str().into(), DataType::String))
            .collect();
        read = read.with_schema_overwrite(Some(Arc::new(text_columns)));
    }

    let mut df = read
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    apply_column_types(&mut df, options)?;
    Ok(df)
}

fn apply_column_types(df: &mut DataFrame, options: &CsvLoadOptions) -> Result<(), FileLoadError> {
    for name in options.converters.keys() {
        if df.column(name).is_err() {
            return Err(FileLoadError::Malformed(format!(
                "converter given for missing column '{name}'"
            )));
        }
    }

    let names: Vec<PlSmallStr> = df.get_column_names().into_iter().cloned().collect();
    for name in names {
        let column = df.column(&name)?;
        let converted = match (options.converters.get(name.as_str()), &options.dtype) {
            (Some(converter), _) => convert_column(column, converter)?,
            (None, Some(dtype)) => column.strict_cast(dtype)?,
            (None, None) => continue,
        };
        df.with_column(converted)?;
    }
    Ok(())
}

fn convert_column(column: &Column, converter: &Converter) -> PolarsResult<Column> {
    let text = column.cast(&DataType::String)?;
    let values = text
        .str()?
        .into_iter()
        .map(|cell| match cell {
            Some(cell) => converter(cell),
            None => Ok(AnyValue::Null),
        })
        .collect::<PolarsResult<Vec<_>>>()?;
    Ok(Series::from_any_values(column.name().clone(), &values, false)?.into_column())
}

// ============ Save ============

/// Write `df` as CSV. Raw representation omits the header row.
///
/// In append mode the header is only written when the file is new or empty.
pub fn save(
    path: &Path,
    df: &DataFrame,
    mode: OpenMode,
    options: &CsvSaveOptions,
) -> Result<(), FileSaveError> {
    log::info!("Writing CSV to {}...", path.display());
    write_csv(path, df, mode, options)
        .inspect_err(|e| log::error!("Failed to write CSV {}: {e}", path.display()))?;
    log::info!("Successfully saved CSV data to {}", path.display());
    Ok(())
}

fn write_csv(
    path: &Path,
    df: &DataFrame,
    mode: OpenMode,
    options: &CsvSaveOptions,
) -> Result<(), FileSaveError> {
    let (file, fresh) = match mode {
        OpenMode::Read => return Err(FileSaveError::ReadOnly(path.to_path_buf())),
        OpenMode::Overwrite => (File::create(path)?, true),
        OpenMode::Append => {
            let fresh = fs::metadata(path).map_or(true, |meta| meta.len() == 0);
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (file, fresh)
        }
    };

    let mut df = df.clone();
    let mut writer = BufWriter::new(file);
    CsvWriter::new(&mut writer)
        .include_header(fresh && options.representation.is_structured())
        .with_separator(options.separator)
        .finish(&mut df)?;
    writer.flush()?;
    Ok(())
}
