//! Typed configuration for the save and load entry points.
//!
//! Each backend gets its own option type so that flags only reach the backend
//! that understands them. `Format` and `OpenMode` also parse from the short
//! string tags used by older pipeline configs (`"hdf5"`, `"a"`, ...).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use polars::prelude::{AnyValue, DataType, PolarsResult};
use serde::{Deserialize, Serialize};

use crate::error::ParseOptionError;

/// Dataset key used for structured HDF5 tables when the caller gives none.
pub const DEFAULT_HDF5_KEY: &str = "table";

// ============ Tags ============

/// On-disk format handled by one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Hdf5,
    Csv,
    Pickle,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Hdf5 => "hdf5",
            Format::Csv => "csv",
            Format::Pickle => "pickle",
        };
        f.write_str(name)
    }
}

impl FromStr for Format {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hdf5" | "h5" => Ok(Format::Hdf5),
            "csv" => Ok(Format::Csv),
            "pickle" | "pkl" => Ok(Format::Pickle),
            _ => Err(ParseOptionError {
                kind: "format",
                value: s.to_string(),
            }),
        }
    }
}

/// How the target file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    Read,
    /// Open for writing, creating the file if needed and keeping its contents.
    #[default]
    Append,
    /// Replace any existing file.
    Overwrite,
}

impl FromStr for OpenMode {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "read" => Ok(OpenMode::Read),
            "a" | "append" => Ok(OpenMode::Append),
            "w" | "write" | "overwrite" => Ok(OpenMode::Overwrite),
            _ => Err(ParseOptionError {
                kind: "open mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Whether a table keeps its labels and column types on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    /// Library-native tabular layout with column names and dtypes.
    #[default]
    Structured,
    /// Plain numeric matrix, labels dropped.
    Raw,
}

impl Representation {
    pub fn from_structured(structured: bool) -> Self {
        if structured {
            Representation::Structured
        } else {
            Representation::Raw
        }
    }

    pub fn is_structured(self) -> bool {
        self == Representation::Structured
    }
}

// ============ HDF5 ============

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuredOptions {
    /// Group holding the table. Falls back to [`DEFAULT_HDF5_KEY`].
    #[serde(default)]
    pub key: Option<String>,
    /// Extend an existing table instead of replacing it. Ignored on load.
    #[serde(default)]
    pub append: bool,
}

impl StructuredOptions {
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(DEFAULT_HDF5_KEY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOptions {
    /// Dataset name. Must not be empty.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "lowercase")]
pub enum Hdf5Options {
    Structured(StructuredOptions),
    Raw(RawOptions),
}

impl Hdf5Options {
    pub fn structured(key: impl Into<String>) -> Self {
        Hdf5Options::Structured(StructuredOptions {
            key: Some(key.into()),
            append: false,
        })
    }

    pub fn raw(key: impl Into<String>) -> Self {
        Hdf5Options::Raw(RawOptions { key: key.into() })
    }

    /// Switch a structured layout to appending rows. No effect on raw layouts.
    pub fn with_append(mut self, append: bool) -> Self {
        if let Hdf5Options::Structured(opts) = &mut self {
            opts.append = append;
        }
        self
    }

    pub fn representation(&self) -> Representation {
        match self {
            Hdf5Options::Structured(_) => Representation::Structured,
            Hdf5Options::Raw(_) => Representation::Raw,
        }
    }
}

impl Default for Hdf5Options {
    fn default() -> Self {
        Hdf5Options::Structured(StructuredOptions::default())
    }
}

// ============ CSV ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvSaveOptions {
    #[serde(default)]
    pub representation: Representation,
    #[serde(default = "default_separator")]
    pub separator: u8,
}

impl Default for CsvSaveOptions {
    fn default() -> Self {
        Self {
            representation: Representation::Structured,
            separator: default_separator(),
        }
    }
}

fn default_separator() -> u8 {
    b','
}

/// Where the CSV header comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Header {
    /// The first line (after skipped rows) holds the column names.
    #[default]
    Infer,
    /// No header; columns get positional names.
    None,
    /// The header sits on this line, counted after skipped rows.
    Row(usize),
}

/// Per-column parser applied to the raw cell text. Null cells bypass it.
pub type Converter = Arc<dyn Fn(&str) -> PolarsResult<AnyValue<'static>> + Send + Sync>;

#[derive(Clone)]
pub struct CsvLoadOptions {
    pub header: Header,
    /// Cast applied to every column without a converter. `None` keeps the
    /// types polars infers.
    pub dtype: Option<DataType>,
    pub converters: HashMap<String, Converter>,
    /// Lines dropped from the top of the file before the header is read.
    pub skip_rows: usize,
    pub separator: u8,
}

impl Default for CsvLoadOptions {
    fn default() -> Self {
        Self {
            header: Header::Infer,
            dtype: Some(DataType::Float32),
            converters: HashMap::new(),
            skip_rows: 0,
            separator: b',',
        }
    }
}

impl fmt::Debug for CsvLoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut converters: Vec<_> = self.converters.keys().collect();
        converters.sort();
        f.debug_struct("CsvLoadOptions")
            .field("header", &self.header)
            .field("dtype", &self.dtype)
            .field("converters", &converters)
            .field("skip_rows", &self.skip_rows)
            .field("separator", &(self.separator as char))
            .finish()
    }
}

impl CsvLoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.header = header;
        self
    }

    pub fn with_dtype(mut self, dtype: Option<DataType>) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_converter<F>(mut self, column: impl Into<String>, converter: F) -> Self
    where
        F: Fn(&str) -> PolarsResult<AnyValue<'static>> + Send + Sync + 'static,
    {
        self.converters.insert(column.into(), Arc::new(converter));
        self
    }
}

// ============ Dispatcher ============

/// Backend selection plus the options only that backend understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum BackendOptions {
    Hdf5(Hdf5Options),
    Csv(CsvSaveOptions),
    Pickle {
        #[serde(default)]
        representation: Representation,
    },
}

impl BackendOptions {
    pub fn format(&self) -> Format {
        match self {
            BackendOptions::Hdf5(_) => Format::Hdf5,
            BackendOptions::Csv(_) => Format::Csv,
            BackendOptions::Pickle { .. } => Format::Pickle,
        }
    }
}

/// Structured HDF5 when the `hdf5` feature is compiled in, structured
/// pickle otherwise, so the default always names an available backend.
impl Default for BackendOptions {
    #[cfg(feature = "hdf5")]
    fn default() -> Self {
        BackendOptions::Hdf5(Hdf5Options::default())
    }

    #[cfg(not(feature = "hdf5"))]
    fn default() -> Self {
        BackendOptions::Pickle {
            representation: Representation::Structured,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaveOptions {
    #[serde(default)]
    pub mode: OpenMode,
    #[serde(flatten)]
    pub backend: BackendOptions,
}

impl SaveOptions {
    pub fn new(backend: BackendOptions) -> Self {
        Self {
            mode: OpenMode::default(),
            backend,
        }
    }

    pub fn hdf5(options: Hdf5Options) -> Self {
        Self::new(BackendOptions::Hdf5(options))
    }

    pub fn csv(options: CsvSaveOptions) -> Self {
        Self::new(BackendOptions::Csv(options))
    }

    pub fn pickle(representation: Representation) -> Self {
        Self::new(BackendOptions::Pickle { representation })
    }

    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn format(&self) -> Format {
        self.backend.format()
    }
}

#[derive(Debug, Clone)]
pub enum LoadBackend {
    Hdf5(Hdf5Options),
    Csv(CsvLoadOptions),
    Pickle { representation: Representation },
}

impl LoadBackend {
    pub fn format(&self) -> Format {
        match self {
            LoadBackend::Hdf5(_) => Format::Hdf5,
            LoadBackend::Csv(_) => Format::Csv,
            LoadBackend::Pickle { .. } => Format::Pickle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Only consulted by HDF5: a read-only load of a missing file fails,
    /// otherwise the file is created on open.
    pub read_only: bool,
    pub backend: LoadBackend,
}

impl LoadOptions {
    pub fn new(backend: LoadBackend) -> Self {
        Self {
            read_only: true,
            backend,
        }
    }

    pub fn hdf5(options: Hdf5Options) -> Self {
        Self::new(LoadBackend::Hdf5(options))
    }

    pub fn csv(options: CsvLoadOptions) -> Self {
        Self::new(LoadBackend::Csv(options))
    }

    pub fn pickle(representation: Representation) -> Self {
        Self::new(LoadBackend::Pickle { representation })
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
