//! Format dispatch for the tabular codecs
//!
//! Every supported file format maps to a decoder and an encoder over
//! [`Table`]. The format of a file is chosen by its extension.

mod csv;
mod json;
mod parquet;

use crate::error::EtlError;
use crate::table::Table;
use clap::ValueEnum;
use eyre::{Context, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// On-disk tabular formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum Format {
    Csv,
    Json,
    Parquet,
}

impl Format {
    /// Format named by a path's extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Ok(ext.parse::<Format>()?)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Parquet => "parquet",
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Table> {
        match self {
            Self::Csv => csv::decode(bytes),
            Self::Json => json::decode(bytes),
            Self::Parquet => parquet::decode(bytes),
        }
    }

    pub fn encode(&self, table: &Table) -> Result<Vec<u8>> {
        match self {
            Self::Csv => csv::encode(table),
            Self::Json => json::encode(table),
            Self::Parquet => parquet::encode(table),
        }
    }
}

impl FromStr for Format {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "parquet" => Ok(Self::Parquet),
            _ => Err(EtlError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Decode a file, choosing the codec by extension.
///
/// The extension is checked before the file is opened, so an unsupported
/// file fails with `UnsupportedFormat` even when unreadable.
pub fn read_path(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    if !path.exists() {
        return Err(EtlError::NotFound(path.to_path_buf()).into());
    }
    let bytes = std::fs::read(path)
        .map_err(EtlError::from)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    format
        .decode(&bytes)
        .with_context(|| format!("Failed to decode {} as {}", path.display(), format))
}

/// Encode a table fully in memory, then write it to `path`
pub fn write_path(path: impl AsRef<Path>, table: &Table) -> Result<Format> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    let bytes = format.encode(table)?;
    std::fs::write(path, bytes)
        .map_err(EtlError::from)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(format)
}
