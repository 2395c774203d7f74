//! Error taxonomy for extract, transform and load operations
//!
//! Operations return [`eyre::Result`]; the domain failures below are raised as
//! [`EtlError`] values inside the report so callers can classify them with
//! `report.downcast_ref::<EtlError>()`.

use std::path::PathBuf;

/// Domain errors raised by the pipeline stages
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// A file, directory or staged artifact does not exist
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File extension or `--format` value is not csv, json or parquet
    #[error("unsupported format '{0}' (use csv, json or parquet)")]
    UnsupportedFormat(String),

    /// Backend identifier is not in the dispatch table
    #[error("unsupported backend '{0}' (use postgres, mysql, sqlite, duckdb, bigquery or snowflake)")]
    UnsupportedBackend(String),

    /// Input could not be decoded into a table
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A transformation referenced a column the table does not have
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A rename would leave two columns with the same name
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// A command argument could not be interpreted
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Credentials were absent and prompting is not allowed
    #[error("missing credentials for {backend}: {}", .fields.join(", "))]
    MissingCredentials {
        backend: String,
        fields: Vec<String>,
    },

    /// Remote source answered with a non-success status
    #[error("failed to fetch data (status code {status})")]
    RemoteFetchFailure { status: u16 },

    /// Remote backend rejected or failed a write
    #[error("{backend} write failed: {detail}")]
    RemoteWriteFailure { backend: String, detail: String },

    /// Filesystem failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    /// True for per-file failures that directory extraction skips over
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_) | Self::MalformedInput(_))
    }
}

/// Find the [`EtlError`] carried by a report, if any
pub fn classify(report: &eyre::Report) -> Option<&EtlError> {
    report.downcast_ref::<EtlError>()
}
