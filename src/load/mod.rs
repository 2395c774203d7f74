//! Loaders that write a table file into a database backend
//!
//! The backend identifier selects one sink from a fixed dispatch table:
//!
//! | backend    | sink             | write semantics                     |
//! |------------|------------------|-------------------------------------|
//! | postgres   | [`SqlSink`]      | replace table                       |
//! | mysql      | [`SqlSink`]      | replace table                       |
//! | sqlite     | [`SqlSink`]      | replace table                       |
//! | duckdb     | [`DuckDbSink`]   | replace table                       |
//! | bigquery   | [`BigQuerySink`] | one load job, waited on             |
//! | snowflake  | [`SnowflakeSink`]| multi-row insert, explicit commit   |

mod bigquery;
mod ddl;
mod duckdb;
mod snowflake;
mod sql;

pub use bigquery::BigQuerySink;
pub use ddl::Dialect;
pub use self::duckdb::DuckDbSink;
pub use snowflake::SnowflakeSink;
pub use sql::SqlSink;

use crate::codec;
use crate::credentials::{CredentialSource, Credentials, FieldSpec};
use crate::error::EtlError;
use crate::etl::Loader;
use crate::storage::StagingStore;
use eyre::Result;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Table name used when none is given
pub const DEFAULT_TABLE: &str = "etl_data";

/// Supported load targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    Postgres,
    Mysql,
    Sqlite,
    DuckDb,
    BigQuery,
    Snowflake,
}

impl Backend {
    pub const ALL: [Backend; 6] = [
        Backend::Postgres,
        Backend::Mysql,
        Backend::Sqlite,
        Backend::DuckDb,
        Backend::BigQuery,
        Backend::Snowflake,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::DuckDb => "duckdb",
            Self::BigQuery => "bigquery",
            Self::Snowflake => "snowflake",
        }
    }

    /// Credential fields this backend needs, in prompt order
    pub fn credential_fields(&self) -> &'static [FieldSpec] {
        use crate::credentials::fields::*;
        match self {
            Self::Postgres => &[HOST, POSTGRES_PORT, DATABASE, USER, PASSWORD],
            Self::Mysql => &[HOST, MYSQL_PORT, DATABASE, USER, PASSWORD],
            Self::Sqlite => &[SQLITE_FILE],
            Self::DuckDb => &[DUCKDB_FILE],
            Self::BigQuery => &[PROJECT_ID, DATASET_ID, TOKEN],
            Self::Snowflake => &[ACCOUNT, USER, PASSWORD, DATABASE, SCHEMA],
        }
    }

    /// Build the sink for this backend from resolved credentials
    pub fn sink(&self, credentials: &Credentials, table: &str) -> Result<Box<dyn Loader>> {
        let sink: Box<dyn Loader> = match self {
            Self::Postgres | Self::Mysql | Self::Sqlite => {
                Box::new(SqlSink::try_new(*self, credentials, table)?)
            }
            Self::DuckDb => Box::new(DuckDbSink::new(credentials.require(*self, "database")?, table)),
            Self::BigQuery => Box::new(BigQuerySink::try_new(credentials, table)?),
            Self::Snowflake => Box::new(SnowflakeSink::try_new(credentials, table)?),
        };
        Ok(sink)
    }
}

impl FromStr for Backend {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EtlError::UnsupportedBackend(s.to_string()))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a load
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_written: usize,
    pub target: String,
}

/// A path as given, or the staged file of that name when the path does not exist
pub fn resolve_source(store: &StagingStore, path: &str) -> PathBuf {
    let direct = PathBuf::from(path);
    if direct.exists() {
        return direct;
    }
    let staged = store.path(path);
    if staged.exists() {
        log::debug!("Using staged file {}", staged.display());
        return staged;
    }
    direct
}

/// Request for one load
pub struct LoadRequest<'a> {
    pub path: &'a str,
    pub backend: &'a str,
    pub table: &'a str,
    pub supplied: Credentials,
}

/// Read a table file and write it to a backend.
///
/// The backend identifier and file are validated before any credential is
/// requested.
pub async fn load(
    store: &StagingStore,
    request: LoadRequest<'_>,
    source: &CredentialSource,
) -> Result<LoadReport> {
    let backend: Backend = request.backend.parse()?;
    let path = resolve_source(store, request.path);

    let data = codec::read_path(&path)?;
    log::info!(
        "Read {} rows x {} columns from {}",
        data.num_rows(),
        data.num_columns(),
        path.display()
    );

    let credentials = source.resolve(backend, request.supplied)?;
    log::debug!("Resolved credentials: {:?}", credentials);

    let sink = backend.sink(&credentials, request.table)?;
    let target = sink.target();
    log::info!("Loading into {}", target);

    let rows_written = sink.load(&data).await?;
    log::info!("Loaded {} row(s) into {}", rows_written, target);

    Ok(LoadReport {
        rows_written,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use crate::table::{Cell, Column, Table};
    use tempfile::TempDir;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("postgres".parse::<Backend>().unwrap(), Backend::Postgres);
        assert_eq!("DuckDB".parse::<Backend>().unwrap(), Backend::DuckDb);
        assert_eq!("bigquery".parse::<Backend>().unwrap(), Backend::BigQuery);

        let err = "oracle".parse::<Backend>().unwrap_err();
        assert!(matches!(err, EtlError::UnsupportedBackend(b) if b == "oracle"));
    }

    #[test]
    fn test_backend_round_trip_names() {
        for backend in Backend::ALL {
            assert_eq!(backend.to_string().parse::<Backend>().unwrap(), backend);
        }
    }

    #[test]
    fn test_credential_fields() {
        let names: Vec<_> = Backend::Postgres
            .credential_fields()
            .iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["host", "port", "database", "user", "password"]);
        assert_eq!(Backend::Mysql.credential_fields()[1].default, Some("3306"));
        assert_eq!(
            Backend::Sqlite.credential_fields()[0].default,
            Some("data_eng.sqlite")
        );
    }

    #[test]
    fn test_resolve_source_prefers_existing_path() {
        let temp = TempDir::new().unwrap();
        let store = StagingStore::new(temp.path().join("stage"));
        let table =
            Table::try_new(vec![Column::new("a", vec![Cell::Int(1)])]).unwrap();
        store.put("only_staged.csv", &table).unwrap();

        assert_eq!(
            resolve_source(&store, "only_staged.csv"),
            store.path("only_staged.csv")
        );
        assert_eq!(
            resolve_source(&store, "missing.csv"),
            PathBuf::from("missing.csv")
        );
    }

    #[tokio::test]
    async fn test_unknown_backend_checked_first() {
        let temp = TempDir::new().unwrap();
        let store = StagingStore::new(temp.path());
        let err = load(
            &store,
            LoadRequest {
                path: "does-not-matter.csv",
                backend: "oracle",
                table: DEFAULT_TABLE,
                supplied: Credentials::default(),
            },
            &CredentialSource::NonInteractive,
        )
        .await
        .unwrap_err();
        assert!(matches!(classify(&err), Some(EtlError::UnsupportedBackend(_))));
    }

    #[tokio::test]
    async fn test_unsupported_file_rejected() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("notes.txt");
        std::fs::write(&source, "x").unwrap();
        let store = StagingStore::new(temp.path());

        let err = load(
            &store,
            LoadRequest {
                path: source.to_str().unwrap(),
                backend: "sqlite",
                table: DEFAULT_TABLE,
                supplied: Credentials::default(),
            },
            &CredentialSource::NonInteractive,
        )
        .await
        .unwrap_err();
        assert!(matches!(classify(&err), Some(EtlError::UnsupportedFormat(_))));
    }
}
