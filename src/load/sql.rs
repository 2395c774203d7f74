//! Relational sink for postgres, mysql and sqlite over `sqlx`'s `Any` driver

use super::Backend;
use super::ddl::{Dialect, SqlValue, bind_rows};
use crate::credentials::Credentials;
use crate::error::EtlError;
use crate::etl::Loader;
use crate::table::Table;
use async_trait::async_trait;
use eyre::{Context, Result, eyre};
use sqlx::AnyConnection;
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;
use sqlx::Connection;
use url::Url;

/// Replaces a table in a postgres, mysql or sqlite database.
///
/// The drop, create and batched inserts run in one transaction.
pub struct SqlSink {
    dialect: Dialect,
    url: Url,
    table: String,
}

impl SqlSink {
    pub fn try_new(backend: Backend, credentials: &Credentials, table: &str) -> Result<Self> {
        let dialect = Dialect::for_backend(backend)
            .filter(|d| *d != Dialect::DuckDb)
            .ok_or_else(|| EtlError::UnsupportedBackend(backend.to_string()))?;
        let url = connection_url(backend, credentials)?;
        Ok(Self {
            dialect,
            url,
            table: table.to_string(),
        })
    }

    /// Connection URL with the password masked
    fn display_url(&self) -> String {
        let mut url = self.url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("***"));
        }
        url.to_string()
    }
}

/// Build a driver URL from credentials, percent-encoding user and password
pub(crate) fn connection_url(backend: Backend, credentials: &Credentials) -> Result<Url> {
    let database = credentials.require(backend, "database")?;
    if backend == Backend::Sqlite {
        return sqlite_url(database);
    }

    let scheme = match backend {
        Backend::Postgres => "postgres",
        Backend::Mysql => "mysql",
        other => return Err(EtlError::UnsupportedBackend(other.to_string()).into()),
    };
    let host = credentials.require(backend, "host")?;
    let port_text = credentials.require(backend, "port")?;
    let port: u16 = port_text
        .parse()
        .map_err(|_| EtlError::InvalidArgument(format!("port '{}' is not a number", port_text)))?;

    let mut url = Url::parse(&format!("{}://{}", scheme, host))
        .map_err(|e| EtlError::InvalidArgument(format!("host '{}': {}", host, e)))?;
    url.set_port(Some(port))
        .map_err(|_| eyre!("Cannot set port on {}", url))?;
    url.set_username(credentials.require(backend, "user")?)
        .map_err(|_| eyre!("Cannot set user on {}", url))?;
    url.set_password(Some(credentials.require(backend, "password")?))
        .map_err(|_| eyre!("Cannot set password on {}", url))?;
    url.set_path(&format!("/{}", database.trim_start_matches('/')));
    Ok(url)
}

/// `sqlite:` URL for a database file, relative paths resolved against the
/// working directory and the path percent-encoded
fn sqlite_url(database: &str) -> Result<Url> {
    let path = std::path::absolute(database)
        .map_err(EtlError::from)
        .with_context(|| format!("Failed to resolve sqlite path '{}'", database))?;
    let file = Url::from_file_path(&path).map_err(|_| {
        EtlError::InvalidArgument(format!("sqlite path '{}' is not a file path", database))
    })?;
    let mut url = Url::parse(&format!("sqlite://{}", file.path()))
        .map_err(|e| EtlError::InvalidArgument(format!("sqlite path '{}': {}", database, e)))?;
    url.set_query(Some("mode=rwc"));
    Ok(url)
}

fn bind<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        SqlValue::Int(v) => query.bind(v),
        SqlValue::Float(v) => query.bind(v),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
    }
}

#[async_trait]
impl Loader for SqlSink {
    fn target(&self) -> String {
        format!("{} -> {}", self.url.scheme(), self.table)
    }

    async fn load(&self, table: &Table) -> Result<usize> {
        sqlx::any::install_default_drivers();
        log::debug!("Connecting to {}", self.display_url());

        let mut conn = AnyConnection::connect(self.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", self.display_url()))?;

        let drop = self.dialect.drop_table(&self.table);
        let create = self.dialect.create_table(&self.table, table)?;
        let names = table.column_names();
        let batch = self.dialect.rows_per_insert(names.len());

        let mut tx = conn.begin().await.wrap_err("Failed to start transaction")?;
        log::debug!("{}", drop);
        sqlx::query::<Any>(&drop)
            .execute(&mut *tx)
            .await
            .wrap_err("Failed to drop table")?;
        log::debug!("{}", create);
        sqlx::query::<Any>(&create)
            .execute(&mut *tx)
            .await
            .wrap_err("Failed to create table")?;

        let mut written = 0;
        let mut start = 0;
        while start < table.num_rows() {
            let end = (start + batch).min(table.num_rows());
            let sql = self.dialect.insert(&self.table, &names, end - start);
            let mut query = sqlx::query::<Any>(&sql);
            for value in bind_rows(table, start, end) {
                query = bind(query, value);
            }
            let result = query
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert rows {}..{}", start, end))?;
            written += result.rows_affected() as usize;
            log::trace!("Inserted rows {}..{}", start, end);
            start = end;
        }

        tx.commit().await.wrap_err("Failed to commit")?;
        conn.close().await.ok();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Column};
    use tempfile::TempDir;

    fn pg_credentials() -> Credentials {
        Credentials::new()
            .with("host", "db.internal")
            .with("port", "5433")
            .with("database", "warehouse")
            .with("user", "etl")
            .with("password", "p@ss/word")
    }

    #[test]
    fn test_postgres_url_encodes_password() {
        let url = connection_url(Backend::Postgres, &pg_credentials()).unwrap();
        assert_eq!(url.scheme(), "postgres");
        assert_eq!(url.host_str(), Some("db.internal"));
        assert_eq!(url.port(), Some(5433));
        assert_eq!(url.path(), "/warehouse");
        assert_eq!(url.password(), Some("p%40ss%2Fword"));
    }

    #[test]
    fn test_sqlite_url_relative_path_with_space() {
        let url = connection_url(
            Backend::Sqlite,
            &Credentials::new().with("database", "my data.sqlite"),
        )
        .unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(url.scheme(), "sqlite");
        assert_eq!(url.query(), Some("mode=rwc"));
        assert!(url.path().ends_with("/my%20data.sqlite"));
        assert_eq!(
            Url::from_file_path(cwd.join("my data.sqlite")).unwrap().path(),
            url.path()
        );
    }

    #[test]
    fn test_bad_port_rejected() {
        let credentials = pg_credentials().with("port", "five");
        let err = connection_url(Backend::Mysql, &credentials).unwrap_err();
        assert!(err.to_string().contains("five"));
    }

    #[test]
    fn test_display_url_masks_password() {
        let sink = SqlSink::try_new(Backend::Postgres, &pg_credentials(), "t").unwrap();
        let shown = sink.display_url();
        assert!(!shown.contains("p%40ss"));
        assert!(shown.contains("***"));
        assert_eq!(sink.target(), "postgres -> t");
    }

    fn numbers(n: i64) -> Table {
        Table::try_new(vec![
            Column::new("id", (0..n).map(Cell::Int).collect()),
            Column::new(
                "label",
                (0..n)
                    .map(|i| if i % 2 == 0 { Cell::Str(format!("row {}", i)) } else { Cell::Null })
                    .collect(),
            ),
            Column::new("ratio", (0..n).map(|i| Cell::Float(i as f64 / 2.0)).collect()),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_replaces_table() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("load.sqlite");
        let credentials = Credentials::new().with("database", file.to_str().unwrap());
        let sink = SqlSink::try_new(Backend::Sqlite, &credentials, "etl_data").unwrap();

        assert_eq!(sink.load(&numbers(5)).await.unwrap(), 5);
        assert_eq!(sink.load(&numbers(3)).await.unwrap(), 3);

        sqlx::any::install_default_drivers();
        let mut conn = AnyConnection::connect(sink.url.as_str()).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM etl_data")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_sqlite_batches_large_tables() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("big.sqlite");
        let credentials = Credentials::new().with("database", file.to_str().unwrap());
        let sink = SqlSink::try_new(Backend::Sqlite, &credentials, "big").unwrap();

        assert_eq!(sink.load(&numbers(12_000)).await.unwrap(), 12_000);
    }
}
