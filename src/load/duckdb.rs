//! DuckDB sink

use super::ddl::{Dialect, SqlValue, bind_rows};
use crate::etl::Loader;
use crate::table::Table;
use async_trait::async_trait;
use duckdb::types::Value;
use eyre::{Context, Result};
use std::path::{Path, PathBuf};

/// Replaces a table in a DuckDB database file, creating the file if needed.
///
/// The driver is synchronous, so the write runs on a blocking task.
pub struct DuckDbSink {
    path: PathBuf,
    table: String,
}

impl DuckDbSink {
    pub fn new(path: impl AsRef<Path>, table: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            table: table.to_string(),
        }
    }
}

impl From<SqlValue> for Value {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Int(v) => v.map_or(Value::Null, Value::BigInt),
            SqlValue::Float(v) => v.map_or(Value::Null, Value::Double),
            SqlValue::Bool(v) => v.map_or(Value::Null, Value::Boolean),
            SqlValue::Text(v) => v.map_or(Value::Null, Value::Text),
        }
    }
}

fn replace_table(path: &Path, name: &str, table: &Table) -> Result<usize> {
    let dialect = Dialect::DuckDb;
    let create = dialect.create_table(name, table)?;
    let names = table.column_names();
    let batch = dialect.rows_per_insert(names.len());

    let mut conn = duckdb::Connection::open(path)
        .with_context(|| format!("Failed to open DuckDB file {}", path.display()))?;
    let tx = conn.transaction().wrap_err("Failed to start transaction")?;

    tx.execute_batch(&dialect.drop_table(name))
        .wrap_err("Failed to drop table")?;
    log::debug!("{}", create);
    tx.execute_batch(&create).wrap_err("Failed to create table")?;

    let mut written = 0;
    let mut start = 0;
    while start < table.num_rows() {
        let end = (start + batch).min(table.num_rows());
        let sql = dialect.insert(name, &names, end - start);
        let values = bind_rows(table, start, end).into_iter().map(Value::from);
        written += tx
            .execute(&sql, duckdb::params_from_iter(values))
            .with_context(|| format!("Failed to insert rows {}..{}", start, end))?;
        start = end;
    }

    tx.commit().wrap_err("Failed to commit")?;
    Ok(written)
}

#[async_trait]
impl Loader for DuckDbSink {
    fn target(&self) -> String {
        format!("duckdb -> {}", self.table)
    }

    async fn load(&self, table: &Table) -> Result<usize> {
        let path = self.path.clone();
        let name = self.table.clone();
        let table = table.clone();
        log::debug!("Writing {} to {}", name, path.display());
        tokio::task::spawn_blocking(move || replace_table(&path, &name, &table))
            .await
            .wrap_err("DuckDB writer task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Column};
    use tempfile::TempDir;

    fn sample(rows: i64) -> Table {
        Table::try_new(vec![
            Column::new("id", (0..rows).map(Cell::Int).collect()),
            Column::new(
                "flag",
                (0..rows).map(|i| Cell::Bool(i % 2 == 0)).collect(),
            ),
            Column::new(
                "note",
                (0..rows)
                    .map(|i| if i == 0 { Cell::Null } else { Cell::Str(format!("n{}", i)) })
                    .collect(),
            ),
        ])
        .unwrap()
    }

    fn count(path: &Path, table: &str) -> i64 {
        let conn = duckdb::Connection::open(path).unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_duckdb_replaces_table() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("load.duckdb");
        let sink = DuckDbSink::new(&file, "etl_data");

        assert_eq!(sink.load(&sample(4)).await.unwrap(), 4);
        assert_eq!(sink.load(&sample(2)).await.unwrap(), 2);
        assert_eq!(count(&file, "etl_data"), 2);
    }

    #[tokio::test]
    async fn test_duckdb_keeps_nulls() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("nulls.duckdb");
        DuckDbSink::new(&file, "t").load(&sample(3)).await.unwrap();

        let conn = duckdb::Connection::open(&file).unwrap();
        let nulls: i64 = conn
            .query_row("SELECT COUNT(*) FROM t WHERE note IS NULL", [], |row| row.get(0))
            .unwrap();
        assert_eq!(nulls, 1);
    }

    #[test]
    fn test_target() {
        assert_eq!(DuckDbSink::new("x.duckdb", "sales").target(), "duckdb -> sales");
    }
}
