//! SQL text for replacing a table in a relational backend

use super::Backend;
use crate::error::EtlError;
use crate::table::{Cell, ColumnKind, Table};
use eyre::Result;

/// SQL flavor of a relational backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
    DuckDb,
}

impl Dialect {
    /// Dialect for a relational backend; `None` for warehouses
    pub fn for_backend(backend: Backend) -> Option<Self> {
        match backend {
            Backend::Postgres => Some(Self::Postgres),
            Backend::Mysql => Some(Self::Mysql),
            Backend::Sqlite => Some(Self::Sqlite),
            Backend::DuckDb => Some(Self::DuckDb),
            Backend::BigQuery | Backend::Snowflake => None,
        }
    }

    /// Quote an identifier, doubling any embedded quote character
    pub fn quote(&self, ident: &str) -> String {
        let q = match self {
            Self::Mysql => '`',
            _ => '"',
        };
        let escaped = ident.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Column type for values of `kind`
    pub fn column_type(&self, kind: ColumnKind) -> &'static str {
        match (self, kind) {
            (_, ColumnKind::Int) => "BIGINT",
            (Self::Postgres, ColumnKind::Float) => "DOUBLE PRECISION",
            (Self::Sqlite, ColumnKind::Float) => "REAL",
            (_, ColumnKind::Float) => "DOUBLE",
            (_, ColumnKind::Bool) => "BOOLEAN",
            (_, ColumnKind::Str | ColumnKind::Null) => "TEXT",
        }
    }

    /// Bind placeholder for the 1-based parameter `n`
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${}", n),
            Self::DuckDb => format!("${}", n),
            Self::Mysql | Self::Sqlite => "?".to_string(),
        }
    }

    /// Upper bound on bind parameters in one statement
    pub fn max_parameters(&self) -> usize {
        match self {
            Self::Postgres | Self::Mysql => 65_535,
            Self::Sqlite => 32_766,
            Self::DuckDb => 999,
        }
    }

    /// Rows per INSERT so a batch stays under the parameter limit
    pub fn rows_per_insert(&self, columns: usize) -> usize {
        (self.max_parameters() / columns.max(1)).max(1)
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote(table))
    }

    /// `CREATE TABLE` with one column per table column, typed by content
    pub fn create_table(&self, name: &str, table: &Table) -> Result<String> {
        if table.num_columns() == 0 {
            return Err(EtlError::MalformedInput("table has no columns to load".to_string()).into());
        }
        let columns: Vec<String> = table
            .columns()
            .iter()
            .map(|c| format!("{} {}", self.quote(&c.name), self.column_type(c.kind())))
            .collect();
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.quote(name),
            columns.join(", ")
        ))
    }

    /// Multi-row `INSERT` for `rows` rows of `columns`
    pub fn insert(&self, table: &str, columns: &[&str], rows: usize) -> String {
        let names: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
        let mut n = 0;
        let tuples: Vec<String> = (0..rows)
            .map(|_| {
                let slots: Vec<String> = columns
                    .iter()
                    .map(|_| {
                        n += 1;
                        self.placeholder(n)
                    })
                    .collect();
                format!("({})", slots.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote(table),
            names.join(", "),
            tuples.join(", ")
        )
    }
}

/// A cell converted to the bind type of its column
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Int(Option<i64>),
    Float(Option<f64>),
    Bool(Option<bool>),
    Text(Option<String>),
}

impl SqlValue {
    /// Bind value for `cell` in a column of `kind`
    ///
    /// Integers widen to floats in float columns; mixed columns bind text.
    pub fn from_cell(kind: ColumnKind, cell: &Cell) -> Self {
        if cell.is_null() {
            return match kind {
                ColumnKind::Int => Self::Int(None),
                ColumnKind::Float => Self::Float(None),
                ColumnKind::Bool => Self::Bool(None),
                ColumnKind::Str | ColumnKind::Null => Self::Text(None),
            };
        }
        match (kind, cell) {
            (ColumnKind::Int, Cell::Int(i)) => Self::Int(Some(*i)),
            (ColumnKind::Float, Cell::Int(i)) => Self::Float(Some(*i as f64)),
            (ColumnKind::Float, Cell::Float(f)) => Self::Float(Some(*f)),
            (ColumnKind::Bool, Cell::Bool(b)) => Self::Bool(Some(*b)),
            (_, other) => Self::Text(Some(other.to_string())),
        }
    }
}

/// Row-major bind values for rows `start..end`
pub fn bind_rows(table: &Table, start: usize, end: usize) -> Vec<SqlValue> {
    let kinds: Vec<ColumnKind> = table.columns().iter().map(|c| c.kind()).collect();
    let mut values = Vec::with_capacity((end - start) * kinds.len());
    for row in start..end {
        for (column, kind) in table.columns().iter().zip(&kinds) {
            values.push(SqlValue::from_cell(*kind, &column.values[row]));
        }
    }
    values
}
