//! In-memory tabular model
//!
//! A [`Table`] is an ordered list of named [`Column`]s of equal length. Every
//! codec decodes into it and every sink reads from it.

use crate::error::EtlError;
use eyre::Result;
use std::fmt;

/// A single scalar value
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Storage kind of this cell on its own
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Null => ColumnKind::Null,
            Self::Bool(_) => ColumnKind::Bool,
            Self::Int(_) => ColumnKind::Int,
            Self::Float(f) if f.is_nan() => ColumnKind::Null,
            Self::Float(_) => ColumnKind::Float,
            Self::Str(_) => ColumnKind::Str,
        }
    }

    /// Convert to a JSON value; non-finite floats become null
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Text rendering used by CSV output and string-equality filters.
///
/// Whole floats keep a trailing `.0` so they decode back as floats.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{:.1}", v)
            }
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Inferred storage type of a column
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every value is null
    Null,
    Bool,
    Int,
    Float,
    Str,
}

impl ColumnKind {
    /// Widen two kinds to one that holds both
    pub fn merge(self, other: ColumnKind) -> ColumnKind {
        use ColumnKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Null, k) | (k, Null) => k,
            (Int, Float) | (Float, Int) => Float,
            _ => Str,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        self.values
            .iter()
            .fold(ColumnKind::Null, |acc, cell| acc.merge(cell.kind()))
    }
}

/// Ordered named columns with aligned rows
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking that names are unique and lengths agree
    pub fn try_new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let rows = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != rows) {
                return Err(EtlError::MalformedInput(format!(
                    "column '{}' has {} values, expected {}",
                    bad.name,
                    bad.values.len(),
                    rows
                ))
                .into());
            }
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(EtlError::DuplicateColumn(column.name.clone()).into());
            }
        }
        Ok(Self { columns })
    }

    /// Build a table from a header and row-major values
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(EtlError::MalformedInput(format!(
                    "row {} has {} fields, expected {}",
                    index + 1,
                    row.len(),
                    columns.len()
                ))
                .into());
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.values.push(cell);
            }
        }
        Self::try_new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Values of one row, in column order
    pub fn row(&self, index: usize) -> Vec<&Cell> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        (0..self.num_rows()).map(|i| self.row(i))
    }

    /// New table holding only the rows for which `keep` is true
    pub fn retain_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Table {
        let mask: Vec<bool> = (0..self.num_rows()).map(&mut keep).collect();
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let values = column
                    .values
                    .iter()
                    .zip(&mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(cell, _)| cell.clone())
                    .collect();
                Column::new(column.name.clone(), values)
            })
            .collect();
        Table { columns }
    }

    /// Rename one column in place
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.column(new).is_some() {
            return Err(EtlError::DuplicateColumn(new.to_string()).into());
        }
        match self.columns.iter_mut().find(|c| c.name == old) {
            Some(column) => {
                column.name = new.to_string();
                Ok(())
            }
            None => Err(EtlError::ColumnNotFound(old.to_string()).into()),
        }
    }
}
