//! CSV codec with per-column type inference

use crate::error::EtlError;
use crate::table::{Cell, Column, ColumnKind, Table};
use eyre::{Context, Result};

/// Field values read as missing
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub(super) fn decode(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| EtlError::MalformedInput(format!("unreadable CSV header: {}", e)))?
        .clone();
    if headers.is_empty() {
        return Err(EtlError::MalformedInput("CSV input has no header row".to_string()).into());
    }
    let names = dedupe_names(headers.iter());

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            EtlError::MalformedInput(format!("CSV record {}: {}", index + 1, e))
        })?;
        for (column, field) in raw.iter_mut().zip(record.iter()) {
            column.push(field.to_string());
        }
    }

    let columns = names
        .into_iter()
        .zip(raw)
        .map(|(name, fields)| Column::new(name, infer_column(&fields)))
        .collect();
    Table::try_new(columns)
}

pub(super) fn encode(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.column_names())
        .context("Failed to write CSV header")?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|cell| cell.to_string()))
            .context("Failed to write CSV record")?;
    }
    writer
        .into_inner()
        .map_err(|e| eyre::eyre!("Failed to flush CSV output: {}", e))
}

/// Make header names unique the way spreadsheet tools do: `a`, `a.1`, `a.2`
fn dedupe_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for header in headers {
        let mut name = header.to_string();
        let mut suffix = 1;
        while names.contains(&name) {
            name = format!("{}.{}", header, suffix);
            suffix += 1;
        }
        names.push(name);
    }
    names
}

fn is_missing(field: &str) -> bool {
    MISSING_MARKERS.contains(&field)
}

fn parse_bool(field: &str) -> Option<bool> {
    match field {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Pick the narrowest kind every non-missing field parses as, then convert
fn infer_column(fields: &[String]) -> Vec<Cell> {
    let present = || fields.iter().filter(|f| !is_missing(f));

    let kind = if present().next().is_none() {
        ColumnKind::Null
    } else if present().all(|f| f.parse::<i64>().is_ok()) {
        ColumnKind::Int
    } else if present().all(|f| f.parse::<f64>().is_ok()) {
        ColumnKind::Float
    } else if present().all(|f| parse_bool(f).is_some()) {
        ColumnKind::Bool
    } else {
        ColumnKind::Str
    };

    fields
        .iter()
        .map(|field| {
            if is_missing(field) {
                return Cell::Null;
            }
            match kind {
                ColumnKind::Int => field.parse().map(Cell::Int).unwrap_or(Cell::Null),
                ColumnKind::Float => field.parse().map(Cell::Float).unwrap_or(Cell::Null),
                ColumnKind::Bool => parse_bool(field).map(Cell::Bool).unwrap_or(Cell::Null),
                ColumnKind::Null | ColumnKind::Str => Cell::Str(field.clone()),
            }
        })
        .collect()
}
