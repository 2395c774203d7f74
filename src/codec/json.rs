//! JSON codec
//!
//! Decoding accepts record-oriented arrays (`[{"a": 1}, ...]`), column-oriented
//! objects (`{"a": [1, 2]}` or `{"a": {"0": 1, "1": 2}}`) and newline-delimited
//! records. Encoding always writes newline-delimited records, so a table with no
//! rows encodes to an empty document and its columns are not kept.

use crate::error::EtlError;
use crate::table::{Cell, Column, Table};
use eyre::Result;
use serde_json::{Map, Value};

pub(super) fn decode(bytes: &[u8]) -> Result<Table> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| EtlError::MalformedInput(format!("JSON input is not UTF-8: {}", e)))?;

    if text.trim().is_empty() {
        return Ok(Table::default());
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => from_records(items),
        // a lone record, as written for a one-row table
        Ok(Value::Object(map)) if !map.is_empty() && map.values().all(is_scalar) => {
            from_records(vec![Value::Object(map)])
        }
        Ok(Value::Object(map)) => from_columns(map),
        Ok(other) => Err(EtlError::MalformedInput(format!(
            "expected an array of records or an object of columns, found {}",
            type_name(&other)
        ))
        .into()),
        Err(document_err) => {
            let records = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str::<Value>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| EtlError::MalformedInput(format!("invalid JSON: {}", document_err)))?;
            from_records(records)
        }
    }
}

pub(super) fn encode(table: &Table) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for row in table.rows() {
        let record: Map<String, Value> = table
            .column_names()
            .into_iter()
            .zip(row)
            .map(|(name, cell)| (name.to_string(), cell.to_json()))
            .collect();
        serde_json::to_writer(&mut out, &record)?;
        out.push(b'\n');
    }
    Ok(out)
}

fn from_records(items: Vec<Value>) -> Result<Table> {
    let mut names: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let record = match item {
            Value::Object(record) => record,
            other => {
                return Err(EtlError::MalformedInput(format!(
                    "record {} is {}, expected an object",
                    index + 1,
                    type_name(&other)
                ))
                .into());
            }
        };
        for key in record.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
        records.push(record);
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let values = records
                .iter()
                .map(|record| record.get(&name).map(to_cell).unwrap_or(Cell::Null))
                .collect();
            Column::new(name, values)
        })
        .collect();
    Table::try_new(columns)
}

fn from_columns(map: Map<String, Value>) -> Result<Table> {
    let mut columns = Vec::with_capacity(map.len());
    for (name, value) in map {
        let values = match value {
            Value::Array(values) => values.iter().map(to_cell).collect(),
            Value::Object(indexed) => indexed.values().map(to_cell).collect(),
            other => {
                return Err(EtlError::MalformedInput(format!(
                    "column '{}' is {}, expected an array",
                    name,
                    type_name(&other)
                ))
                .into());
            }
        };
        columns.push(Column::new(name, values));
    }
    Table::try_new(columns)
}

fn to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
        },
        Value::String(s) => Cell::Str(s.clone()),
        nested => Cell::Str(nested.to_string()),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
