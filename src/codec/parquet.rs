//! Parquet codec via Arrow record batches
//!
//! Integer, float, boolean and string columns round-trip with their types and
//! nulls intact. Other Arrow types are read as their display strings.

use crate::error::EtlError;
use crate::table::{Cell, Column, ColumnKind, Table};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    new_null_array,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::util::display::array_value_to_string;
use eyre::{Context, Result};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::sync::Arc;

pub(super) fn decode(bytes: &[u8]) -> Result<Table> {
    let bytes = bytes::Bytes::copy_from_slice(bytes);
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| EtlError::MalformedInput(format!("invalid parquet file: {}", e)))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| EtlError::MalformedInput(format!("invalid parquet file: {}", e)))?;

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|field| Column::new(field.name().clone(), Vec::new()))
        .collect();

    for batch in reader {
        let batch =
            batch.map_err(|e| EtlError::MalformedInput(format!("unreadable row group: {}", e)))?;
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            column.values.extend(cells_from_array(array)?);
        }
    }

    Table::try_new(columns)
}

pub(super) fn encode(table: &Table) -> Result<Vec<u8>> {
    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.num_columns());

    for column in table.columns() {
        let (data_type, array) = array_from_column(column);
        fields.push(Field::new(&column.name, data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = if arrays.is_empty() {
        RecordBatch::new_empty(schema.clone())
    } else {
        RecordBatch::try_new(schema.clone(), arrays).context("Failed to build record batch")?
    };

    let mut buffer = Vec::new();
    let mut writer =
        ArrowWriter::try_new(&mut buffer, schema, None).context("Failed to open parquet writer")?;
    writer.write(&batch).context("Failed to write parquet rows")?;
    writer.close().context("Failed to finish parquet file")?;
    Ok(buffer)
}

fn array_from_column(column: &Column) -> (DataType, ArrayRef) {
    let values = &column.values;
    match column.kind() {
        ColumnKind::Null => (DataType::Utf8, new_null_array(&DataType::Utf8, values.len())),
        ColumnKind::Bool => {
            let array: BooleanArray = values
                .iter()
                .map(|cell| match cell {
                    Cell::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            (DataType::Boolean, Arc::new(array))
        }
        ColumnKind::Int => {
            let array: Int64Array = values
                .iter()
                .map(|cell| match cell {
                    Cell::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            (DataType::Int64, Arc::new(array))
        }
        ColumnKind::Float => {
            let array: Float64Array = values
                .iter()
                .map(|cell| match cell {
                    Cell::Float(f) if !f.is_nan() => Some(*f),
                    Cell::Int(i) => Some(*i as f64),
                    _ => None,
                })
                .collect();
            (DataType::Float64, Arc::new(array))
        }
        ColumnKind::Str => {
            let array: StringArray = values
                .iter()
                .map(|cell| (!cell.is_null()).then(|| cell.to_string()))
                .collect();
            (DataType::Utf8, Arc::new(array))
        }
    }
}

fn cells_from_array(array: &ArrayRef) -> Result<Vec<Cell>> {
    let data_type = array.data_type();
    let cells = match data_type {
        DataType::Null => vec![Cell::Null; array.len()],
        DataType::Boolean => {
            let array = downcast::<BooleanArray>(array)?;
            array.iter().map(|v| v.map(Cell::Bool).unwrap_or(Cell::Null)).collect()
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let widened = cast(array, &DataType::Int64)?;
            let array = downcast::<Int64Array>(&widened)?;
            array.iter().map(|v| v.map(Cell::Int).unwrap_or(Cell::Null)).collect()
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let widened = cast(array, &DataType::Float64)?;
            let array = downcast::<Float64Array>(&widened)?;
            array.iter().map(|v| v.map(Cell::Float).unwrap_or(Cell::Null)).collect()
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let normalized = cast(array, &DataType::Utf8)?;
            let array = downcast::<StringArray>(&normalized)?;
            array
                .iter()
                .map(|v| v.map(|s| Cell::Str(s.to_string())).unwrap_or(Cell::Null))
                .collect()
        }
        _ => (0..array.len())
            .map(|i| {
                if array.is_null(i) {
                    Ok(Cell::Null)
                } else {
                    array_value_to_string(array, i).map(Cell::Str)
                }
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(cells)
}

fn downcast<T: 'static>(array: &ArrayRef) -> Result<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        EtlError::MalformedInput(format!("unexpected array type {}", array.data_type())).into()
    })
}
