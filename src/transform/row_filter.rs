//! Row filter transformer
//!
//! Keeps rows whose value in one column equals a given string.

use crate::error::EtlError;
use crate::etl::Transformer;
use crate::table::Table;
use eyre::Result;

/// Transformer that keeps rows where `column == value`
///
/// Cells are compared by their text rendering, so `1` matches an integer
/// cell and `2.0` a whole float. Null cells never match.
#[derive(Clone, Debug)]
pub struct RowFilter {
    column: String,
    value: String,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl Transformer for RowFilter {
    type Input = Table;
    type Output = Table;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        let column = input
            .column(&self.column)
            .ok_or_else(|| EtlError::ColumnNotFound(self.column.clone()))?;

        let output = input.retain_rows(|row| {
            let cell = &column.values[row];
            !cell.is_null() && cell.to_string() == self.value
        });
        log::info!(
            "Filtered rows where {} == {}: kept {} of {}",
            self.column,
            self.value,
            output.num_rows(),
            input.num_rows()
        );
        Ok(output)
    }
}
