//! Missing-value row dropper
//!
//! Removes every row that has a null in any column.

use crate::etl::Transformer;
use crate::table::Table;
use eyre::Result;

/// Transformer that drops rows containing at least one missing value
///
/// # Example
/// ```
/// use stagehand::etl::Transformer;
/// use stagehand::table::{Cell, Column, Table};
/// use stagehand::transform::MissingDropper;
///
/// let table = Table::try_new(vec![
///     Column::new("a", vec![Cell::Int(1), Cell::Null]),
///     Column::new("b", vec![Cell::Str("x".into()), Cell::Str("y".into())]),
/// ])
/// .unwrap();
///
/// let output = MissingDropper.transform(table).unwrap();
/// assert_eq!(output.num_rows(), 1);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct MissingDropper;

impl Transformer for MissingDropper {
    type Input = Table;
    type Output = Table;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        let before = input.num_rows();
        let output = input.retain_rows(|row| {
            input
                .columns()
                .iter()
                .all(|column| !column.values[row].is_null())
        });
        log::info!("Dropped {} row(s) with missing values", before - output.num_rows());
        Ok(output)
    }
}
