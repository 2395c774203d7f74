//! Transform implementations for staged tables
//!
//! A transform reads one staged file, applies the requested steps in a fixed
//! order (drop missing, rename, filter) and stages the result as
//! `transformed_<name>`.

mod column_renamer;
mod missing_dropper;
mod row_filter;

pub use column_renamer::{ColumnRenamer, RenamePair};
pub use missing_dropper::MissingDropper;
pub use row_filter::RowFilter;

use crate::error::EtlError;
use crate::etl::Transformer;
use crate::storage::{StagedFile, StagingStore};
use crate::table::Table;
use eyre::Result;

/// Prefix of the staged name a transform writes to
pub const TRANSFORMED_PREFIX: &str = "transformed_";

/// Requested transformation steps
#[derive(Clone, Debug, Default)]
pub struct TransformOptions {
    pub drop_missing: bool,
    pub rename: Vec<RenamePair>,
    pub strict_rename: bool,
    pub filter_column: Option<String>,
    pub filter_value: Option<String>,
}

impl TransformOptions {
    /// The row filter, if both halves were given
    fn row_filter(&self) -> Result<Option<RowFilter>> {
        match (&self.filter_column, &self.filter_value) {
            (Some(column), Some(value)) => Ok(Some(RowFilter::new(column, value))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(EtlError::InvalidArgument(
                "--filter-col needs --filter-val".to_string(),
            )
            .into()),
            (None, Some(_)) => Err(EtlError::InvalidArgument(
                "--filter-val needs --filter-col".to_string(),
            )
            .into()),
        }
    }

    /// Apply the steps to a table, always in drop → rename → filter order
    pub fn apply(&self, mut table: Table) -> Result<Table> {
        let filter = self.row_filter()?;

        if self.drop_missing {
            table = MissingDropper.transform(table)?;
        }

        let renamer = ColumnRenamer::new(self.rename.clone()).strict(self.strict_rename);
        if !renamer.is_empty() {
            table = renamer.transform(table)?;
        }

        if let Some(filter) = filter {
            table = filter.transform(table)?;
        }

        Ok(table)
    }
}

/// Name a transform of `name` is staged under
pub fn transformed_name(name: &str) -> String {
    format!("{}{}", TRANSFORMED_PREFIX, name)
}

/// Transform a staged file and stage the result.
///
/// Nothing is written unless every step succeeds. The output keeps the
/// source's format; JSON is written as newline-delimited records.
pub fn transform_staged(
    store: &StagingStore,
    name: &str,
    options: &TransformOptions,
) -> Result<StagedFile> {
    log::info!("Transforming {}...", name);
    let table = store.get(name)?;
    let transformed = options.apply(table)?;
    let staged = store.put(&transformed_name(name), &transformed)?;
    log::info!(
        "Transformed data saved as {} ({} rows)",
        staged.name,
        transformed.num_rows()
    );
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use crate::table::{Cell, Column};
    use tempfile::TempDir;

    fn table() -> Table {
        Table::try_new(vec![
            Column::new("a", vec![Cell::Int(1), Cell::Null, Cell::Int(3)]),
            Column::new(
                "b",
                vec![Cell::Str("x".into()), Cell::Str("x".into()), Cell::Str("y".into())],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_fixed_order() {
        // the filter names the renamed column, so rename must run first
        let options = TransformOptions {
            drop_missing: true,
            rename: vec!["b:kind".parse().unwrap()],
            filter_column: Some("kind".into()),
            filter_value: Some("x".into()),
            ..Default::default()
        };
        let output = options.apply(table()).unwrap();
        assert_eq!(output.column_names(), vec!["a", "kind"]);
        assert_eq!(output.num_rows(), 1);
    }

    #[test]
    fn test_filter_needs_both_halves() {
        let options = TransformOptions {
            filter_column: Some("b".into()),
            ..Default::default()
        };
        let err = options.apply(table()).unwrap_err();
        assert!(matches!(classify(&err), Some(EtlError::InvalidArgument(_))));
    }

    #[test]
    fn test_no_options_is_identity() {
        let output = TransformOptions::default().apply(table()).unwrap();
        assert_eq!(output, table());
    }

    #[test]
    fn test_transform_staged_json_is_ndjson() {
        let temp = TempDir::new().unwrap();
        let store = StagingStore::new(temp.path());
        store.put("data.json", &table()).unwrap();

        let staged = transform_staged(
            &store,
            "data.json",
            &TransformOptions {
                drop_missing: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(staged.name, "transformed_data.json");
        let text = std::fs::read_to_string(&staged.path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with('{')));
    }

    #[test]
    fn test_failed_step_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = StagingStore::new(temp.path());
        store.put("data.csv", &table()).unwrap();

        let err = transform_staged(
            &store,
            "data.csv",
            &TransformOptions {
                filter_column: Some("missing".into()),
                filter_value: Some("x".into()),
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(classify(&err), Some(EtlError::ColumnNotFound(_))));
        assert!(!store.contains("transformed_data.csv"));
    }
}
