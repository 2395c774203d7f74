//! Column renamer transformer

use crate::error::EtlError;
use crate::etl::Transformer;
use crate::table::Table;
use eyre::Result;
use std::fmt;
use std::str::FromStr;

/// One `old:new` rename instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenamePair {
    pub old: String,
    pub new: String,
}

impl FromStr for RenamePair {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((old, new)) if !old.is_empty() && !new.is_empty() => Ok(Self {
                old: old.to_string(),
                new: new.to_string(),
            }),
            _ => Err(EtlError::InvalidArgument(format!(
                "rename '{}' must look like old:new",
                s
            ))),
        }
    }
}

impl fmt::Display for RenamePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.old, self.new)
    }
}

/// Transformer that renames columns
///
/// Pairs naming a column the table does not have are skipped with a warning,
/// unless the renamer is strict, in which case they fail with
/// `ColumnNotFound`. Renaming onto an existing column name fails with
/// `DuplicateColumn`.
#[derive(Clone, Debug, Default)]
pub struct ColumnRenamer {
    pairs: Vec<RenamePair>,
    strict: bool,
}

impl ColumnRenamer {
    pub fn new(pairs: Vec<RenamePair>) -> Self {
        Self {
            pairs,
            strict: false,
        }
    }

    /// Fail on pairs that reference unknown columns
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl Transformer for ColumnRenamer {
    type Input = Table;
    type Output = Table;

    fn transform(&self, mut input: Self::Input) -> Result<Self::Output> {
        for pair in &self.pairs {
            if input.column(&pair.old).is_none() {
                if self.strict {
                    return Err(EtlError::ColumnNotFound(pair.old.clone()).into());
                }
                log::warn!("Skipping rename {}: no column named '{}'", pair, pair.old);
                continue;
            }
            input.rename_column(&pair.old, &pair.new)?;
        }
        log::info!(
            "Renamed columns: {}",
            self.pairs
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(input)
    }
}
