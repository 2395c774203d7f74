//! Transformer trait for data transformation

use eyre::Result;

/// Transformer trait for transforming data items
///
/// Implementors define how to rewrite items:
/// - Row cleaning (dropping incomplete rows)
/// - Column renaming
/// - Row filtering
///
/// # Example
/// ```no_run
/// use stagehand::etl::Transformer;
/// use stagehand::table::Table;
/// use eyre::Result;
///
/// struct FirstRowOnly;
///
/// impl Transformer for FirstRowOnly {
///     type Input = Table;
///     type Output = Table;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output> {
///         Ok(input.retain_rows(|i| i == 0))
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    ///
    /// # Errors
    /// Returns an error if transformation fails (missing column, conflict, etc.)
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;

    /// Transform multiple items (default batch implementation)
    ///
    /// Override this for optimized batch processing
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        inputs.into_iter().map(|i| self.transform(i)).collect()
    }
}
