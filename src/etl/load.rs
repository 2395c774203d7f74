//! Loader trait for loading tables to destinations

use crate::table::Table;
use async_trait::async_trait;
use eyre::Result;

/// Loader trait for writing a table to a destination
///
/// Implementors define how a whole table reaches a backend:
/// - SQL databases over a driver connection
/// - Embedded database files
/// - Warehouse HTTP APIs
///
/// The trait is object safe so backends can be chosen at runtime.
///
/// # Example
/// ```no_run
/// use stagehand::etl::Loader;
/// use stagehand::table::Table;
/// use async_trait::async_trait;
/// use eyre::Result;
///
/// struct CountingLoader;
///
/// #[async_trait]
/// impl Loader for CountingLoader {
///     fn target(&self) -> String {
///         "nowhere".to_string()
///     }
///
///     async fn load(&self, table: &Table) -> Result<usize> {
///         Ok(table.num_rows())
///     }
/// }
/// ```
#[async_trait]
pub trait Loader: Send + Sync {
    /// Human-readable name of the destination (e.g. `postgres -> etl_data`)
    fn target(&self) -> String;

    /// Write the table to the destination
    ///
    /// Returns the number of rows written
    ///
    /// # Errors
    /// Returns an error if loading fails (network, driver, I/O, etc.)
    async fn load(&self, table: &Table) -> Result<usize>;
}
