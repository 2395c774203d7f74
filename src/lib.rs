//! Stagehand
//!
//! A small ETL tool: extract tabular files and HTTP APIs into a staging
//! directory, transform them, and load them into databases and warehouses

pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod credentials;
pub mod error;
pub mod etl;
pub mod extract;
pub mod load;
pub mod storage;
pub mod table;
pub mod transform;

// Re-exports for convenience
pub use codec::Format;
pub use config::StagingConfig;
pub use credentials::{CredentialSource, Credentials};
pub use error::{EtlError, classify};
pub use etl::{Extractor, Loader, Transformer};
pub use extract::{ApiExtractor, DirectoryExtractor, FileExtractor};
pub use load::{Backend, LoadReport, LoadRequest};
pub use storage::{StagedFile, StagingStore};
pub use table::{Cell, Column, ColumnKind, Table};
pub use transform::TransformOptions;
