//! Extractors that stage tables from files, directories and HTTP APIs

mod api;
mod directory;
mod file;

pub use api::{API_STAGE_NAME, ApiExtractor};
pub use directory::DirectoryExtractor;
pub use file::FileExtractor;
