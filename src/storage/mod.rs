//! File system storage operations
//!
//! Staged artifacts live in a single directory, keyed by filename. The
//! filename's extension selects the codec used to read and write them.

mod staging;

pub use staging::{StagedFile, StagingStore};
