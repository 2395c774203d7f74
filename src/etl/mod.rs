//! Core ETL (Extract, Transform, Load) abstractions
//!
//! Every stage of the tool implements one of these traits: extractors stage
//! tables from a source, transformers rewrite a table, and loaders write a
//! table to a database backend.

mod extract;
mod load;
mod transform;

pub use extract::Extractor;
pub use load::Loader;
pub use transform::Transformer;
