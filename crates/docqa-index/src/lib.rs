//! Document ingestion, chunking and a persisted vector index.

pub mod builder;
pub mod document;
pub mod error;
pub mod store;

pub use builder::IndexBuilder;
pub use error::IndexError;
pub use store::{IndexEntry, IndexManifest, ScoredChunk, VectorIndex};
