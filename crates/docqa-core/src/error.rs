use std::path::PathBuf;

use docqa_index::IndexError;
use docqa_index::document::DocumentError;
use docqa_llm::LlmError;

/// Failures surfaced to the interface by [`crate::pipeline::Pipeline`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("nothing to process: {0}")]
    EmptyInput(String),

    #[error("no index found at {}; run `docqa rebuild` first", .0.display())]
    IndexMissing(PathBuf),

    #[error("model service error: {0}")]
    Service(#[from] LlmError),

    #[error("index storage error: {0}")]
    Storage(IndexError),

    #[error("index does not match the configured embedding model: {0}")]
    IndexMismatch(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<IndexError> for PipelineError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::EmptyInput => Self::EmptyInput("no chunks to index".into()),
            IndexError::Missing(path) => Self::IndexMissing(path),
            IndexError::Embedding(e) => Self::Service(e),
            e @ IndexError::DimensionMismatch { .. } => Self::IndexMismatch(e.to_string()),
            other => Self::Storage(other),
        }
    }
}
