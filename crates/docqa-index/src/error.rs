use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("no chunks to index")]
    EmptyInput,

    #[error("index has no entries")]
    NotFound,

    #[error("no index found at {}", .0.display())]
    Missing(PathBuf),

    #[error("vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid vector: {0}")]
    InvalidVector(String),

    #[error("unsupported index format version {0}")]
    UnsupportedFormat(u32),

    #[error("embedding failed: {0}")]
    Embedding(#[from] docqa_llm::LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
