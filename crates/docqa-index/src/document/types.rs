use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Canonical path of the file the text came from.
    pub source: String,
    pub content_type: String,
    /// 1-based page number for paginated formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    pub content: String,
    /// Character offset of `content` within the source document.
    pub offset: usize,
    /// Length of `content` in characters.
    pub length: usize,
    pub chunk_index: usize,
    pub metadata: DocumentMetadata,
}

/// Builds a document id from a file name and an optional page number.
#[must_use]
pub fn document_id(file_name: &str, page: Option<usize>) -> String {
    match page {
        Some(p) => format!("{file_name}#p{p}"),
        None => file_name.to_owned(),
    }
}
