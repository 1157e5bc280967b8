use std::str::FromStr;

use super::{Config, ProviderKind};
use crate::secret::Secret;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DOCQA_DOCUMENTS_DIR") {
            self.documents.dir = v.into();
        }
        if let Ok(v) = std::env::var("DOCQA_INDEX_PATH") {
            self.index.path = v.into();
        }
        if let Some(k) = parse_env("DOCQA_INDEX_TOP_K") {
            self.index.top_k = k;
        }
        if let Some(size) = parse_env("DOCQA_CHUNK_SIZE") {
            self.splitter.chunk_size = size;
        }
        if let Some(overlap) = parse_env("DOCQA_CHUNK_OVERLAP") {
            self.splitter.chunk_overlap = overlap;
        }
        if let Ok(v) = std::env::var("DOCQA_EMBEDDING_PROVIDER") {
            if let Ok(kind) =
                serde_json::from_value::<ProviderKind>(serde_json::Value::String(v.clone()))
            {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid DOCQA_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCQA_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("DOCQA_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(secs) = parse_env("DOCQA_TIMEOUT_REQUEST") {
            self.timeouts.request = secs;
        }
    }

    /// Read API keys from the environment. They are never taken from the config file.
    pub(crate) fn resolve_secrets(&mut self) {
        if let Ok(v) = std::env::var("DOCQA_OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("DOCQA_CLAUDE_API_KEY")
            && !v.is_empty()
        {
            self.secrets.claude_api_key = Some(Secret::new(v));
        }
    }
}

/// Parsed value of `name`; unset yields `None`, unparsable values are logged and yield `None`.
pub(super) fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let v = std::env::var(name).ok()?;
    match v.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("ignoring invalid {name} value: {v}");
            None
        }
    }
}
