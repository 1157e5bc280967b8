//! Test-only mock provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{GenerationParams, LlmProvider, Message};

/// Deterministic in-process provider.
///
/// Embeddings are looked up by exact text in `embeddings`, falling back to
/// `default_embedding`. Every chat request is recorded for inspection.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    embed_calls: Arc<Mutex<usize>>,
    pub default_response: String,
    pub embeddings: HashMap<String, Vec<f32>>,
    pub default_embedding: Vec<f32>,
    pub embedding_model: Option<String>,
    pub fail_chat: bool,
    pub fail_embed: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            embed_calls: Arc::new(Mutex::new(0)),
            default_response: "mock response".into(),
            embeddings: HashMap::new(),
            default_embedding: vec![0.0; 4],
            embedding_model: Some("mock-embed".into()),
            fail_chat: false,
            fail_embed: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.insert(text.into(), vector);
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Chat requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of texts embedded so far.
    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.lock().map(|c| *c).unwrap_or_default()
    }
}

impl LlmProvider for MockProvider {
    async fn chat(
        &self,
        messages: &[Message],
        _params: &GenerationParams,
    ) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self
            .responses
            .lock()
            .map_err(|e| LlmError::Other(e.to_string()))?;
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if let Ok(mut calls) = self.embed_calls.lock() {
            *calls += 1;
        }
        if self.fail_embed {
            return Err(LlmError::Other("mock embed error".into()));
        }
        if self.embedding_model.is_none() {
            return Err(LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        Ok(self
            .embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default_embedding.clone()))
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
