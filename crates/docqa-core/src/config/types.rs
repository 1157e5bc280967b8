use std::path::PathBuf;

use docqa_index::document::{DEFAULT_MAX_FILE_SIZE, SplitterConfig};
use docqa_llm::GenerationParams;
use docqa_llm::http::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub splitter: SplitterConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default = "default_models")]
    pub models: Vec<ModelProfile>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents: DocumentsConfig::default(),
            splitter: SplitterConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            models: default_models(),
            timeouts: TimeoutConfig::default(),
            secrets: ResolvedSecrets::default(),
        }
    }
}

/// Backend selector for embedding and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Claude,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Claude => "claude",
        }
    }

    /// Endpoint used when a profile does not set `base_url`.
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Claude => docqa_llm::claude::DEFAULT_BASE_URL,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
            recursive: false,
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("vector_index")
}

fn default_top_k() -> usize {
    3
}

fn default_embed_batch_size() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Directory holding `index.json`.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            top_k: default_top_k(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_embedding_model(),
        }
    }
}

fn default_max_tokens() -> u32 {
    512
}

/// A named generative model the user can pick when asking a question.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelProfile {
    pub name: String,
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// Falls back to the provider's default endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    /// Response length limit; `max_gen_len` is accepted as an alias.
    #[serde(default = "default_max_tokens", alias = "max_gen_len")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ModelProfile {
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    #[must_use]
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

fn default_models() -> Vec<ModelProfile> {
    vec![
        ModelProfile {
            name: "llama2".into(),
            provider: ProviderKind::Ollama,
            base_url: None,
            model: "llama2:70b-chat".into(),
            max_tokens: default_max_tokens(),
            temperature: None,
            top_p: None,
        },
        ModelProfile {
            name: "mistral".into(),
            provider: ProviderKind::Ollama,
            base_url: None,
            model: "mistral:7b".into(),
            max_tokens: default_max_tokens(),
            temperature: None,
            top_p: None,
        },
    ]
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// HTTP timeouts in seconds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect: u64,
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: default_connect_timeout(),
            request: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub claude_api_key: Option<Secret>,
}
