use std::time::Duration;

use docqa_llm::any::AnyProvider;
use docqa_llm::claude::ClaudeProvider;
use docqa_llm::http::build_client;
use docqa_llm::ollama::OllamaProvider;
use docqa_llm::openai::OpenAiProvider;

use crate::config::{Config, ModelProfile, ProviderKind};
use crate::error::PipelineError;

/// A model profile paired with the client that serves it.
#[derive(Debug, Clone)]
pub struct RegisteredModel {
    pub profile: ModelProfile,
    pub provider: AnyProvider,
}

/// Named generative models, in configuration order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<RegisteredModel>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new(models: Vec<RegisteredModel>) -> Self {
        Self { models }
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if a profile needs an API key that is not set.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let models = config
            .models
            .iter()
            .map(|profile| {
                let provider = build_provider(
                    config,
                    profile.provider,
                    profile.base_url(),
                    &profile.model,
                    None,
                )?;
                Ok(RegisteredModel {
                    profile: profile.clone(),
                    provider,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        Ok(Self { models })
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownModel`] if no profile has this name.
    pub fn get(&self, name: &str) -> Result<&RegisteredModel, PipelineError> {
        self.models
            .iter()
            .find(|m| m.profile.name == name)
            .ok_or_else(|| PipelineError::UnknownModel(name.to_owned()))
    }

    /// First configured profile.
    #[must_use]
    pub fn default_name(&self) -> Option<&str> {
        self.models.first().map(|m| m.profile.name.as_str())
    }

    pub fn profiles(&self) -> impl Iterator<Item = &ModelProfile> {
        self.models.iter().map(|m| &m.profile)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Construct a backend client for `kind`.
///
/// # Errors
///
/// Returns an error if a required API key is missing or the HTTP client cannot be built.
pub fn build_provider(
    config: &Config,
    kind: ProviderKind,
    base_url: &str,
    model: &str,
    embedding_model: Option<&str>,
) -> Result<AnyProvider, PipelineError> {
    match kind {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            base_url,
            model.to_owned(),
            embedding_model.map(str::to_owned),
        ))),
        ProviderKind::OpenAi => {
            let key = config.secrets.openai_api_key.as_ref().ok_or_else(|| {
                PipelineError::Config("DOCQA_OPENAI_API_KEY is not set".into())
            })?;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                http_client(config)?,
                key.expose().to_owned(),
                base_url.to_owned(),
                model.to_owned(),
                embedding_model.map(str::to_owned),
            )))
        }
        ProviderKind::Claude => {
            let key = config.secrets.claude_api_key.as_ref().ok_or_else(|| {
                PipelineError::Config("DOCQA_CLAUDE_API_KEY is not set".into())
            })?;
            Ok(AnyProvider::Claude(
                ClaudeProvider::new(http_client(config)?, key.expose().to_owned(), model.to_owned())
                    .with_base_url(base_url),
            ))
        }
    }
}

fn http_client(config: &Config) -> Result<reqwest::Client, PipelineError> {
    Ok(build_client(
        Duration::from_secs(config.timeouts.connect),
        Duration::from_secs(config.timeouts.request),
    )?)
}
