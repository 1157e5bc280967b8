mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, bail};
use docqa_index::document::TextSplitter;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting configuration fails [`Config::validate`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, mid-pipeline.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        TextSplitter::new(self.splitter.clone()).context("invalid [splitter] section")?;

        if self.index.top_k == 0 {
            bail!("index.top_k must be greater than zero");
        }
        if self.index.embed_batch_size == 0 {
            bail!("index.embed_batch_size must be greater than zero");
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        if self.embedding.provider == ProviderKind::Claude {
            bail!("embedding.provider \"claude\" has no embedding endpoint");
        }
        if self.models.is_empty() {
            bail!("at least one [[models]] entry is required");
        }

        let mut names = HashSet::new();
        for profile in &self.models {
            if profile.name.trim().is_empty() {
                bail!("model profile name must not be empty");
            }
            if !names.insert(profile.name.as_str()) {
                bail!("duplicate model profile name: {}", profile.name);
            }
            if profile.model.trim().is_empty() {
                bail!("model profile {}: model must not be empty", profile.name);
            }
            if profile.max_tokens == 0 {
                bail!("model profile {}: max_tokens must be greater than zero", profile.name);
            }
            if let Some(t) = profile.temperature
                && !(0.0..=2.0).contains(&t)
            {
                bail!("model profile {}: temperature {t} is outside 0.0..=2.0", profile.name);
            }
            if let Some(p) = profile.top_p
                && !(0.0..=1.0).contains(&p)
            {
                bail!("model profile {}: top_p {p} is outside 0.0..=1.0", profile.name);
            }
        }
        Ok(())
    }
}
