use docqa_index::ScoredChunk;
use docqa_llm::{LlmProvider, Message};

use crate::error::PipelineError;
use crate::registry::ModelRegistry;

/// Prompt sent to the generative model. `{context}` and `{question}` are substituted.
pub const PROMPT_TEMPLATE: &str = "Human: Use the following pieces of context to provide a \
concise answer to the question at the end but summarize with at least 250 words and detailed \
explanations. If you don't know the answer, just say that you don't know, don't try to make up \
an answer.
<context>
{context}
</context>

Question: {question}

Assistant:";

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Name of the model profile that produced the text.
    pub model: String,
    /// Retrieved chunks the answer was grounded on, best match first.
    pub sources: Vec<ScoredChunk>,
}

#[must_use]
pub fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    PROMPT_TEMPLATE
        .replace("{context}", &context)
        .replace("{question}", question)
}

/// Turns retrieved chunks into an answer from a named model.
#[derive(Debug, Clone)]
pub struct Answerer {
    registry: ModelRegistry,
}

impl Answerer {
    #[must_use]
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownModel`] for an unregistered name and
    /// [`PipelineError::Service`] if the model call fails.
    pub async fn answer(
        &self,
        question: &str,
        retrieved: Vec<ScoredChunk>,
        model_name: &str,
    ) -> Result<Answer, PipelineError> {
        let model = self.registry.get(model_name)?;
        let prompt = build_prompt(question, &retrieved);
        tracing::debug!(model = model_name, chunks = retrieved.len(), "sending prompt");

        let text = model
            .provider
            .chat(&[Message::user(prompt)], &model.profile.params())
            .await?;

        tracing::info!(model = model_name, sources = retrieved.len(), "answer generated");
        Ok(Answer {
            text,
            model: model_name.to_owned(),
            sources: retrieved,
        })
    }
}
