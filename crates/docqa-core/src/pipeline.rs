use std::path::{Path, PathBuf};

use docqa_index::document::{DirectorySource, TextSplitter};
use docqa_index::{IndexBuilder, ScoredChunk, VectorIndex};
use docqa_llm::LlmProvider;
use docqa_llm::any::AnyProvider;

use crate::answer::{Answer, Answerer};
use crate::config::{Config, DocumentsConfig, IndexConfig};
use crate::error::PipelineError;
use crate::registry::{ModelRegistry, build_provider};

/// Outcome of a successful rebuild.
#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub location: PathBuf,
}

/// Rebuild and query operations over one on-disk index.
///
/// The two operations share nothing but the index file: `rebuild` replaces it,
/// `ask` reads it fresh on every call.
pub struct Pipeline {
    documents: DocumentsConfig,
    index: IndexConfig,
    splitter: TextSplitter,
    embedder: AnyProvider,
    embedding_model: String,
    answerer: Answerer,
}

impl Pipeline {
    /// # Errors
    ///
    /// Returns an error if the splitter settings are invalid or a provider cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let embedder = build_provider(
            config,
            config.embedding.provider,
            &config.embedding.base_url,
            &config.embedding.model,
            Some(&config.embedding.model),
        )?;
        let registry = ModelRegistry::from_config(config)?;
        Self::new(config, embedder, registry)
    }

    /// Assemble a pipeline from already constructed providers.
    ///
    /// # Errors
    ///
    /// Returns an error if the splitter settings are invalid or `embedder` has
    /// no embedding model.
    pub fn new(
        config: &Config,
        embedder: AnyProvider,
        registry: ModelRegistry,
    ) -> Result<Self, PipelineError> {
        let splitter = TextSplitter::new(config.splitter.clone())
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let embedding_model = embedder
            .embedding_model()
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "provider {} has no embedding model",
                    embedder.name()
                ))
            })?
            .to_owned();
        if registry.is_empty() {
            return Err(PipelineError::Config("no model profiles configured".into()));
        }

        Ok(Self {
            documents: config.documents.clone(),
            index: config.index.clone(),
            splitter,
            embedder,
            embedding_model,
            answerer: Answerer::new(registry),
        })
    }

    #[must_use]
    pub fn models(&self) -> &ModelRegistry {
        self.answerer.registry()
    }

    #[must_use]
    pub fn index_location(&self) -> &Path {
        &self.index.path
    }

    /// Load every document, chunk, embed and replace the persisted index.
    ///
    /// The previous index is only replaced once the new one is complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] when the directory yields no text,
    /// or the first document, embedding or storage failure.
    pub async fn rebuild(&self) -> Result<RebuildReport, PipelineError> {
        let source = DirectorySource::with_max_file_size(
            &self.documents.dir,
            self.documents.max_file_size,
        )
        .recursive(self.documents.recursive);

        let documents = source.load_all().await?;
        if documents.is_empty() {
            return Err(PipelineError::EmptyInput(format!(
                "no documents found in {}",
                self.documents.dir.display()
            )));
        }
        for doc in &documents {
            tracing::debug!(
                id = %doc.id,
                source = %doc.metadata.source,
                chars = doc.content.chars().count(),
                "document loaded"
            );
        }

        let chunks = self.splitter.split_all(&documents);
        if chunks.is_empty() {
            return Err(PipelineError::EmptyInput(
                "documents contain no extractable text".into(),
            ));
        }
        for chunk in &chunks {
            tracing::debug!(
                document = %chunk.document_id,
                index = chunk.chunk_index,
                offset = chunk.offset,
                length = chunk.length,
                "chunk"
            );
        }
        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "documents split"
        );

        let chunk_count = chunks.len();
        let index = IndexBuilder::new(&self.embedder, self.index.embed_batch_size)
            .build(chunks)
            .await?;
        let location = index.save(&self.index.path)?;

        Ok(RebuildReport {
            documents: documents.len(),
            chunks: chunk_count,
            dimension: index.manifest().dimension,
            location,
        })
    }

    /// Embed the question and return the `top_k` closest chunks.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IndexMissing`] before the first rebuild and
    /// [`PipelineError::IndexMismatch`] if the index was built with another
    /// embedding provider, model or dimension.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyInput("question is empty".into()));
        }

        let index = VectorIndex::load(&self.index.path)?;
        let manifest = index.manifest();
        let provider = self.embedder.name();
        if manifest.embedding_model != self.embedding_model
            || manifest.embedding_provider != provider
        {
            return Err(PipelineError::IndexMismatch(format!(
                "index was built with {}/{} but {provider}/{} is configured; rebuild the index",
                manifest.embedding_provider, manifest.embedding_model, self.embedding_model
            )));
        }

        let query = self.embedder.embed(question).await?;
        if query.len() != manifest.dimension {
            return Err(PipelineError::IndexMismatch(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                manifest.dimension
            )));
        }

        let hits = index.search(&query, self.index.top_k)?;
        tracing::debug!(
            hits = hits.len(),
            best = hits.first().map_or(0.0, |h| h.score),
            "retrieved"
        );
        Ok(hits)
    }

    /// Answer `question` with the named model, or the first configured one.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownModel`] before any service call if the
    /// name is not registered, otherwise any error from [`Self::retrieve`] or
    /// the model call.
    pub async fn ask(&self, question: &str, model: Option<&str>) -> Result<Answer, PipelineError> {
        let registry = self.answerer.registry();
        let model_name = match model {
            Some(name) => name,
            None => registry
                .default_name()
                .ok_or_else(|| PipelineError::Config("no model profiles configured".into()))?,
        };
        registry.get(model_name)?;

        let hits = self.retrieve(question).await?;
        self.answerer.answer(question.trim(), hits, model_name).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use docqa_llm::mock::MockProvider;

    use super::*;
    use crate::config::{ModelProfile, ProviderKind};
    use crate::registry::RegisteredModel;

    struct Fixture {
        _dir: tempfile::TempDir,
        docs: PathBuf,
        config: Config,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("data");
        std::fs::create_dir_all(&docs).unwrap();
        let mut config = Config::default();
        config.documents.dir = docs.clone();
        config.index.path = dir.path().join("vector_index");
        config.splitter.chunk_size = 20;
        config.splitter.chunk_overlap = 5;
        Fixture {
            _dir: dir,
            docs,
            config,
        }
    }

    fn registry(chat: &MockProvider) -> ModelRegistry {
        ModelRegistry::new(vec![RegisteredModel {
            profile: ModelProfile {
                name: "llama2".into(),
                provider: ProviderKind::Ollama,
                base_url: None,
                model: "llama2:70b-chat".into(),
                max_tokens: 512,
                temperature: None,
                top_p: None,
            },
            provider: AnyProvider::Mock(chat.clone()),
        }])
    }

    fn pipeline(config: &Config, embedder: MockProvider, chat: &MockProvider) -> Pipeline {
        Pipeline::new(config, AnyProvider::Mock(embedder), registry(chat)).unwrap()
    }

    #[tokio::test]
    async fn rebuild_empty_directory_is_empty_input() {
        let fx = fixture();
        let p = pipeline(&fx.config, MockProvider::default(), &MockProvider::default());
        assert!(matches!(p.rebuild().await, Err(PipelineError::EmptyInput(_))));
        assert!(!VectorIndex::exists(p.index_location()));
    }

    #[tokio::test]
    async fn rebuild_missing_directory_is_document_error() {
        let mut fx = fixture();
        fx.config.documents.dir = fx.docs.join("nope");
        let p = pipeline(&fx.config, MockProvider::default(), &MockProvider::default());
        assert!(matches!(p.rebuild().await, Err(PipelineError::Document(_))));
    }

    #[tokio::test]
    async fn rebuild_blank_documents_is_empty_input() {
        let fx = fixture();
        std::fs::write(fx.docs.join("blank.txt"), "  \n\n ").unwrap();
        let embedder = MockProvider::default();
        let p = pipeline(&fx.config, embedder.clone(), &MockProvider::default());
        assert!(matches!(p.rebuild().await, Err(PipelineError::EmptyInput(_))));
        assert_eq!(embedder.embed_calls(), 0);
    }

    #[tokio::test]
    async fn rebuild_reports_counts() {
        let fx = fixture();
        std::fs::write(fx.docs.join("a.txt"), "alpha beta gamma delta epsilon").unwrap();
        let p = pipeline(&fx.config, MockProvider::default(), &MockProvider::default());

        let report = p.rebuild().await.unwrap();
        assert_eq!(report.documents, 1);
        assert!(report.chunks >= 2);
        assert_eq!(report.dimension, 4);
        assert!(report.location.ends_with("index.json"));
        assert_eq!(VectorIndex::load(p.index_location()).unwrap().len(), report.chunks);
    }

    #[tokio::test]
    async fn ask_before_rebuild_is_index_missing() {
        let fx = fixture();
        let p = pipeline(&fx.config, MockProvider::default(), &MockProvider::default());
        assert!(matches!(
            p.ask("anything?", None).await,
            Err(PipelineError::IndexMissing(_))
        ));
    }

    #[tokio::test]
    async fn ask_empty_question_is_empty_input() {
        let fx = fixture();
        let p = pipeline(&fx.config, MockProvider::default(), &MockProvider::default());
        assert!(matches!(
            p.ask("   ", None).await,
            Err(PipelineError::EmptyInput(_))
        ));
    }

    #[tokio::test]
    async fn ask_unknown_model_fails_without_embedding() {
        let fx = fixture();
        let embedder = MockProvider::default();
        let p = pipeline(&fx.config, embedder.clone(), &MockProvider::default());
        assert!(matches!(
            p.ask("q", Some("jurassic")).await,
            Err(PipelineError::UnknownModel(_))
        ));
        assert_eq!(embedder.embed_calls(), 0);
    }

    #[tokio::test]
    async fn ask_with_other_embedding_model_is_mismatch() {
        let fx = fixture();
        std::fs::write(fx.docs.join("a.txt"), "some text").unwrap();
        let chat = MockProvider::default();
        pipeline(&fx.config, MockProvider::default(), &chat)
            .rebuild()
            .await
            .unwrap();

        let other = MockProvider::default().with_embedding_model("other-embed");
        let p = pipeline(&fx.config, other, &chat);
        assert!(matches!(
            p.ask("q", None).await,
            Err(PipelineError::IndexMismatch(_))
        ));
    }

    #[tokio::test]
    async fn ask_with_other_embedding_provider_is_mismatch() {
        let fx = fixture();
        std::fs::write(fx.docs.join("a.txt"), "some text").unwrap();
        let chat = MockProvider::default();
        let p = pipeline(&fx.config, MockProvider::default(), &chat);
        p.rebuild().await.unwrap();

        let index_file = VectorIndex::file_path(&fx.config.index.path);
        let mut raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&index_file).unwrap()).unwrap();
        raw["manifest"]["embedding_provider"] = "ollama".into();
        std::fs::write(&index_file, serde_json::to_vec(&raw).unwrap()).unwrap();

        assert!(matches!(
            p.ask("q", None).await,
            Err(PipelineError::IndexMismatch(_))
        ));
    }

    #[tokio::test]
    async fn ask_with_other_dimension_is_mismatch() {
        let fx = fixture();
        std::fs::write(fx.docs.join("a.txt"), "some text").unwrap();
        let chat = MockProvider::default();
        pipeline(&fx.config, MockProvider::default(), &chat)
            .rebuild()
            .await
            .unwrap();

        let mut wider = MockProvider::default();
        wider.default_embedding = vec![0.0; 8];
        let p = pipeline(&fx.config, wider, &chat);
        assert!(matches!(
            p.ask("q", None).await,
            Err(PipelineError::IndexMismatch(_))
        ));
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_index() {
        let fx = fixture();
        std::fs::write(fx.docs.join("a.txt"), "first version").unwrap();
        let chat = MockProvider::default();
        pipeline(&fx.config, MockProvider::default(), &chat)
            .rebuild()
            .await
            .unwrap();
        let index_file = VectorIndex::file_path(&fx.config.index.path);
        let before = std::fs::read(&index_file).unwrap();

        std::fs::write(fx.docs.join("b.txt"), "second file").unwrap();
        let p = pipeline(&fx.config, MockProvider::failing(), &chat);
        assert!(matches!(p.rebuild().await, Err(PipelineError::Service(_))));
        assert_eq!(std::fs::read(&index_file).unwrap(), before);
    }

    #[tokio::test]
    async fn ask_returns_answer_with_sources() {
        let fx = fixture();
        std::fs::write(fx.docs.join("a.txt"), "cats purr loudly\n\ndogs bark loudly").unwrap();

        let mut vectors = HashMap::new();
        vectors.insert("cats purr loudly".to_owned(), vec![1.0, 0.0, 0.0, 0.0]);
        vectors.insert("dogs bark loudly".to_owned(), vec![0.0, 1.0, 0.0, 0.0]);
        vectors.insert("why do cats purr?".to_owned(), vec![0.9, 0.1, 0.0, 0.0]);
        let mut embedder = MockProvider::default();
        embedder.embeddings = vectors;

        let chat = MockProvider::with_responses(vec!["Contentment.".into()]);
        let p = pipeline(&fx.config, embedder, &chat);
        p.rebuild().await.unwrap();

        let answer = p.ask("  why do cats purr?  ", None).await.unwrap();
        assert_eq!(answer.text, "Contentment.");
        assert_eq!(answer.model, "llama2");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].chunk.content, "cats purr loudly");
        assert!(answer.sources[0].score > answer.sources[1].score);
        assert!(chat.requests()[0][0].content.contains("Question: why do cats purr?"));
    }

    #[test]
    fn invalid_splitter_is_config_error() {
        let mut config = Config::default();
        config.splitter.chunk_overlap = config.splitter.chunk_size;
        let result = Pipeline::new(
            &config,
            AnyProvider::Mock(MockProvider::default()),
            registry(&MockProvider::default()),
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn embedder_without_embedding_model_is_rejected() {
        let mut embedder = MockProvider::default();
        embedder.embedding_model = None;
        let result = Pipeline::new(
            &Config::default(),
            AnyProvider::Mock(embedder),
            registry(&MockProvider::default()),
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
