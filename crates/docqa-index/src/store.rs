use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::Chunk;
use crate::error::IndexError;

pub const INDEX_FILE: &str = "index.json";
pub const FORMAT_VERSION: u32 = 1;

/// Records which embedding model produced the vectors in an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub dimension: usize,
    /// RFC 3339 build timestamp.
    pub built_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Flat in-memory vector index persisted as a single JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    #[must_use]
    pub fn new(
        embedding_provider: impl Into<String>,
        embedding_model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                embedding_provider: embedding_provider.into(),
                embedding_model: embedding_model.into(),
                dimension,
                built_at: chrono::Utc::now().to_rfc3339(),
            },
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// # Errors
    ///
    /// Returns an error if the vector is empty or its length differs from the index dimension.
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<(), IndexError> {
        if vector.is_empty() {
            return Err(IndexError::InvalidVector("empty embedding".into()));
        }
        self.check_dimension(vector.len())?;
        self.entries.push(IndexEntry {
            id: entry_id(&chunk),
            vector,
            chunk,
        });
        Ok(())
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Ties keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] on an empty index and
    /// [`IndexError::DimensionMismatch`] if the query has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.entries.is_empty() {
            return Err(IndexError::NotFound);
        }
        self.check_dimension(query.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Path of the index file inside `location`.
    #[must_use]
    pub fn file_path(location: &Path) -> PathBuf {
        location.join(INDEX_FILE)
    }

    #[must_use]
    pub fn exists(location: &Path) -> bool {
        Self::file_path(location).is_file()
    }

    /// Write the index under `location`, replacing any previous index.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// readers never observe a partially written index.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot be written.
    pub fn save(&self, location: &Path) -> Result<PathBuf, IndexError> {
        std::fs::create_dir_all(location)?;
        let target = Self::file_path(location);
        let tmp = location.join(format!("{INDEX_FILE}.tmp"));

        let written = self
            .write_to(&tmp)
            .and_then(|()| std::fs::rename(&tmp, &target).map_err(IndexError::from));
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&tmp)
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %tmp.display(), "failed to remove temporary index: {cleanup}");
            }
            return Err(e);
        }

        tracing::info!(
            path = %target.display(),
            entries = self.entries.len(),
            "index saved"
        );
        Ok(target)
    }

    fn write_to(&self, path: &Path) -> Result<(), IndexError> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`IndexError::Missing`] if no index exists under `location`,
    /// or an error if the file is unreadable, malformed or of another format version.
    pub fn load(location: &Path) -> Result<Self, IndexError> {
        let path = Self::file_path(location);
        if !path.is_file() {
            return Err(IndexError::Missing(location.to_path_buf()));
        }

        let bytes = std::fs::read(&path)?;
        let index: Self = serde_json::from_slice(&bytes)?;
        if index.manifest.format_version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedFormat(index.manifest.format_version));
        }
        for entry in &index.entries {
            index.check_dimension(entry.vector.len())?;
        }

        tracing::debug!(
            path = %path.display(),
            entries = index.entries.len(),
            model = %index.manifest.embedding_model,
            "index loaded"
        );
        Ok(index)
    }

    fn check_dimension(&self, actual: usize) -> Result<(), IndexError> {
        if actual == self.manifest.dimension {
            Ok(())
        } else {
            Err(IndexError::DimensionMismatch {
                expected: self.manifest.dimension,
                actual,
            })
        }
    }
}

fn entry_id(chunk: &Chunk) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(chunk.document_id.as_bytes());
    hasher.update(&chunk.chunk_index.to_le_bytes());
    hasher.update(chunk.content.as_bytes());
    hasher.finalize().to_hex()[..16].to_owned()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
