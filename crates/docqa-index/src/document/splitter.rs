use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::error::DocumentError;
use super::types::{Chunk, Document};

/// How chunk sizes are measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Chars,
    Words,
}

impl LengthUnit {
    #[must_use]
    pub fn measure(self, text: &str) -> usize {
        match self {
            Self::Chars => text.chars().count(),
            Self::Words => text.split_whitespace().count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub unit: LengthUnit,
    /// Tried in order; an empty separator splits into single characters.
    pub separators: Vec<String>,
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", " ", ""]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            chunk_overlap: 1_000,
            unit: LengthUnit::Chars,
            separators: default_separators(),
        }
    }
}

/// Recursive separator-based splitter.
///
/// Text is cut on the first separator that occurs in it. Pieces that still
/// exceed `chunk_size` are cut again with the next separator, down to single
/// characters. Adjacent pieces are then merged back into chunks of at most
/// `chunk_size`, each new chunk repeating up to `chunk_overlap` of the tail of
/// the previous one.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidSplitter`] if `chunk_size` is zero or
    /// `chunk_overlap` is not smaller than `chunk_size`.
    pub fn new(config: SplitterConfig) -> Result<Self, DocumentError> {
        if config.chunk_size == 0 {
            return Err(DocumentError::InvalidSplitter(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(DocumentError::InvalidSplitter(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let content = &document.content;
        let texts = self.split_text(content);

        let mut chunks = Vec::with_capacity(texts.len());
        let mut byte_pos = 0;
        let mut char_pos = 0;
        for (chunk_index, text) in texts.into_iter().enumerate() {
            if let Some(found) = content[byte_pos..].find(&text) {
                let start = byte_pos + found;
                char_pos += content[byte_pos..start].chars().count();
                byte_pos = start;
            }
            let length = text.chars().count();
            chunks.push(Chunk {
                document_id: document.id.clone(),
                content: text,
                offset: char_pos,
                length,
                chunk_index,
                metadata: document.metadata.clone(),
            });
        }
        chunks
    }

    #[must_use]
    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.split(d)).collect()
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    fn measure(&self, text: &str) -> usize {
        self.config.unit.measure(text)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, remaining): (&str, &[String]) = match separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
        {
            Some(i) => (separators[i].as_str(), &separators[i + 1..]),
            None => ("", &[]),
        };

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if self.measure(piece) <= self.config.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            out.extend(self.split_recursive(piece, remaining));
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting, separator));
        }
        out
    }

    /// Greedily packs pieces into chunks, carrying an overlapping tail forward.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let sep_len = self.measure(separator);

        let mut out = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = self.measure(piece);
            let joint = if current.is_empty() { 0 } else { sep_len };
            if total + len + joint > size && !current.is_empty() {
                push_joined(&mut out, &current, separator);
                // Empty pieces measure zero but still cost a separator.
                while let Some(&first) = current.front() {
                    if total <= overlap && total + len + sep_len <= size {
                        break;
                    }
                    let joint = if current.len() > 1 { sep_len } else { 0 };
                    current.pop_front();
                    total = total.saturating_sub(self.measure(first) + joint);
                }
            }
            let joint = if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
            total += len + joint;
        }
        push_joined(&mut out, &current, separator);
        out
    }
}

fn push_joined(out: &mut Vec<String>, pieces: &VecDeque<&str>, separator: &str) {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_owned());
    }
}
