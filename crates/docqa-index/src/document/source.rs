use std::path::{Path, PathBuf};

use super::types::document_id;
use super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, TextLoader};

/// Enumerates and loads every supported file under a directory.
///
/// Hidden files are skipped. Files are visited in path order so repeated
/// loads of an unchanged directory produce documents in the same order.
pub struct DirectorySource {
    root: PathBuf,
    recursive: bool,
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl DirectorySource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_max_file_size(root, DEFAULT_MAX_FILE_SIZE)
    }

    #[must_use]
    pub fn with_max_file_size(root: impl Into<PathBuf>, max_file_size: u64) -> Self {
        let mut loaders: Vec<Box<dyn DocumentLoader>> = Vec::new();
        #[cfg(feature = "pdf")]
        loaders.push(Box::new(super::PdfLoader { max_file_size }));
        loaders.push(Box::new(TextLoader { max_file_size }));
        Self {
            root: root.into(),
            recursive: false,
            loaders,
        }
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        for loader in &self.loaders {
            if loader.supported_extensions().contains(&ext.as_str()) {
                return Some(loader.as_ref());
            }
        }
        None
    }

    /// Path below the root with `/` separators, so nested files keep distinct ids.
    fn relative_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Supported files under the root, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotADirectory`] if the root does not exist or is not a directory.
    pub fn files(&self) -> Result<Vec<PathBuf>, DocumentError> {
        if !self.root.is_dir() {
            return Err(DocumentError::NotADirectory(self.root.clone()));
        }

        let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(true)
            .max_depth(if self.recursive { None } else { Some(1) })
            .build()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|p| self.loader_for(p).is_some())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Load every supported file.
    ///
    /// # Errors
    ///
    /// Returns the first error from listing the directory or loading a file.
    pub async fn load_all(&self) -> Result<Vec<Document>, DocumentError> {
        let files = self.files()?;
        tracing::info!(root = %self.root.display(), files = files.len(), "loading documents");

        let mut documents = Vec::new();
        for path in &files {
            let Some(loader) = self.loader_for(path) else {
                continue;
            };
            let mut docs = loader.load(path).await?;
            let name = self.relative_name(path);
            for doc in &mut docs {
                doc.id = document_id(&name, doc.metadata.page);
            }
            tracing::debug!(path = %path.display(), documents = docs.len(), "loaded");
            documents.extend(docs);
        }
        Ok(documents)
    }
}
