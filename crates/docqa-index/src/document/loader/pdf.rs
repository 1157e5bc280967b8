use std::collections::BTreeMap;
use std::path::Path;
use std::pin::Pin;

use super::super::types::document_id;
use super::super::{
    DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata,
};

/// Loads a PDF as one document per page.
pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = tokio::fs::canonicalize(&path).await?;

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let source = path.display().to_string();
            let name = super::file_name(&path);
            let path_buf = path.clone();
            let pages = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_by_pages(&path_buf)
                    .map_err(|e| DocumentError::Pdf(e.to_string()))
            })
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))??;

            Ok(pages_to_documents(&name, &source, pages))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

fn pages_to_documents(name: &str, source: &str, pages: Vec<String>) -> Vec<Document> {
    pages
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let page = i + 1;
            Document {
                id: document_id(name, Some(page)),
                content,
                metadata: DocumentMetadata {
                    source: source.to_owned(),
                    content_type: "application/pdf".to_owned(),
                    page: Some(page),
                    extra: BTreeMap::new(),
                },
            }
        })
        .collect()
}
