//! Document loading: turns a PDF into one [`Document`] per page.
//!
//! Text extraction uses [pdf-extract](https://docs.rs/pdf-extract), which
//! separates pages with form feeds. Scanned PDFs without a text layer yield no
//! documents; OCR is out of scope.

use std::path::Path;

#[cfg(feature = "pdf")]
use tracing::debug;
use tracing::info;

use crate::document::Document;
use crate::error::{RagError, Result};

const PAGE_BREAK: char = '\x0C';

/// Split extracted text into per-page documents.
///
/// Pages are numbered from 1 in extraction order; pages with only whitespace
/// are skipped but still consume a page number.
pub fn documents_from_text(source: &str, text: &str) -> Vec<Document> {
    let pages: Vec<&str> = text.split(PAGE_BREAK).collect();
    let page_count = pages.len().to_string();

    pages
        .into_iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| {
            Document::new(source, page.trim())
                .with_page(i as u32 + 1)
                .with_metadata("page_count", page_count.clone())
        })
        .collect()
}

/// Load the PDF at `path` as one [`Document`] per non-blank page.
///
/// # Errors
///
/// Returns [`RagError::DocumentLoad`] if the file cannot be read, is not a
/// valid PDF, or contains no extractable text.
#[cfg(feature = "pdf")]
pub async fn load_pdf(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let load_error = |message: String| RagError::DocumentLoad { path: source.clone(), message };

    let bytes = tokio::fs::read(path).await.map_err(|e| load_error(e.to_string()))?;
    debug!(path = %source, bytes = bytes.len(), "read pdf");

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| load_error(format!("extraction task failed: {e}")))?
        .map_err(|e| load_error(format!("PDF extraction failed: {e}")))?;

    let documents = documents_from_text(&source, &text);
    if documents.is_empty() {
        return Err(load_error("no extractable text (scanned PDF?)".to_string()));
    }

    info!(path = %source, pages = documents.len(), "loaded pdf");
    Ok(documents)
}

/// Load a plain UTF-8 text file as a single [`Document`].
///
/// # Errors
///
/// Returns [`RagError::DocumentLoad`] if the file cannot be read.
pub async fn load_text(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RagError::DocumentLoad { path: source.clone(), message: e.to_string() })?;
    info!(path = %source, chars = text.chars().count(), "loaded text document");
    Ok(Document::new(source, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_pages_on_form_feed_and_skips_blank_pages() {
        let docs = documents_from_text("report.pdf", "Intro page\x0C  \n \x0CResults page\n");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].page, Some(1));
        assert_eq!(docs[0].text, "Intro page");
        assert_eq!(docs[1].page, Some(3));
        assert_eq!(docs[1].text, "Results page");
        assert_eq!(docs[1].metadata["page_count"], "3");
        assert!(docs.iter().all(|d| d.source == "report.pdf"));
    }

    #[test]
    fn text_without_page_breaks_is_one_page() {
        let docs = documents_from_text("a.pdf", "just one page");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page, Some(1));
    }

    #[test]
    fn whitespace_only_text_has_no_documents() {
        assert!(documents_from_text("a.pdf", " \n\x0C\t").is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_a_load_error() {
        let err = load_text("/definitely/not/here.txt").await.unwrap_err();
        assert!(matches!(err, RagError::DocumentLoad { .. }));
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn invalid_pdf_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        let err = load_pdf(&path).await.unwrap_err();
        assert!(matches!(err, RagError::DocumentLoad { .. }));
    }
}
