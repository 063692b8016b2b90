//! PDF text extraction behind a single function.
//!
//! All errors render with a `PDF Extraction Error:` prefix so upstream
//! consumers (prompt builders, per-document error records) can recognize an
//! extraction failure from the message alone.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("PDF Extraction Error: failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("PDF Extraction Error: {0}")]
    Parse(String),
    #[error("PDF Extraction Error: no extractable text in {0}")]
    Empty(String),
}

/// Extract the full text of a PDF file.
///
/// Scanned PDFs without a text layer yield [`PdfError::Empty`]; there is no
/// OCR fallback here.
pub fn extract_text(path: &Path) -> Result<String, PdfError> {
    let bytes = std::fs::read(path).map_err(|source| PdfError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| PdfError::Parse(format!("{}: {}", path.display(), e)))?;

    if text.trim().is_empty() {
        return Err(PdfError::Empty(path.display().to_string()));
    }

    tracing::debug!(path = %path.display(), chars = text.len(), "extracted PDF text");
    Ok(text)
}
