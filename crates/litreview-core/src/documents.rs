//! PDF discovery.

use std::path::Path;

use crate::{CoreError, Document};

/// Scan a directory for PDF files (case-insensitive `.pdf` suffix,
/// non-recursive), sorted by file name.
///
/// The sorted order makes every downstream iteration deterministic, in
/// particular the first-claim-wins rule during reference-map validation.
/// An empty result is not an error here; the pipeline entry point decides
/// whether that is fatal.
pub fn scan_documents(dir: &Path) -> Result<Vec<Document>, CoreError> {
    let mut documents = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::debug!(path = %path.display(), "skipping non-UTF-8 file name");
            continue;
        };
        if !name.to_lowercase().ends_with(".pdf") {
            continue;
        }
        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        documents.push(Document {
            file_name: name.to_string(),
            path,
            modified,
        });
    }

    documents.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    tracing::info!(dir = %dir.display(), count = documents.len(), "scanned PDF directory");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_pdfs_case_insensitively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.PDF"), b"x").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub.pdf")).unwrap();

        let docs = scan_documents(dir.path()).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
        assert!(docs.iter().all(|d| d.modified.is_some()));
    }

    #[test]
    fn empty_directory_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_documents(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_io_error() {
        assert!(matches!(
            scan_documents(Path::new("/nonexistent/pdf_dir")),
            Err(CoreError::Io(_))
        ));
    }
}
