//! Reference alignment: match PDF file names to citation strings.
//!
//! One LLM call produces a candidate `{file_name: citation | null}` map;
//! post-validation then enforces the strict 1:1 invariant no matter what the
//! model returned. The validated map is persisted to a side file and loaded
//! as-is on later runs, so alignment is billed at most once per corpus:
//! idempotence over freshness. Callers wanting a fresh alignment must delete
//! or refresh the side file explicitly.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use litreview_llm::{LlmBackend, generate_with_retry};
use serde_json::Value;

use crate::json_extract::extract_json;
use crate::{CoreError, Document};

/// `file_name -> citation | null` for every scanned document.
pub type ReferenceMap = BTreeMap<String, Option<String>>;

/// Load the persisted map, or align via the LLM and persist the result.
///
/// When `refresh` is set the side file is removed first, forcing a new
/// alignment call.
#[allow(clippy::too_many_arguments)]
pub async fn load_or_align(
    mapping_path: &Path,
    documents: &[Document],
    reference_file: &Path,
    backend: &dyn LlmBackend,
    client: &reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    refresh: bool,
) -> Result<ReferenceMap, CoreError> {
    if refresh {
        let _ = std::fs::remove_file(mapping_path);
    }

    if let Some(map) = load_mapping(mapping_path) {
        tracing::info!(
            path = %mapping_path.display(),
            entries = map.len(),
            "loaded existing reference mapping"
        );
        return Ok(map);
    }

    let references_text = std::fs::read_to_string(reference_file)
        .map_err(|_| CoreError::EmptyReferences(reference_file.to_path_buf()))?;
    if references_text.trim().is_empty() {
        return Err(CoreError::EmptyReferences(reference_file.to_path_buf()));
    }

    if documents.is_empty() {
        return Ok(ReferenceMap::new());
    }

    let prompt = alignment_prompt(documents, &references_text);
    tracing::info!(
        backend = backend.name(),
        files = documents.len(),
        "aligning file names against the reference list"
    );

    let reply = generate_with_retry(backend, &prompt, &[], client, timeout, max_retries)
        .await
        .map_err(|e| CoreError::Align(e.to_string()))?;

    let raw = extract_json(&reply)
        .ok_or_else(|| CoreError::Align("unparsable mapping reply".to_string()))?;
    let map = validate_mapping(&raw, documents, &references_text);

    save_mapping(mapping_path, &map)?;

    let matched = map.values().filter(|v| v.is_some()).count();
    tracing::info!(matched, total = map.len(), "reference alignment complete");
    Ok(map)
}

/// Load a persisted mapping. Missing, empty, or unparsable files yield
/// `None` so the caller re-aligns.
pub fn load_mapping(path: &Path) -> Option<ReferenceMap> {
    let data = std::fs::read_to_string(path).ok()?;
    if data.trim().is_empty() {
        tracing::warn!(path = %path.display(), "mapping file is empty, re-aligning");
        return None;
    }
    match serde_json::from_str(&data) {
        Ok(map) => Some(map),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "mapping file unparsable, re-aligning");
            None
        }
    }
}

/// Persist a mapping as pretty-printed JSON.
pub fn save_mapping(path: &Path, map: &ReferenceMap) -> Result<(), CoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(map)?)?;
    Ok(())
}

fn alignment_prompt(documents: &[Document], references_text: &str) -> String {
    let file_names: Vec<&str> = documents.iter().map(|d| d.file_name.as_str()).collect();
    let names_json = serde_json::to_string(&file_names).unwrap_or_default();

    format!(
        "Task: match each PDF file name below to its entry in the reference list.\n\
         \n\
         PDF file names:\n{names_json}\n\
         \n\
         Reference list:\n{references_text}\n\
         \n\
         Rules:\n\
         1. Use title and author hints in the file names to find the best match.\n\
         2. Return a JSON object whose keys are the file names and whose values\n\
            are the complete citation strings, copied verbatim from the list.\n\
         3. If a file has no matching reference, use null for its value.\n\
         4. Each reference may be assigned to at most one file.\n\
         5. Do not include leading reference numbers in the values.\n\
         6. Return only the JSON object, with no code fences or commentary.\n"
    )
}

/// Enforce the 1:1 invariant on a raw LLM mapping.
///
/// Iterates documents in scan order: a citation is kept only if it appears
/// verbatim in the reference list and has not been claimed by an earlier
/// file. Everything else becomes null, and every scanned document gets an
/// entry even if the model omitted it.
fn validate_mapping(raw: &Value, documents: &[Document], references_text: &str) -> ReferenceMap {
    let mut used: HashSet<&str> = HashSet::new();
    let mut map = ReferenceMap::new();

    for doc in documents {
        let citation = raw
            .get(&doc.file_name)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let accepted = match citation {
            Some(c) if references_text.contains(c) && !used.contains(c) => {
                used.insert(c);
                Some(c.to_string())
            }
            Some(c) => {
                tracing::debug!(
                    file = %doc.file_name,
                    citation = c,
                    "dropping citation (not in list or already claimed)"
                );
                None
            }
            None => None,
        };
        map.insert(doc.file_name.clone(), accepted);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use litreview_llm::{MockBackend, MockReply};

    fn doc(name: &str) -> Document {
        Document {
            path: std::path::PathBuf::from(format!("pdfs/{name}")),
            file_name: name.to_string(),
            modified: None,
        }
    }

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    const REFS: &str = "Smith, J. Paper One. 2020.\nJones, K. Paper Two. 2021.\n";

    #[test]
    fn validation_drops_citations_not_in_list() {
        let raw = serde_json::json!({
            "a.pdf": "Smith, J. Paper One. 2020.",
            "b.pdf": "Fabricated citation. 1999.",
        });
        let docs = vec![doc("a.pdf"), doc("b.pdf")];
        let map = validate_mapping(&raw, &docs, REFS);
        assert_eq!(map["a.pdf"].as_deref(), Some("Smith, J. Paper One. 2020."));
        assert_eq!(map["b.pdf"], None);
    }

    #[test]
    fn validation_first_claim_wins() {
        let raw = serde_json::json!({
            "a.pdf": "Smith, J. Paper One. 2020.",
            "b.pdf": "Smith, J. Paper One. 2020.",
        });
        let docs = vec![doc("a.pdf"), doc("b.pdf")];
        let map = validate_mapping(&raw, &docs, REFS);
        assert_eq!(map["a.pdf"].as_deref(), Some("Smith, J. Paper One. 2020."));
        assert_eq!(map["b.pdf"], None);
    }

    #[test]
    fn validation_no_two_files_share_a_citation() {
        let raw = serde_json::json!({
            "a.pdf": "Smith, J. Paper One. 2020.",
            "b.pdf": "Jones, K. Paper Two. 2021.",
            "c.pdf": "Jones, K. Paper Two. 2021.",
        });
        let docs = vec![doc("a.pdf"), doc("b.pdf"), doc("c.pdf")];
        let map = validate_mapping(&raw, &docs, REFS);

        let mut seen = HashSet::new();
        for citation in map.values().flatten() {
            assert!(seen.insert(citation.clone()), "duplicate citation {citation}");
        }
        assert_eq!(map["c.pdf"], None);
    }

    #[test]
    fn validation_covers_files_the_model_omitted() {
        let raw = serde_json::json!({ "a.pdf": "Smith, J. Paper One. 2020." });
        let docs = vec![doc("a.pdf"), doc("b.pdf")];
        let map = validate_mapping(&raw, &docs, REFS);
        assert_eq!(map.len(), 2);
        assert_eq!(map["b.pdf"], None);
    }

    #[tokio::test]
    async fn aligns_and_persists_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let mapping_path = dir.path().join("mapping.json");
        let reference_file = dir.path().join("refs.txt");
        std::fs::write(&reference_file, REFS).unwrap();

        let reply = "```json\n{\"a.pdf\": \"Smith, J. Paper One. 2020.\", \"b.pdf\": null}\n```";
        let backend = MockBackend::new(MockReply::Text(reply.into()));
        let docs = vec![doc("a.pdf"), doc("b.pdf")];

        let map = load_or_align(
            &mapping_path,
            &docs,
            &reference_file,
            &backend,
            &client(),
            Duration::from_secs(5),
            0,
            false,
        )
        .await
        .unwrap();

        assert_eq!(map["a.pdf"].as_deref(), Some("Smith, J. Paper One. 2020."));
        assert_eq!(map["b.pdf"], None);
        assert_eq!(backend.call_count(), 1);
        assert!(mapping_path.exists());
    }

    #[tokio::test]
    async fn existing_mapping_short_circuits_the_llm() {
        let dir = tempfile::tempdir().unwrap();
        let mapping_path = dir.path().join("mapping.json");
        let reference_file = dir.path().join("refs.txt");
        std::fs::write(&reference_file, REFS).unwrap();
        std::fs::write(
            &mapping_path,
            r#"{"a.pdf": "Smith, J. Paper One. 2020.", "b.pdf": null}"#,
        )
        .unwrap();

        let backend = MockBackend::new(MockReply::Text("{}".into()));
        let docs = vec![doc("a.pdf"), doc("b.pdf")];

        let map = load_or_align(
            &mapping_path,
            &docs,
            &reference_file,
            &backend,
            &client(),
            Duration::from_secs(5),
            0,
            false,
        )
        .await
        .unwrap();

        assert_eq!(map["a.pdf"].as_deref(), Some("Smith, J. Paper One. 2020."));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn refresh_forces_a_new_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let mapping_path = dir.path().join("mapping.json");
        let reference_file = dir.path().join("refs.txt");
        std::fs::write(&reference_file, REFS).unwrap();
        std::fs::write(&mapping_path, r#"{"a.pdf": null}"#).unwrap();

        let backend = MockBackend::new(MockReply::Text(
            r#"{"a.pdf": "Smith, J. Paper One. 2020."}"#.into(),
        ));
        let docs = vec![doc("a.pdf")];

        let map = load_or_align(
            &mapping_path,
            &docs,
            &reference_file,
            &backend,
            &client(),
            Duration::from_secs(5),
            0,
            true,
        )
        .await
        .unwrap();

        assert_eq!(backend.call_count(), 1);
        assert_eq!(map["a.pdf"].as_deref(), Some("Smith, J. Paper One. 2020."));
    }

    #[tokio::test]
    async fn missing_reference_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new(MockReply::Text("{}".into()));

        let err = load_or_align(
            &dir.path().join("mapping.json"),
            &[doc("a.pdf")],
            &dir.path().join("missing_refs.txt"),
            &backend,
            &client(),
            Duration::from_secs(5),
            0,
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::EmptyReferences(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn unparsable_reply_is_align_error() {
        let dir = tempfile::tempdir().unwrap();
        let reference_file = dir.path().join("refs.txt");
        std::fs::write(&reference_file, REFS).unwrap();

        let backend = MockBackend::new(MockReply::Text("I could not find any matches.".into()));
        let err = load_or_align(
            &dir.path().join("mapping.json"),
            &[doc("a.pdf")],
            &reference_file,
            &backend,
            &client(),
            Duration::from_secs(5),
            0,
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::Align(_)));
    }
}
