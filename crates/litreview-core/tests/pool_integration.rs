//! Integration tests for the summarization pool.
//!
//! These use the mock LLM backend, so no HTTP requests are made and no real
//! PDFs are needed: the pool hands file paths to the adapter without
//! reading them itself.

use std::path::PathBuf;
use std::sync::Arc;

use litreview_core::align::ReferenceMap;
use litreview_core::{
    Document, PipelineConfig, ProgressReporter, ResultStore, run_summaries,
};
use litreview_llm::{MockBackend, MockReply};

fn doc(name: &str) -> Document {
    Document {
        path: PathBuf::from(format!("pdfs/{name}")),
        file_name: name.to_string(),
        modified: None,
    }
}

fn map(entries: &[(&str, Option<&str>)]) -> ReferenceMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(String::from)))
        .collect()
}

fn config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        num_workers: workers,
        max_retries: 0,
        ..Default::default()
    }
}

fn store_in(dir: &tempfile::TempDir) -> Arc<ResultStore> {
    Arc::new(ResultStore::new(dir.path().join("summary.json")))
}

#[tokio::test]
async fn unmatched_documents_are_never_sent_to_the_llm() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let backend = Arc::new(MockBackend::new(MockReply::Text("a summary".into())));
    let reporter = Arc::new(ProgressReporter::new());

    let docs = vec![doc("A.pdf"), doc("B.pdf"), doc("C.pdf")];
    let refs = map(&[("A.pdf", Some("citA")), ("B.pdf", None), ("C.pdf", Some("citC"))]);

    let outcomes = run_summaries(&docs, &refs, &config(2), store, backend.clone(), reporter).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(backend.call_count(), 2);
    let called: Vec<String> = backend.calls().into_iter().flatten().collect();
    assert!(!called.contains(&"B.pdf".to_string()));
}

#[tokio::test]
async fn failed_document_is_reported_but_not_persisted_then_retried() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let backend = Arc::new(
        MockBackend::new(MockReply::Text("a summary".into()))
            .reply_for("C.pdf", MockReply::Error("HTTP 503".into())),
    );
    let reporter = Arc::new(ProgressReporter::new());

    let docs = vec![doc("A.pdf"), doc("B.pdf"), doc("C.pdf")];
    let refs = map(&[("A.pdf", Some("citA")), ("B.pdf", None), ("C.pdf", Some("citC"))]);

    let outcomes = run_summaries(
        &docs,
        &refs,
        &config(2),
        store.clone(),
        backend.clone(),
        reporter.clone(),
    )
    .await;

    // Both matched documents produced outcomes, one of them an error.
    assert_eq!(outcomes.len(), 2);
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_success()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].file_name, "C.pdf");

    // The store holds exactly the success.
    let (names, persisted) = store.load_existing();
    assert_eq!(names.len(), 1);
    assert!(names.contains("A.pdf"));
    assert_eq!(persisted[0].file_index, Some(1));

    // A second run attempts only C again.
    let backend2 = Arc::new(MockBackend::new(MockReply::Text("c summary".into())));
    let outcomes2 = run_summaries(&docs, &refs, &config(2), store.clone(), backend2.clone(), reporter).await;
    assert_eq!(backend2.call_count(), 1);
    assert_eq!(outcomes2.len(), 1);
    assert_eq!(outcomes2[0].file_name, "C.pdf");

    let (names, _) = store.load_existing();
    assert_eq!(names.len(), 2);
}

#[tokio::test]
async fn already_successful_documents_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    // Seed the store with a success for A.pdf from a previous run.
    let seeded = run_summaries(
        &[doc("A.pdf")],
        &map(&[("A.pdf", Some("citA"))]),
        &config(1),
        store.clone(),
        Arc::new(MockBackend::new(MockReply::Text("a summary".into()))),
        Arc::new(ProgressReporter::new()),
    )
    .await;
    assert_eq!(seeded.len(), 1);

    // New run over [A, D]: only D triggers a call, final store has 2 entries.
    let backend = Arc::new(MockBackend::new(MockReply::Text("d summary".into())));
    let outcomes = run_summaries(
        &[doc("A.pdf"), doc("D.pdf")],
        &map(&[("A.pdf", Some("citA")), ("D.pdf", Some("citD"))]),
        &config(2),
        store.clone(),
        backend.clone(),
        Arc::new(ProgressReporter::new()),
    )
    .await;

    assert_eq!(backend.call_count(), 1);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].file_name, "D.pdf");

    let (names, _) = store.load_existing();
    assert_eq!(names.len(), 2);
}

#[tokio::test]
async fn rerun_with_no_new_work_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let docs = vec![doc("A.pdf"), doc("B.pdf")];
    let refs = map(&[("A.pdf", Some("citA")), ("B.pdf", Some("citB"))]);

    run_summaries(
        &docs,
        &refs,
        &config(2),
        store.clone(),
        Arc::new(MockBackend::new(MockReply::Text("s".into()))),
        Arc::new(ProgressReporter::new()),
    )
    .await;
    let content_before = std::fs::read_to_string(store.path()).unwrap();

    let backend = Arc::new(MockBackend::new(MockReply::Text("s".into())));
    let reporter = Arc::new(ProgressReporter::new());
    let outcomes = run_summaries(&docs, &refs, &config(2), store.clone(), backend.clone(), reporter.clone()).await;

    // Zero new LLM calls, zero new outcomes, byte-identical store.
    assert_eq!(backend.call_count(), 0);
    assert!(outcomes.is_empty());
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), content_before);
    assert_eq!(reporter.snapshot().message, "all done");
}

#[tokio::test]
async fn progress_is_monotonic_and_terminates_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let reporter = Arc::new(ProgressReporter::new());
    let mut rx = reporter.subscribe();

    let docs = vec![doc("A.pdf"), doc("B.pdf"), doc("C.pdf")];
    let refs = map(&[
        ("A.pdf", Some("citA")),
        ("B.pdf", Some("citB")),
        ("C.pdf", Some("citC")),
    ]);

    run_summaries(
        &docs,
        &refs,
        &config(2),
        store,
        Arc::new(MockBackend::new(MockReply::Text("s".into()))),
        reporter.clone(),
    )
    .await;

    let mut events = Vec::new();
    while let Ok(state) = rx.try_recv() {
        events.push(state);
    }

    let mut last_current = 0;
    for state in &events {
        assert!(state.current >= last_current, "current went backwards");
        assert!(state.current <= state.total, "current exceeded total");
        last_current = state.current;
    }

    let terminal: Vec<_> = events.iter().filter(|s| s.message == "all done").collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].current, 3);
    assert_eq!(terminal[0].total, 3);
}

#[tokio::test]
async fn empty_work_list_reports_completion_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let backend = Arc::new(MockBackend::new(MockReply::Text("s".into())));
    let reporter = Arc::new(ProgressReporter::new());

    let outcomes = run_summaries(
        &[doc("A.pdf")],
        &map(&[("A.pdf", None)]),
        &config(2),
        store,
        backend.clone(),
        reporter.clone(),
    )
    .await;

    assert!(outcomes.is_empty());
    assert_eq!(backend.call_count(), 0);
    assert_eq!(reporter.snapshot().message, "all done");
}

#[tokio::test]
async fn many_documents_drain_through_few_workers() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let backend = Arc::new(MockBackend::new(MockReply::Text("s".into())));

    let docs: Vec<Document> = (0..12).map(|i| doc(&format!("p{i:02}.pdf"))).collect();
    let entries: Vec<(String, Option<String>)> = docs
        .iter()
        .map(|d| (d.file_name.clone(), Some(format!("cit {}", d.file_name))))
        .collect();
    let refs: ReferenceMap = entries.into_iter().collect();

    let outcomes = run_summaries(
        &docs,
        &refs,
        &config(3),
        store.clone(),
        backend.clone(),
        Arc::new(ProgressReporter::new()),
    )
    .await;

    assert_eq!(outcomes.len(), 12);
    assert_eq!(backend.call_count(), 12);
    let (names, persisted) = store.load_existing();
    assert_eq!(names.len(), 12);

    // file_index is a dense 1..=12 in completion order.
    let mut indices: Vec<usize> = persisted.iter().map(|o| o.file_index.unwrap()).collect();
    indices.sort_unstable();
    assert_eq!(indices, (1..=12).collect::<Vec<_>>());
}
