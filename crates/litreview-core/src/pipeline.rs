//! Pipeline façade: scan → align → summarize, with a structured report.

use std::sync::Arc;
use std::time::Duration;

use litreview_llm::LlmBackend;
use serde::Serialize;

use crate::{
    CoreError, PipelineConfig, ProgressReporter, ResultStore, align, http_client, pool,
    scan_documents,
};

/// Counts describing one pipeline invocation.
///
/// Partial success (some documents summarized, some still pending) is the
/// normal resumable state and is reported as success-with-counts, never as
/// a blanket failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// PDFs found by the directory scan.
    pub scanned: usize,
    /// Documents with a non-null reference-map entry.
    pub matched: usize,
    /// Successes already in the store before this run.
    pub already_done: usize,
    /// New successes persisted this run.
    pub processed: usize,
    /// Failures this run (eligible for retry on the next invocation).
    pub failed: usize,
}

/// Run the full summarization pipeline once.
///
/// Fatal conditions (empty PDF directory, missing reference list, failed
/// alignment) error out before any summarization work is dispatched.
pub async fn run_pipeline(
    config: &PipelineConfig,
    backend: Arc<dyn LlmBackend>,
    reporter: Arc<ProgressReporter>,
) -> Result<RunReport, CoreError> {
    let documents = scan_documents(&config.pdf_dir)?;
    if documents.is_empty() {
        return Err(CoreError::EmptyPdfDir(config.pdf_dir.clone()));
    }

    let client = http_client();
    reporter.update(0, 1, "aligning references");
    let reference_map = align::load_or_align(
        &config.mapping_file,
        &documents,
        &config.reference_file,
        backend.as_ref(),
        &client,
        Duration::from_secs(config.llm_timeout_secs),
        config.max_retries,
        config.refresh_mapping,
    )
    .await?;

    let store = Arc::new(ResultStore::new(config.store_file.clone()));
    let (already_done, _) = store.load_existing();
    let matched = documents
        .iter()
        .filter(|d| {
            reference_map
                .get(&d.file_name)
                .is_some_and(|r| r.is_some())
        })
        .count();

    let outcomes = pool::run_summaries(
        &documents,
        &reference_map,
        config,
        store,
        backend,
        reporter,
    )
    .await;

    let processed = outcomes.iter().filter(|o| o.is_success()).count();
    let report = RunReport {
        scanned: documents.len(),
        matched,
        already_done: already_done.len(),
        processed,
        failed: outcomes.len() - processed,
    };
    tracing::info!(?report, "pipeline run complete");
    Ok(report)
}
