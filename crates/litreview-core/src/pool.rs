//! Bounded worker pool for batch summarization.
//!
//! Architecture: one shared job queue drained by `num_workers` worker tasks,
//! which bounds outbound LLM request concurrency to respect provider rate
//! limits. Each worker produces exactly one outcome per document, persists
//! successes immediately through the [`ResultStore`] (so a crash or kill
//! mid-run loses at most one in-flight item), and reports completion
//! through the injected [`ProgressReporter`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use litreview_llm::{LlmBackend, generate_with_retry};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::align::ReferenceMap;
use crate::{
    Document, PipelineConfig, ProgressReporter, ResultStore, SummaryOutcome, http_client,
};

/// A summarization job submitted to the pool.
struct SummaryJob {
    document: Document,
    reference: String,
    result_tx: oneshot::Sender<SummaryOutcome>,
}

/// State shared by all workers of one run.
struct RunContext {
    backend: Arc<dyn LlmBackend>,
    store: Arc<ResultStore>,
    reporter: Arc<ProgressReporter>,
    client: reqwest::Client,
    prompt: String,
    timeout: Duration,
    max_retries: u32,
    /// Tasks dispatched this run; progress counts against this, not the
    /// all-time store size.
    total: usize,
    completed: AtomicUsize,
}

/// A pool of worker tasks draining a shared job queue.
struct SummaryPool {
    job_tx: async_channel::Sender<SummaryJob>,
    pool_handle: JoinHandle<()>,
}

impl SummaryPool {
    fn new(ctx: Arc<RunContext>, num_workers: usize) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<SummaryJob>();

        let pool_handle = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(num_workers.max(1));
            for _ in 0..num_workers.max(1) {
                handles.push(tokio::spawn(worker_loop(job_rx.clone(), ctx.clone())));
            }
            // Drop our clone so workers are the last holders
            drop(job_rx);
            for h in handles {
                let _ = h.await;
            }
        });

        Self {
            job_tx,
            pool_handle,
        }
    }

    async fn submit(&self, job: SummaryJob) {
        let _ = self.job_tx.send(job).await;
    }

    /// Close the queue and wait for the workers to drain it.
    async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

/// Worker loop: take a job, summarize, persist, report, reply.
async fn worker_loop(rx: async_channel::Receiver<SummaryJob>, ctx: Arc<RunContext>) {
    while let Ok(job) = rx.recv().await {
        let outcome = summarize_one(&job, &ctx).await;

        let done = ctx.completed.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.reporter.update(done, ctx.total, outcome.file_name.as_str());

        let _ = job.result_tx.send(outcome);
    }
}

async fn summarize_one(job: &SummaryJob, ctx: &RunContext) -> SummaryOutcome {
    let start = Instant::now();
    tracing::info!(file = %job.document.file_name, "summarizing document");

    let reply = generate_with_retry(
        ctx.backend.as_ref(),
        &ctx.prompt,
        std::slice::from_ref(&job.document.path),
        &ctx.client,
        ctx.timeout,
        ctx.max_retries,
    )
    .await;

    let elapsed = start.elapsed().as_secs_f64();
    let mut outcome = SummaryOutcome {
        file_path: job.document.path.display().to_string(),
        file_name: job.document.file_name.clone(),
        reference: job.reference.clone(),
        summary: String::new(),
        error: None,
        elapsed_time: Some((elapsed * 100.0).round() / 100.0),
        file_index: None,
    };

    match reply {
        Ok(text) if !text.trim().is_empty() => outcome.summary = text,
        Ok(_) => outcome.error = Some("LLM Generation Error: empty reply".to_string()),
        Err(e) => outcome.error = Some(format!("LLM Generation Error: {e}")),
    }

    if outcome.is_success() {
        // Persist now, not at end-of-run: partial progress must survive a kill.
        match ctx.store.append(&outcome) {
            Ok(index) => outcome.file_index = index,
            Err(e) => {
                tracing::warn!(file = %outcome.file_name, error = %e, "failed to persist outcome");
                outcome.error = Some(format!("Store Error: {e}"));
                outcome.summary.clear();
            }
        }
        tracing::info!(
            file = %outcome.file_name,
            elapsed_secs = elapsed,
            ok = outcome.is_success(),
            "summary complete"
        );
    } else {
        tracing::warn!(
            file = %outcome.file_name,
            error = outcome.error.as_deref().unwrap_or("-"),
            "summary failed, will retry next run"
        );
    }

    outcome
}

/// Summarize every still-unprocessed document and return the outcomes
/// produced this run (successes and failures both; only successes were
/// persisted).
///
/// Documents without a reference-map entry are skipped entirely; they are
/// never sent to the LLM. Documents already successful in the store are
/// subtracted before dispatch, which is what makes repeated runs idempotent
/// and interrupted runs resumable. A single document's failure never aborts
/// the pool.
pub async fn run_summaries(
    documents: &[Document],
    reference_map: &ReferenceMap,
    config: &PipelineConfig,
    store: Arc<ResultStore>,
    backend: Arc<dyn LlmBackend>,
    reporter: Arc<ProgressReporter>,
) -> Vec<SummaryOutcome> {
    let matched: Vec<(&Document, &str)> = documents
        .iter()
        .filter_map(|d| {
            reference_map
                .get(&d.file_name)
                .and_then(|r| r.as_deref())
                .map(|citation| (d, citation))
        })
        .collect();

    let (already_done, _) = store.load_existing();
    let pending: Vec<(&Document, &str)> = matched
        .iter()
        .filter(|(d, _)| !already_done.contains(&d.file_name))
        .copied()
        .collect();

    let total = pending.len();
    tracing::info!(
        pending = total,
        matched = matched.len(),
        scanned = documents.len(),
        already_done = already_done.len(),
        "summarization work list"
    );

    reporter.reset(total);
    if pending.is_empty() {
        reporter.update(0, 0, "all done");
        return Vec::new();
    }

    let ctx = Arc::new(RunContext {
        backend,
        store,
        reporter: reporter.clone(),
        client: http_client(),
        prompt: config.document_prompt(),
        timeout: Duration::from_secs(config.llm_timeout_secs),
        max_retries: config.max_retries,
        total,
        completed: AtomicUsize::new(0),
    });

    let pool = SummaryPool::new(ctx, config.num_workers);

    let mut receivers = Vec::with_capacity(total);
    for (document, citation) in pending {
        let (result_tx, result_rx) = oneshot::channel();
        pool.submit(SummaryJob {
            document: document.clone(),
            reference: citation.to_string(),
            result_tx,
        })
        .await;
        receivers.push(result_rx);
    }

    let mut outcomes = Vec::with_capacity(total);
    for rx in receivers {
        if let Ok(outcome) = rx.await {
            outcomes.push(outcome);
        }
    }

    pool.shutdown().await;

    // Terminal signal, exactly once, after every task finished either way.
    reporter.update(total, total, "all done");
    outcomes
}
