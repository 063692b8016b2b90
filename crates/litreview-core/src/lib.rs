use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod align;
pub mod config_file;
pub mod documents;
pub mod draft;
pub mod json_extract;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod prompts;
pub mod store;

// Re-export for convenience
pub use align::{ReferenceMap, load_or_align};
pub use documents::scan_documents;
pub use json_extract::extract_json;
pub use pipeline::{RunReport, run_pipeline};
pub use pool::run_summaries;
pub use progress::{ProgressReporter, ProgressState};
pub use store::ResultStore;

/// One source PDF discovered by a directory scan.
///
/// Documents are rediscovered fresh on every run and never persisted;
/// `file_name` is the join key against the reference map and the durable
/// store.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub file_name: String,
    /// Filesystem mtime, recorded for observability. Store identity is by
    /// file name, so a renamed file re-summarizes and a touched one does not.
    pub modified: Option<SystemTime>,
}

/// The result of attempting to summarize one document.
///
/// Successful iff `error` is `None` and `summary` is non-empty. Only
/// successful outcomes are ever written to the durable store; failures are
/// reported upward and retried on the next run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutcome {
    pub file_path: String,
    pub file_name: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_index: Option<usize>,
}

impl SummaryOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.summary.is_empty()
    }
}

/// Runtime configuration for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub pdf_dir: PathBuf,
    pub reference_file: PathBuf,
    pub mapping_file: PathBuf,
    pub store_file: PathBuf,
    /// Bound on concurrent outbound LLM requests.
    pub num_workers: usize,
    pub llm_timeout_secs: u64,
    pub draft_timeout_secs: u64,
    pub max_retries: u32,
    pub summary_prompt: String,
    pub research_theme: String,
    /// Discard the persisted reference map and re-align from scratch.
    pub refresh_mapping: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pdf_dir: PathBuf::from("pdfs"),
            reference_file: PathBuf::from("references.txt"),
            mapping_file: PathBuf::from("reference_mapping.json"),
            store_file: PathBuf::from("literature_summary.json"),
            num_workers: 3,
            llm_timeout_secs: 300,
            draft_timeout_secs: 1800,
            max_retries: litreview_llm::DEFAULT_MAX_RETRIES,
            summary_prompt: prompts::SUMMARY_PROMPT.to_string(),
            research_theme: String::new(),
            refresh_mapping: false,
        }
    }
}

impl PipelineConfig {
    /// Build a runtime config from an on-disk [`config_file::ConfigFile`],
    /// reading any referenced prompt files. Missing fields fall back to
    /// defaults; front ends layer their own overrides on top.
    pub fn from_config_file(file: &config_file::ConfigFile) -> Result<Self, CoreError> {
        let defaults = Self::default();
        let paths = file.paths.clone().unwrap_or_default();
        let concurrency = file.concurrency.clone().unwrap_or_default();
        let prompt_files = file.prompts.clone().unwrap_or_default();

        let read_trimmed = |path: &str| -> Result<String, CoreError> {
            Ok(std::fs::read_to_string(path)?.trim().to_string())
        };
        let research_theme = match prompt_files.research_theme_file.as_deref() {
            Some(path) => read_trimmed(path)?,
            None => String::new(),
        };
        let summary_prompt = match prompt_files.summary_prompt_file.as_deref() {
            Some(path) => read_trimmed(path)?,
            None => prompts::SUMMARY_PROMPT.to_string(),
        };

        Ok(Self {
            pdf_dir: paths.pdf_dir.map(PathBuf::from).unwrap_or(defaults.pdf_dir),
            reference_file: paths
                .reference_file
                .map(PathBuf::from)
                .unwrap_or(defaults.reference_file),
            mapping_file: paths
                .mapping_file
                .map(PathBuf::from)
                .unwrap_or(defaults.mapping_file),
            store_file: paths
                .store_file
                .map(PathBuf::from)
                .unwrap_or(defaults.store_file),
            num_workers: concurrency.num_workers.unwrap_or(defaults.num_workers),
            llm_timeout_secs: concurrency
                .llm_timeout_secs
                .unwrap_or(defaults.llm_timeout_secs),
            draft_timeout_secs: concurrency
                .draft_timeout_secs
                .unwrap_or(defaults.draft_timeout_secs),
            max_retries: concurrency.max_retries.unwrap_or(defaults.max_retries),
            summary_prompt,
            research_theme,
            refresh_mapping: false,
        })
    }

    /// The per-document prompt: summary template plus the run's research
    /// theme (fixed for the whole run).
    pub fn document_prompt(&self) -> String {
        if self.research_theme.trim().is_empty() {
            self.summary_prompt.clone()
        } else {
            format!(
                "{}\n\nResearch theme:\n{}",
                self.summary_prompt,
                self.research_theme.trim()
            )
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no PDF documents found in {}", .0.display())]
    EmptyPdfDir(PathBuf),
    #[error("reference file missing or empty: {}", .0.display())]
    EmptyReferences(PathBuf),
    #[error("cannot build reference map: {0}")]
    Align(String),
    #[error("no successful summaries to assemble")]
    NoSummaries,
    #[error("draft generation failed: {0}")]
    Draft(String),
}

/// Shared HTTP client with the pool settings used across the pipeline.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
