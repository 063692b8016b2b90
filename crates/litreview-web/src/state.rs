use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use litreview_core::{ProgressReporter, RunReport};
use serde::Serialize;

/// Outcome of the most recent pipeline run, kept for `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub reporter: Arc<ProgressReporter>,
    /// One pipeline run at a time; concurrent start requests get 409.
    pub running: AtomicBool,
    pub last: Mutex<Option<LastRun>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            reporter: Arc::new(ProgressReporter::new()),
            running: AtomicBool::new(false),
            last: Mutex::new(None),
        }
    }
}
