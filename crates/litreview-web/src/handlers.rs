use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use litreview_core::config_file;
use litreview_core::{PipelineConfig, ProgressState, ResultStore, run_pipeline};

use crate::backend::build_backend;
use crate::state::{AppState, LastRun};

/// Kick off a pipeline run in the background. One run at a time.
pub async fn start_run(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.running.swap(true, Ordering::SeqCst) {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "status": "busy", "message": "a run is already in progress" })),
        );
    }

    let (config, backend) = match prepare() {
        Ok(pair) => pair,
        Err(e) => {
            state.running.store(false, Ordering::SeqCst);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            );
        }
    };

    let task_state = state.clone();
    tokio::spawn(async move {
        let result = run_pipeline(&config, backend, task_state.reporter.clone()).await;
        let last = match result {
            Ok(report) => LastRun {
                ok: true,
                report: Some(report),
                error: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "pipeline run failed");
                task_state
                    .reporter
                    .update(0, 0, format!("error: {e}"));
                LastRun {
                    ok: false,
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        };
        *task_state.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(last);
        task_state.running.store(false, Ordering::SeqCst);
    });

    (StatusCode::ACCEPTED, Json(json!({ "status": "started" })))
}

/// Poll interface: the current progress snapshot.
pub async fn progress(State(state): State<Arc<AppState>>) -> Json<ProgressState> {
    Json(state.reporter.snapshot())
}

/// Push interface: SSE stream of progress updates. A slow or disconnected
/// client is dropped by the reporter without stalling the workers.
pub async fn progress_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = state.reporter.subscribe();
    let stream = ReceiverStream::new(rx).map(|progress| {
        Ok::<_, Infallible>(
            Event::default()
                .event("progress")
                .json_data(&progress)
                .unwrap_or_default(),
        )
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// All successful summaries currently in the durable store.
pub async fn results(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = match PipelineConfig::from_config_file(&config_file::load_config()) {
        Ok(config) => config,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response();
        }
    };
    let (_, outcomes) = ResultStore::new(config.store_file).load_existing();
    Json(outcomes).into_response()
}

/// Whether a run is active, plus the outcome of the last one.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let last = state.last.lock().unwrap_or_else(|e| e.into_inner()).clone();
    Json(json!({
        "running": state.running.load(Ordering::SeqCst),
        "last": last,
    }))
}

fn prepare() -> anyhow::Result<(PipelineConfig, Arc<dyn litreview_llm::LlmBackend>)> {
    let file = config_file::load_config();
    let config = PipelineConfig::from_config_file(&file)?;
    let backend = build_backend(&file)?;
    Ok((config, backend))
}
