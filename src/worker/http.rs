//! HTTP surface of the worker.
//!
//! Four routes: POST /runsync (submit and wait), POST /run (submit and
//! return), GET /status/{id}, GET /health. Request-level failures are
//! reported as HTTP 200 with an `error` body so callers handle exactly one
//! response shape; non-200 responses are reserved for transport-level
//! problems.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use crate::config::WorkerConfig;
use crate::engine::SynthesisEngine;
use crate::error::{DaemonError, Result};
use crate::types::job::Job;
use crate::types::wire::{StatusResponse, SubmitRequest};
use crate::worker::processor::JobProcessor;
use crate::worker::table::JobTable;

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    table: JobTable,
    processor: Arc<JobProcessor>,
    engine_version: String,
    sync_wait: Duration,
    sync_poll_interval: Duration,
}

impl AppState {
    /// Builds the state and starts the processing thread, which takes
    /// ownership of the engine.
    pub fn new(engine: Box<dyn SynthesisEngine>, config: &WorkerConfig) -> Self {
        let engine_version = engine.version().to_string();
        let table = JobTable::new();
        let processor = Arc::new(JobProcessor::start(engine, table.clone()));
        Self {
            table,
            processor,
            engine_version,
            sync_wait: config.sync_wait,
            sync_poll_interval: config.sync_poll_interval,
        }
    }
}

/// Builds the worker router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/runsync", post(runsync))
        .route("/run", post(run))
        .route("/status/{id}", get(status))
        .route("/health", get(health))
        .with_state(state)
}

/// Binds and serves until the process is stopped.
pub async fn serve(state: AppState, bind_addr: &str) -> Result<()> {
    let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
        DaemonError::with_source(
            crate::error::ErrorCode::Transport,
            format!("Failed to bind {}", bind_addr),
            e,
        )
    })?;
    eprintln!("[imagegen] Worker listening on {}", bind_addr);

    axum::serve(listener, router(state)).await.map_err(|e| {
        DaemonError::with_source(crate::error::ErrorCode::Transport, "Server error", e)
    })
}

async fn runsync(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SubmitRequest>, JsonRejection>,
) -> Json<StatusResponse> {
    match payload {
        Ok(Json(req)) => Json(handle_runsync(&state, req).await),
        Err(rejection) => Json(reject_malformed(rejection)),
    }
}

async fn run(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SubmitRequest>, JsonRejection>,
) -> Json<StatusResponse> {
    match payload {
        Ok(Json(req)) => Json(handle_run(&state, req)),
        Err(rejection) => Json(reject_malformed(rejection)),
    }
}

/// Bodies that fail extraction still get the one response shape: HTTP 200
/// with an `error` key, never a framework-generated error status.
fn reject_malformed(rejection: JsonRejection) -> StatusResponse {
    StatusResponse::rejection(format!("malformed request body: {}", rejection.body_text()))
}

async fn status(State(state): State<AppState>, Path(id): Path<String>) -> Json<StatusResponse> {
    Json(handle_status(&state, &id))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(handle_health(&state))
}

/// Submits and blocks until the job is terminal or the wait budget runs
/// out; a still-pending response hands the caller the id to poll.
pub async fn handle_runsync(state: &AppState, req: SubmitRequest) -> StatusResponse {
    let id = match submit(state, req) {
        Ok(id) => id,
        Err(e) => return StatusResponse::rejection(e.message),
    };

    let deadline = tokio::time::Instant::now() + state.sync_wait;
    loop {
        match state.table.get(&id) {
            Some(job) if job.status.is_terminal() => return StatusResponse::from_job(&job),
            Some(job) => {
                if tokio::time::Instant::now() >= deadline {
                    return StatusResponse::from_job(&job);
                }
            }
            None => return StatusResponse::rejection(format!("no such job: {}", id)),
        }
        tokio::time::sleep(state.sync_poll_interval).await;
    }
}

/// Submits and returns immediately with the queued job's id.
pub fn handle_run(state: &AppState, req: SubmitRequest) -> StatusResponse {
    match submit(state, req) {
        Ok(id) => match state.table.get(&id) {
            Some(job) => StatusResponse::from_job(&job),
            None => StatusResponse::rejection(format!("no such job: {}", id)),
        },
        Err(e) => StatusResponse::rejection(e.message),
    }
}

/// Reports the current state of one job.
pub fn handle_status(state: &AppState, id: &str) -> StatusResponse {
    match state.table.get(id) {
        Some(job) => StatusResponse::from_job(&job),
        None => StatusResponse::rejection(format!("no such job: {}", id)),
    }
}

pub fn handle_health(state: &AppState) -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.engine_version,
        "jobs": state.table.len(),
    })
}

/// Validates the request, registers the job, and queues it for processing.
fn submit(state: &AppState, req: SubmitRequest) -> Result<String> {
    let (config, warnings) = req.input.into_config()?;

    let job = Job::new();
    let id = job.id.clone();
    state.table.insert(job);
    state.processor.enqueue(id.clone(), config, warnings)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ProceduralEngine;
    use crate::types::wire::RequestInput;

    fn test_state() -> AppState {
        let config = WorkerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            sync_wait: Duration::from_secs(30),
            sync_poll_interval: Duration::from_millis(5),
        };
        AppState::new(Box::new(ProceduralEngine::new()), &config)
    }

    fn request(prompt: &str) -> SubmitRequest {
        let mut input = RequestInput::new(prompt);
        input.steps = 2;
        SubmitRequest { input }
    }

    #[tokio::test]
    async fn runsync_returns_completed_result() {
        let state = test_state();
        let resp = handle_runsync(&state, request("a red fox")).await;

        assert_eq!(resp.status.as_deref(), Some("COMPLETED"));
        assert!(resp.error.is_none());
        let output = resp.output.unwrap();
        assert_eq!(output.prompt, "a red fox");
        assert_eq!((output.width, output.height), (1024, 1024));
        assert!(!output.image.is_empty());
    }

    #[tokio::test]
    async fn runsync_rejects_empty_prompt_with_error_body() {
        let state = test_state();
        let resp = handle_runsync(&state, request("")).await;

        assert!(resp.error.is_some());
        assert!(resp.status.is_none());
        assert!(resp.output.is_none());
    }

    #[tokio::test]
    async fn runsync_input_without_prompt_yields_error_body() {
        let state = test_state();
        let req: SubmitRequest = serde_json::from_str(r#"{"input": {}}"#).unwrap();
        let resp = handle_runsync(&state, req).await;

        assert!(resp.error.unwrap().contains("Prompt"));
        assert!(resp.status.is_none());
        assert!(state.table.is_empty());
    }

    #[tokio::test]
    async fn run_returns_queued_job_id() {
        let state = test_state();
        let resp = handle_run(&state, request("a red fox"));

        let id = resp.id.expect("submission must carry a job id");
        assert!(resp.error.is_none());
        // Already IN_QUEUE, IN_PROGRESS, or even COMPLETED if the processor
        // was quick; the id must resolve either way.
        assert!(resp.status.is_some());
        assert!(state.table.get(&id).is_some());
    }

    #[tokio::test]
    async fn status_of_unknown_job_is_error_body() {
        let state = test_state();
        let resp = handle_status(&state, "no-such-id");
        assert!(resp.error.unwrap().contains("no-such-id"));
        assert!(resp.status.is_none());
    }

    #[tokio::test]
    async fn submitted_job_reaches_completed_via_status() {
        let state = test_state();
        let resp = handle_run(&state, request("a red fox"));
        let id = resp.id.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        loop {
            let resp = handle_status(&state, &id);
            match resp.status.as_deref() {
                Some("COMPLETED") => {
                    assert!(resp.output.is_some());
                    break;
                }
                Some("FAILED") => panic!("job failed: {:?}", resp.error),
                _ => {
                    assert!(tokio::time::Instant::now() < deadline, "job never finished");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    #[tokio::test]
    async fn health_reports_engine_and_job_count() {
        let state = test_state();
        let body = handle_health(&state);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["engine"], "procedural-1");
        assert_eq!(body["jobs"], 0);

        handle_run(&state, request("a red fox"));
        assert_eq!(handle_health(&state)["jobs"], 1);
    }
}
