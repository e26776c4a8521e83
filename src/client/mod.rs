//! Blocking HTTP client for a remote worker endpoint.
//!
//! Speaks the submit/status protocol: POST /runsync for a synchronous
//! generation, GET /status/{id} for polling when the worker hands back a
//! still-pending job. Every request carries the configured Bearer token.

pub mod poller;

pub use poller::{observe, JobPoller, Observation, StatusSource};

use crate::config::ClientConfig;
use crate::error::{DaemonError, Result};
use crate::types::job::GenerationResult;
use crate::types::wire::{RequestInput, StatusResponse, SubmitRequest};

/// Client for one worker endpoint.
pub struct JobClient {
    config: ClientConfig,
    http: reqwest::blocking::Client,
}

impl JobClient {
    /// Builds a client for the configured endpoint.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.submit_timeout)
            .build()
            .map_err(|e| DaemonError::with_source(
                crate::error::ErrorCode::Transport,
                "Failed to build HTTP client",
                e,
            ))?;
        Ok(Self { config, http })
    }

    /// Submits a request and blocks until the worker responds.
    ///
    /// The response may already be terminal, or still IN_QUEUE/IN_PROGRESS
    /// if the worker gave up waiting; the caller decides whether to poll.
    pub fn run_sync(&self, input: &RequestInput) -> Result<StatusResponse> {
        self.post("runsync", input)
    }

    /// Fetches the current status of a job.
    pub fn status(&self, job_id: &str) -> Result<StatusResponse> {
        let url = format!("{}/status/{}", self.config.endpoint_url, job_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .map_err(|e| {
                DaemonError::with_source(
                    crate::error::ErrorCode::Transport,
                    format!("Status request to {} failed", url),
                    e,
                )
            })?;
        parse_response(resp)
    }

    /// Runs one generation end to end: synchronous submit, then polling if
    /// the worker handed back a still-pending job.
    pub fn generate(&mut self, input: &RequestInput) -> Result<GenerationResult> {
        let resp = self.run_sync(input)?;

        match observe(&resp)? {
            Observation::Completed(result) => Ok(result),
            Observation::Pending(_) => {
                let job_id = resp.id.clone().ok_or_else(|| {
                    DaemonError::protocol("pending response carries no job id to poll")
                })?;
                let poller = JobPoller::new(
                    self.config.poll_interval,
                    self.config.poll_max_attempts,
                );
                poller.wait_for_result(self, &job_id)
            }
        }
    }

    fn post(&self, path: &str, input: &RequestInput) -> Result<StatusResponse> {
        let url = format!("{}/{}", self.config.endpoint_url, path);
        let body = SubmitRequest {
            input: input.clone(),
        };
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                DaemonError::with_source(
                    crate::error::ErrorCode::Transport,
                    format!("Submit to {} failed", url),
                    e,
                )
            })?;
        parse_response(resp)
    }
}

impl StatusSource for JobClient {
    fn fetch_status(&mut self, job_id: &str) -> Result<StatusResponse> {
        self.status(job_id)
    }
}

fn parse_response(resp: reqwest::blocking::Response) -> Result<StatusResponse> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(DaemonError::transport(format!(
            "endpoint returned HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )));
    }
    resp.json::<StatusResponse>().map_err(|e| {
        DaemonError::with_source(
            crate::error::ErrorCode::Protocol,
            "Response body is not a valid status payload",
            e,
        )
    })
}
