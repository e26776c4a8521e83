//! Job type for tracking generation requests on the worker.
//!
//! A Job is created on submission, mutated only by the worker processing it,
//! and becomes immutable once it reaches a terminal state.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Status of a generation job as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JobStatus {
    /// Accepted and waiting for the engine.
    #[default]
    #[serde(rename = "IN_QUEUE")]
    Queued,
    /// Actively generating.
    #[serde(rename = "IN_PROGRESS")]
    Running,
    /// Finished successfully; a result payload is present.
    #[serde(rename = "COMPLETED")]
    Completed,
    /// The worker declared the job failed; an error payload is present.
    #[serde(rename = "FAILED")]
    Failed,
}

impl JobStatus {
    /// Returns the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "IN_QUEUE",
            JobStatus::Running => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Parses a wire status string.
    ///
    /// Returns None for anything outside the closed status set; the polling
    /// client treats that as a protocol violation, never a silent retry.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_QUEUE" => Some(JobStatus::Queued),
            "IN_PROGRESS" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Returns true if no further transitions occur from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The payload of a completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Base64-encoded PNG of the synthesized image.
    pub image: String,
    /// Echoed prompt.
    pub prompt: String,
    /// Echoed seed, if the request was seeded.
    pub seed: Option<u64>,
    /// Echoed step count.
    pub steps: u32,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

/// A generation request tracked from submission through completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (UUID v4).
    pub id: String,

    /// Current job state.
    pub status: JobStatus,

    /// Result payload, present once Completed.
    pub result: Option<GenerationResult>,

    /// Error message, present once Failed.
    pub error: Option<String>,

    /// Submission time, seconds since the Unix epoch.
    pub created_at: u64,

    /// When generation started (None if never started).
    pub started_at: Option<u64>,

    /// When the job reached a terminal state.
    pub completed_at: Option<u64>,
}

impl Job {
    /// Creates a new queued job with a fresh id.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: epoch_secs(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Marks the job as running. No-op once terminal.
    pub fn set_running(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(epoch_secs());
    }

    /// Marks the job as completed with its result. No-op once terminal.
    pub fn set_completed(&mut self, result: GenerationResult) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(epoch_secs());
    }

    /// Marks the job as failed with an error message. No-op once terminal.
    pub fn set_failed(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(epoch_secs());
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

/// Current time as seconds since the Unix epoch.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> GenerationResult {
        GenerationResult {
            image: "aGk=".to_string(),
            prompt: "test".to_string(),
            seed: Some(42),
            steps: 30,
            width: 1024,
            height: 1024,
        }
    }

    #[test]
    fn status_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn status_wire_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_status_rejected() {
        assert_eq!(JobStatus::parse("CANCELLED"), None);
        assert_eq!(JobStatus::parse("in_queue"), None);
        assert_eq!(JobStatus::parse(""), None);
    }

    #[test]
    fn status_serializes_as_wire_string() {
        let json = serde_json::to_string(&JobStatus::Queued).unwrap();
        assert_eq!(json, "\"IN_QUEUE\"");
        let json = serde_json::to_string(&JobStatus::Running).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn job_lifecycle() {
        let mut job = Job::new();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.started_at.is_none());

        job.set_running();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());

        job.set_completed(sample_result());
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn terminal_jobs_never_resurrected() {
        let mut job = Job::new();
        job.set_failed("engine exploded");
        assert_eq!(job.status, JobStatus::Failed);

        job.set_running();
        assert_eq!(job.status, JobStatus::Failed);

        job.set_completed(sample_result());
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
    }

    #[test]
    fn job_ids_unique() {
        assert_ne!(Job::new().id, Job::new().id);
    }
}
