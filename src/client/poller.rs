//! Status polling: the closed transition function and the retry loop.
//!
//! Every status payload, whether from the synchronous submit or a later
//! poll, goes through [`observe`]. The status set is closed: anything the
//! worker sends outside it is a protocol violation, reported immediately
//! rather than retried into a timeout.

use std::thread;
use std::time::Duration;

use crate::error::{DaemonError, Result};
use crate::types::job::{GenerationResult, JobStatus};
use crate::types::wire::StatusResponse;

/// What one status payload tells the client.
#[derive(Debug)]
pub enum Observation {
    /// The job is still queued or running; keep polling.
    Pending(JobStatus),
    /// The job finished; the result payload is attached.
    Completed(GenerationResult),
}

/// Classifies one status payload.
///
/// An `error` key anywhere means the worker rejected or failed the job.
/// A missing or unrecognized status, or a COMPLETED payload without an
/// output, is a protocol violation.
pub fn observe(resp: &StatusResponse) -> Result<Observation> {
    if let Some(message) = &resp.error {
        return Err(DaemonError::job_failed(message.clone()));
    }

    let raw = resp
        .status
        .as_deref()
        .ok_or_else(|| DaemonError::protocol("response carries neither status nor error"))?;

    let status = JobStatus::parse(raw)
        .ok_or_else(|| DaemonError::protocol(format!("unrecognized job status '{}'", raw)))?;

    match status {
        JobStatus::Queued | JobStatus::Running => Ok(Observation::Pending(status)),
        JobStatus::Completed => {
            let result = resp.output.clone().ok_or_else(|| {
                DaemonError::protocol("status is COMPLETED but no output is attached")
            })?;
            Ok(Observation::Completed(result))
        }
        JobStatus::Failed => Err(DaemonError::job_failed(
            "worker reported FAILED without a message",
        )),
    }
}

/// A source of status payloads for one job id.
pub trait StatusSource {
    fn fetch_status(&mut self, job_id: &str) -> Result<StatusResponse>;
}

/// Bounded polling loop over a [`StatusSource`].
pub struct JobPoller {
    interval: Duration,
    max_attempts: u32,
}

impl JobPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Polls until the job completes, fails, or the attempt budget runs out.
    ///
    /// Budget exhaustion is a TIMEOUT, distinct from JOB_FAILED: the job may
    /// still finish server-side.
    pub fn wait_for_result(
        &self,
        source: &mut dyn StatusSource,
        job_id: &str,
    ) -> Result<GenerationResult> {
        for attempt in 0..self.max_attempts {
            if attempt > 0 && !self.interval.is_zero() {
                thread::sleep(self.interval);
            }

            let resp = source.fetch_status(job_id)?;
            match observe(&resp)? {
                Observation::Completed(result) => return Ok(result),
                Observation::Pending(status) => {
                    eprintln!(
                        "[imagegen] Job {} is {}, attempt {}/{}",
                        job_id,
                        status,
                        attempt + 1,
                        self.max_attempts
                    );
                }
            }
        }

        Err(DaemonError::timeout(self.max_attempts))
    }
}
