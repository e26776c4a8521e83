//! Shared job table.
//!
//! The table is the only state shared between the HTTP handlers and the
//! processing thread. Handlers read snapshots; only the processor mutates
//! job state, and terminal states stick (see [`Job`]).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::types::job::{GenerationResult, Job};

/// Thread-safe map of job id to job state.
#[derive(Clone, Default)]
pub struct JobTable {
    inner: Arc<Mutex<HashMap<String, Job>>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new job under its id.
    pub fn insert(&self, job: Job) {
        self.lock().insert(job.id.clone(), job);
    }

    /// Returns a snapshot of the job, if it exists.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.lock().get(id).cloned()
    }

    /// Marks a job running.
    pub fn set_running(&self, id: &str) {
        if let Some(job) = self.lock().get_mut(id) {
            job.set_running();
        }
    }

    /// Marks a job completed with its result.
    pub fn set_completed(&self, id: &str, result: GenerationResult) {
        if let Some(job) = self.lock().get_mut(id) {
            job.set_completed(result);
        }
    }

    /// Marks a job failed with an error message.
    pub fn set_failed(&self, id: &str, error: impl Into<String>) {
        if let Some(job) = self.lock().get_mut(id) {
            job.set_failed(error);
        }
    }

    /// Number of jobs ever registered (the table is not pruned).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns true once the job is in a terminal state.
    pub fn is_terminal(&self, id: &str) -> bool {
        self.lock()
            .get(id)
            .map(|job| job.status.is_terminal())
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Job>> {
        // A poisoned lock means a panic elsewhere; the map itself is still
        // consistent because every mutation is a single method call.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
