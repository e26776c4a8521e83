//! Serial job processor.
//!
//! One background thread owns the engine and drains a channel of queued
//! jobs. Serial execution is what makes the engine-state contract workable:
//! exactly one job touches the engine at a time, and the orchestrator
//! restores the baseline between jobs.

use std::sync::mpsc;
use std::thread;

use crate::codec;
use crate::engine::SynthesisEngine;
use crate::error::{DaemonError, Result};
use crate::pipeline;
use crate::types::job::GenerationResult;
use crate::types::request::GenerationConfig;
use crate::worker::table::JobTable;

struct WorkItem {
    job_id: String,
    config: GenerationConfig,
    warnings: Vec<String>,
}

/// Handle to the processing thread.
pub struct JobProcessor {
    sender: Option<mpsc::Sender<WorkItem>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl JobProcessor {
    /// Starts the processing thread, which takes ownership of the engine.
    pub fn start(mut engine: Box<dyn SynthesisEngine>, table: JobTable) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkItem>();

        let handle = thread::spawn(move || {
            for item in receiver {
                process_item(engine.as_mut(), &table, item);
            }
        });

        Self {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Queues a job for processing. The job must already be in the table.
    pub fn enqueue(
        &self,
        job_id: impl Into<String>,
        config: GenerationConfig,
        warnings: Vec<String>,
    ) -> Result<()> {
        let item = WorkItem {
            job_id: job_id.into(),
            config,
            warnings,
        };
        match &self.sender {
            Some(sender) => sender.send(item).map_err(|_| {
                DaemonError::synthesis_failed("processing thread is no longer running")
            }),
            None => Err(DaemonError::synthesis_failed(
                "processor has been shut down",
            )),
        }
    }

    /// Drains the queue and stops the thread.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for JobProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn process_item(engine: &mut dyn SynthesisEngine, table: &JobTable, item: WorkItem) {
    table.set_running(&item.job_id);
    eprintln!(
        "[imagegen] Job {} started: \"{}\" {}x{}",
        item.job_id, item.config.prompt, item.config.width, item.config.height
    );
    for warning in &item.warnings {
        eprintln!("[imagegen] Job {}: {}", item.job_id, warning);
    }

    match generate(engine, &item.config) {
        Ok((result, warnings)) => {
            for warning in &warnings {
                eprintln!("[imagegen] Job {}: {}", item.job_id, warning);
            }
            eprintln!("[imagegen] Job {} completed", item.job_id);
            table.set_completed(&item.job_id, result);
        }
        Err(e) => {
            eprintln!("[imagegen] Job {} failed: {}", item.job_id, e);
            table.set_failed(&item.job_id, e.message);
        }
    }
}

/// Runs one generation on the engine and packages the result payload.
pub fn generate(
    engine: &mut dyn SynthesisEngine,
    config: &GenerationConfig,
) -> Result<(GenerationResult, Vec<String>)> {
    let caps = engine.capabilities();
    let plan = pipeline::compose(config, &caps)?;
    let (image, warnings) = pipeline::run(engine, &plan)?;
    let payload = codec::encode_image(&image)?;

    let result = GenerationResult {
        image: payload,
        prompt: config.prompt.clone(),
        seed: config.seed,
        steps: config.steps,
        width: image.width(),
        height: image.height(),
    };
    Ok((result, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineState, ProceduralEngine, SynthesisEngine};
    use crate::types::job::{Job, JobStatus};
    use std::time::{Duration, Instant};

    fn small_config() -> GenerationConfig {
        let mut config = GenerationConfig::new("a quiet harbor");
        config.steps = 2;
        config
    }

    fn wait_terminal(table: &JobTable, id: &str) -> Job {
        let deadline = Instant::now() + Duration::from_secs(30);
        while Instant::now() < deadline {
            if table.is_terminal(id) {
                return table.get(id).unwrap();
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("job {} never reached a terminal state", id);
    }

    #[test]
    fn processes_job_to_completion() {
        let table = JobTable::new();
        let processor = JobProcessor::start(Box::new(ProceduralEngine::new()), table.clone());

        let job = Job::new();
        let id = job.id.clone();
        table.insert(job);
        processor
            .enqueue(id.clone(), small_config(), Vec::new())
            .unwrap();

        let done = wait_terminal(&table, &id);
        assert_eq!(done.status, JobStatus::Completed);
        let result = done.result.unwrap();
        assert_eq!(result.prompt, "a quiet harbor");
        assert_eq!(result.width, 1024);
        assert!(!result.image.is_empty());
    }

    #[test]
    fn invalid_config_fails_the_job() {
        let table = JobTable::new();
        let processor = JobProcessor::start(Box::new(ProceduralEngine::new()), table.clone());

        let job = Job::new();
        let id = job.id.clone();
        table.insert(job);

        let mut config = small_config();
        config.steps = 0;
        processor.enqueue(id.clone(), config, Vec::new()).unwrap();

        let done = wait_terminal(&table, &id);
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("steps"));
    }

    #[test]
    fn jobs_run_serially_in_order() {
        let table = JobTable::new();
        let processor = JobProcessor::start(Box::new(ProceduralEngine::new()), table.clone());

        let mut ids = Vec::new();
        for _ in 0..3 {
            let job = Job::new();
            ids.push(job.id.clone());
            table.insert(job);
        }
        for id in &ids {
            processor
                .enqueue(id.clone(), small_config(), Vec::new())
                .unwrap();
        }

        for id in &ids {
            let done = wait_terminal(&table, id);
            assert_eq!(done.status, JobStatus::Completed);
        }
    }

    #[test]
    fn enqueue_after_shutdown_errors() {
        let table = JobTable::new();
        let mut processor = JobProcessor::start(Box::new(ProceduralEngine::new()), table);
        processor.shutdown();
        assert!(processor
            .enqueue("job", small_config(), Vec::new())
            .is_err());
    }

    #[test]
    fn generate_leaves_engine_at_baseline() {
        let mut engine = ProceduralEngine::new();
        let (result, warnings) = generate(&mut engine, &small_config()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!((result.width, result.height), (1024, 1024));
        assert_eq!(engine.state(), EngineState::baseline());
    }
}
