//! Core data types: generation requests, jobs, and wire shapes.

pub mod job;
pub mod request;
pub mod wire;

pub use job::{GenerationResult, Job, JobStatus};
pub use request::{
    AdapterSpec, GenerationConfig, SchedulerKind, CANONICAL_HEIGHT, CANONICAL_WIDTH,
    DEFAULT_SCHEDULER,
};
pub use wire::{LoraEntry, RequestInput, StatusResponse, SubmitRequest};
