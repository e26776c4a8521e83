//! imagegen-daemon: image synthesis worker and polling client.
//!
//! The worker exposes a small HTTP protocol (submit, status, health) over a
//! serial processing thread that owns the synthesis engine. The client
//! submits requests to such an endpoint and polls until the job reaches a
//! terminal state. A deterministic procedural engine backs local generation
//! and tests.

pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod worker;

pub use error::{DaemonError, ErrorCode, Result};
