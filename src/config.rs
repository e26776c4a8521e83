//! Runtime configuration from environment variables.
//!
//! All knobs live under the IMAGEGEN_ prefix. Malformed optional values fall
//! back to their defaults with a warning on stderr; missing credentials are
//! fatal for the remote client because nothing sensible can be done without
//! them.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DaemonError, Result};

/// Default address the worker listens on.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8188";
/// Default upper bound a synchronous submit blocks for, in seconds.
pub const DEFAULT_SYNC_WAIT_SECS: u64 = 60;
/// Default interval between job-table checks while a submit blocks.
pub const DEFAULT_SYNC_POLL_MILLIS: u64 = 100;

/// Default whole-request timeout for a remote synchronous submit.
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 600;
/// Default delay between remote status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Default number of status polls before giving up.
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 120;

/// Worker-side configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// How long a synchronous submit waits for the job to finish.
    pub sync_wait: Duration,
    /// How often the blocked submit re-checks the job table.
    pub sync_poll_interval: Duration,
}

impl WorkerConfig {
    /// Loads worker configuration from IMAGEGEN_* environment variables,
    /// falling back to defaults for anything unset or malformed.
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("IMAGEGEN_BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            sync_wait: Duration::from_secs(parse_env_or(
                "IMAGEGEN_SYNC_WAIT_SECS",
                DEFAULT_SYNC_WAIT_SECS,
            )),
            sync_poll_interval: Duration::from_millis(DEFAULT_SYNC_POLL_MILLIS),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            sync_wait: Duration::from_secs(DEFAULT_SYNC_WAIT_SECS),
            sync_poll_interval: Duration::from_millis(DEFAULT_SYNC_POLL_MILLIS),
        }
    }
}

/// Remote-client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the worker endpoint, without a trailing slash.
    pub endpoint_url: String,
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Whole-request timeout for the synchronous submit.
    pub submit_timeout: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Number of status polls before the client gives up.
    pub poll_max_attempts: u32,
}

impl ClientConfig {
    /// Loads client configuration from IMAGEGEN_* environment variables.
    ///
    /// IMAGEGEN_ENDPOINT_URL and IMAGEGEN_API_KEY are required; everything
    /// else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let endpoint_url = env::var("IMAGEGEN_ENDPOINT_URL")
            .map_err(|_| DaemonError::missing_credentials("IMAGEGEN_ENDPOINT_URL"))?;
        let api_key = env::var("IMAGEGEN_API_KEY")
            .map_err(|_| DaemonError::missing_credentials("IMAGEGEN_API_KEY"))?;

        Ok(Self {
            endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
            api_key,
            submit_timeout: Duration::from_secs(parse_env_or(
                "IMAGEGEN_SUBMIT_TIMEOUT_SECS",
                DEFAULT_SUBMIT_TIMEOUT_SECS,
            )),
            poll_interval: Duration::from_secs(parse_env_or(
                "IMAGEGEN_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )),
            poll_max_attempts: parse_env_or(
                "IMAGEGEN_POLL_MAX_ATTEMPTS",
                DEFAULT_POLL_MAX_ATTEMPTS,
            ),
        })
    }

    /// Builds a config for a known endpoint, defaults elsewhere.
    pub fn for_endpoint(endpoint_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            submit_timeout: Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

/// Parses an environment variable, warning and falling back on bad values.
fn parse_env_or<T: FromStr + std::fmt::Display>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                eprintln!(
                    "[imagegen] Warning: {} has invalid value '{}', using {}",
                    var, raw, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_or_uses_default_when_unset() {
        assert_eq!(parse_env_or("IMAGEGEN_TEST_UNSET_VAR", 42u32), 42);
    }

    #[test]
    fn parse_env_or_reads_valid_value() {
        env::set_var("IMAGEGEN_TEST_VALID_VAR", "7");
        assert_eq!(parse_env_or("IMAGEGEN_TEST_VALID_VAR", 42u32), 7);
        env::remove_var("IMAGEGEN_TEST_VALID_VAR");
    }

    #[test]
    fn parse_env_or_falls_back_on_garbage() {
        env::set_var("IMAGEGEN_TEST_GARBAGE_VAR", "not-a-number");
        assert_eq!(parse_env_or("IMAGEGEN_TEST_GARBAGE_VAR", 42u32), 42);
        env::remove_var("IMAGEGEN_TEST_GARBAGE_VAR");
    }

    #[test]
    fn for_endpoint_strips_trailing_slash() {
        let config = ClientConfig::for_endpoint("https://worker.example/v2/abc/", "key");
        assert_eq!(config.endpoint_url, "https://worker.example/v2/abc");
        assert_eq!(config.poll_max_attempts, DEFAULT_POLL_MAX_ATTEMPTS);
    }

    #[test]
    fn worker_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.sync_wait, Duration::from_secs(60));
    }
}
