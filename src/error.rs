//! Error types for imagegen-daemon.
//!
//! Defines all error codes and types used throughout the worker and client
//! for consistent error handling and reporting.

use std::fmt;

/// Error codes returned by the worker and client in error responses.
///
/// These codes appear in error payloads and allow callers to
/// programmatically distinguish retryable from non-retryable conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Invalid or missing required request field.
    /// Trigger: Empty prompt, zero dimensions, non-finite weights.
    InvalidConfig,

    /// The synthesis engine failed during a stage.
    /// Trigger: Resource exhaustion or invalid engine parameters.
    SynthesisFailed,

    /// An image payload could not be encoded or decoded.
    /// Trigger: Corrupt base64 or malformed PNG data.
    ImageCodec,

    /// A network round-trip failed.
    /// Trigger: Connection refused, DNS failure, request deadline.
    Transport,

    /// The server sent a response the protocol does not allow.
    /// Trigger: Unrecognized job status, malformed response body.
    Protocol,

    /// The client-side polling budget was exhausted.
    /// Trigger: Job not terminal after the maximum attempt count.
    Timeout,

    /// The worker declared the job failed.
    /// Trigger: Terminal FAILED status or an error payload from the worker.
    JobFailed,

    /// Required endpoint credentials are not configured.
    /// Trigger: IMAGEGEN_ENDPOINT_URL or IMAGEGEN_API_KEY unset at startup.
    MissingCredentials,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::SynthesisFailed => "SYNTHESIS_FAILED",
            ErrorCode::ImageCodec => "IMAGE_CODEC_FAILED",
            ErrorCode::Transport => "TRANSPORT_ERROR",
            ErrorCode::Protocol => "PROTOCOL_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::JobFailed => "JOB_FAILED",
            ErrorCode::MissingCredentials => "MISSING_CREDENTIALS",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "Invalid or missing required request field",
            ErrorCode::SynthesisFailed => "The synthesis engine failed during a stage",
            ErrorCode::ImageCodec => "An image payload could not be encoded or decoded",
            ErrorCode::Transport => "A network round-trip failed",
            ErrorCode::Protocol => "The server sent a response the protocol does not allow",
            ErrorCode::Timeout => "Polling attempt budget exhausted before a terminal status",
            ErrorCode::JobFailed => "The worker declared the job failed",
            ErrorCode::MissingCredentials => "Required endpoint credentials are not configured",
        }
    }

    /// Returns true if a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::Transport | ErrorCode::Timeout)
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => {
                "Check the request fields: prompt must be non-empty, width/height positive, \
                 and all strengths and weights finite"
            }
            ErrorCode::SynthesisFailed => {
                "Retry with fewer steps or a smaller resolution; if the failure persists \
                 the worker engine may need a restart"
            }
            ErrorCode::ImageCodec => {
                "Verify the payload is standard base64 of a valid PNG image"
            }
            ErrorCode::Transport => {
                "Check network connectivity and the endpoint URL; transient failures \
                 are safe to retry"
            }
            ErrorCode::Protocol => {
                "The worker and client disagree on the protocol; check that both run \
                 compatible versions"
            }
            ErrorCode::Timeout => {
                "The job may still complete server-side; poll the status endpoint with \
                 the job id, or raise IMAGEGEN_POLL_MAX_ATTEMPTS"
            }
            ErrorCode::JobFailed => {
                "Inspect the error message from the worker; bad prompts and invalid \
                 parameters are not retryable"
            }
            ErrorCode::MissingCredentials => {
                "Set IMAGEGEN_ENDPOINT_URL and IMAGEGEN_API_KEY in the environment \
                 before starting the client"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for worker and client operations.
#[derive(Debug)]
pub struct DaemonError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DaemonError {
    /// Creates a new DaemonError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new DaemonError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an INVALID_CONFIG error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidConfig,
            format!("Invalid request: {}", reason.into()),
        )
    }

    /// Creates an INVALID_CONFIG error for empty prompts.
    pub fn empty_prompt() -> Self {
        Self::new(ErrorCode::InvalidConfig, "Prompt cannot be empty")
    }

    /// Creates a SYNTHESIS_FAILED error.
    pub fn synthesis_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::SynthesisFailed,
            format!("Synthesis failed: {}", reason.into()),
        )
    }

    /// Creates an IMAGE_CODEC_FAILED error.
    pub fn image_codec(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ImageCodec,
            format!("Image codec failure: {}", reason.into()),
        )
    }

    /// Creates a TRANSPORT_ERROR.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Transport,
            format!("Transport failure: {}", reason.into()),
        )
    }

    /// Creates a PROTOCOL_ERROR.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Protocol,
            format!("Protocol violation: {}", reason.into()),
        )
    }

    /// Creates a TIMEOUT error after the given attempt count.
    pub fn timeout(attempts: u32) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Gave up after {} status checks without a terminal state", attempts),
        )
    }

    /// Creates a JOB_FAILED error carrying the worker's message.
    pub fn job_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::JobFailed,
            format!("Worker reported failure: {}", reason.into()),
        )
    }

    /// Creates a MISSING_CREDENTIALS error for the given variable name.
    pub fn missing_credentials(var: &str) -> Self {
        Self::new(
            ErrorCode::MissingCredentials,
            format!("Environment variable {} is not set", var),
        )
    }
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for DaemonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using DaemonError.
pub type Result<T> = std::result::Result<T, DaemonError>;
