//! Wire shapes for the submission and status protocol.
//!
//! The submission body nests all generation parameters under an `input` key.
//! Status responses carry a free-form status string that is mapped through
//! the closed [`JobStatus`](super::JobStatus) set by the client.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::Result;
use crate::types::job::{GenerationResult, Job, JobStatus};
use crate::types::request::{
    AdapterSpec, GenerationConfig, SchedulerKind, CANONICAL_HEIGHT, CANONICAL_WIDTH,
    DEFAULT_ADAPTER_MIX_SCALE, DEFAULT_CONDITIONING_STRENGTH, DEFAULT_GUIDANCE_SCALE,
    DEFAULT_NEGATIVE_PROMPT, DEFAULT_STEPS,
};

/// Submission request body: `{"input": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub input: RequestInput,
}

/// A single adapter entry on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraEntry {
    pub path: String,
    pub name: String,
    pub weight: f32,
}

/// Generation parameters as submitted by the caller.
///
/// Every field except `prompt` carries a server-side default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInput {
    /// Defaults to empty when the key is absent; validation then rejects it
    /// with the empty-prompt error body rather than a deserialization error.
    #[serde(default)]
    pub prompt: String,

    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,

    #[serde(default = "default_steps")]
    pub steps: u32,

    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,

    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Base64 PNG reference image for conditioning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,

    #[serde(default = "default_ip_adapter_scale")]
    pub ip_adapter_scale: f32,

    /// Scheduler name; unrecognized values fall through to the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loras: Option<Vec<LoraEntry>>,

    #[serde(default = "default_lora_scale")]
    pub lora_scale: f32,
}

fn default_negative_prompt() -> String {
    DEFAULT_NEGATIVE_PROMPT.to_string()
}

fn default_steps() -> u32 {
    DEFAULT_STEPS
}

fn default_guidance_scale() -> f32 {
    DEFAULT_GUIDANCE_SCALE
}

fn default_width() -> u32 {
    CANONICAL_WIDTH
}

fn default_height() -> u32 {
    CANONICAL_HEIGHT
}

fn default_ip_adapter_scale() -> f32 {
    DEFAULT_CONDITIONING_STRENGTH
}

fn default_lora_scale() -> f32 {
    DEFAULT_ADAPTER_MIX_SCALE
}

impl RequestInput {
    /// Creates an input with the given prompt and all defaults.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: default_negative_prompt(),
            steps: default_steps(),
            guidance_scale: default_guidance_scale(),
            seed: None,
            width: default_width(),
            height: default_height(),
            reference_image: None,
            ip_adapter_scale: default_ip_adapter_scale(),
            scheduler: None,
            loras: None,
            lora_scale: default_lora_scale(),
        }
    }

    /// Converts the wire input into a validated [`GenerationConfig`].
    ///
    /// A reference image that fails to decode is dropped with a warning
    /// rather than failing the job; validation errors (empty prompt, bad
    /// dimensions) are fatal. Unrecognized scheduler names pass through to
    /// the default scheduler by design.
    pub fn into_config(self) -> Result<(GenerationConfig, Vec<String>)> {
        let mut warnings = Vec::new();

        let conditioning_image = match self.reference_image {
            Some(payload) => match codec::decode_image(&payload) {
                Ok(image) => Some(image),
                Err(e) => {
                    warnings.push(format!(
                        "failed to decode reference image, continuing without it: {}",
                        e.message
                    ));
                    None
                }
            },
            None => None,
        };

        let scheduler_override = self.scheduler.as_deref().and_then(SchedulerKind::parse);

        let adapters = self
            .loras
            .unwrap_or_default()
            .into_iter()
            .map(|entry| AdapterSpec {
                source: entry.path,
                name: entry.name,
                weight: entry.weight,
            })
            .collect();

        let config = GenerationConfig {
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            steps: self.steps,
            guidance_scale: self.guidance_scale,
            width: self.width,
            height: self.height,
            seed: self.seed,
            conditioning_image,
            conditioning_strength: self.ip_adapter_scale,
            adapters,
            adapter_mix_scale: self.lora_scale,
            scheduler_override,
        };

        config.validate()?;
        Ok((config, warnings))
    }
}

/// Response body shared by the submission and status endpoints.
///
/// Validation failures come back as HTTP 200 with only the `error` key set,
/// so callers must check `error` regardless of HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<GenerationResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    /// Builds the wire view of a job's current state.
    pub fn from_job(job: &Job) -> Self {
        Self {
            status: Some(job.status.as_str().to_string()),
            id: Some(job.id.clone()),
            output: match job.status {
                JobStatus::Completed => job.result.clone(),
                _ => None,
            },
            error: match job.status {
                JobStatus::Failed => job.error.clone(),
                _ => None,
            },
        }
    }

    /// Builds a 200-with-error-body rejection, carrying no status or id.
    pub fn rejection(message: impl Into<String>) -> Self {
        Self {
            status: None,
            id: None,
            output: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn minimal_submission_fills_defaults() {
        let body = r#"{"input": {"prompt": "a red fox"}}"#;
        let req: SubmitRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.input.prompt, "a red fox");
        assert_eq!(req.input.steps, DEFAULT_STEPS);
        assert_eq!(req.input.guidance_scale, DEFAULT_GUIDANCE_SCALE);
        assert_eq!(req.input.width, CANONICAL_WIDTH);
        assert_eq!(req.input.height, CANONICAL_HEIGHT);
        assert_eq!(req.input.negative_prompt, DEFAULT_NEGATIVE_PROMPT);
        assert!(req.input.seed.is_none());
    }

    #[test]
    fn into_config_maps_loras_to_adapters() {
        let mut input = RequestInput::new("test");
        input.loras = Some(vec![LoraEntry {
            path: "styles/ink.safetensors".to_string(),
            name: "ink".to_string(),
            weight: 0.8,
        }]);
        input.lora_scale = 0.5;

        let (config, warnings) = input.into_config().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.adapters.len(), 1);
        assert_eq!(config.adapters[0].name, "ink");
        assert_eq!(config.adapters[0].source, "styles/ink.safetensors");
        assert_eq!(config.adapter_mix_scale, 0.5);
    }

    #[test]
    fn missing_prompt_key_still_deserializes() {
        let body = r#"{"input": {}}"#;
        let req: SubmitRequest = serde_json::from_str(body).unwrap();
        assert!(req.input.prompt.is_empty());

        // The rejection happens at validation, as an error body, not as a
        // malformed-request transport failure.
        let err = req.input.into_config().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[test]
    fn into_config_rejects_empty_prompt() {
        let input = RequestInput::new("");
        let err = input.into_config().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[test]
    fn bad_reference_image_degrades_with_warning() {
        let mut input = RequestInput::new("test");
        input.reference_image = Some("not a valid payload".to_string());

        let (config, warnings) = input.into_config().unwrap();
        assert!(config.conditioning_image.is_none());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("reference image"));
    }

    #[test]
    fn unrecognized_scheduler_is_ignored() {
        let mut input = RequestInput::new("test");
        input.scheduler = Some("quantum_leap".to_string());

        let (config, warnings) = input.into_config().unwrap();
        assert!(config.scheduler_override.is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn recognized_scheduler_is_applied() {
        let mut input = RequestInput::new("test");
        input.scheduler = Some("ddim".to_string());

        let (config, _) = input.into_config().unwrap();
        assert_eq!(config.scheduler_override, Some(SchedulerKind::Ddim));
    }

    #[test]
    fn status_response_from_completed_job() {
        let mut job = Job::new();
        job.set_completed(GenerationResult {
            image: "aGk=".to_string(),
            prompt: "test".to_string(),
            seed: None,
            steps: 30,
            width: 1024,
            height: 1024,
        });

        let resp = StatusResponse::from_job(&job);
        assert_eq!(resp.status.as_deref(), Some("COMPLETED"));
        assert_eq!(resp.id.as_deref(), Some(job.id.as_str()));
        assert!(resp.output.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn rejection_has_only_error_key() {
        let resp = StatusResponse::rejection("Prompt cannot be empty");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"], "Prompt cannot be empty");
        assert!(json.get("status").is_none());
        assert!(json.get("output").is_none());
    }
}
