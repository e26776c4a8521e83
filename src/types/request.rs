//! GenerationConfig: the immutable description of one synthesis request.
//!
//! A GenerationConfig is built once per request (from the wire input on the
//! worker, or from CLI flags in local mode) and passed by value into the
//! pipeline. It is never mutated after validation.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};

/// Canonical base-stage resolution. Requests at any other size run the base
/// stage here and add a refinement stage to reach the target.
pub const CANONICAL_WIDTH: u32 = 1024;
/// Canonical base-stage height.
pub const CANONICAL_HEIGHT: u32 = 1024;

/// Default number of inference steps.
pub const DEFAULT_STEPS: u32 = 30;
/// Default classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f32 = 7.5;
/// Default influence of the conditioning image on the base stage.
pub const DEFAULT_CONDITIONING_STRENGTH: f32 = 0.6;
/// Default global multiplier applied across all active adapters.
pub const DEFAULT_ADAPTER_MIX_SCALE: f32 = 1.0;
/// Quality boilerplate used when the caller sends no negative prompt.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, blurry";

/// Sampling algorithm selection for the synthesis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Fast deterministic ODE solver; the engine baseline.
    #[default]
    Euler,
    /// Ancestral variant that injects noise each step.
    EulerAncestral,
    /// Second-order multistep solver, fewer steps for equal quality.
    DpmPlusPlus2m,
    /// Classic denoising diffusion implicit sampler.
    Ddim,
}

/// Scheduler the engine starts with and is restored to after every job.
pub const DEFAULT_SCHEDULER: SchedulerKind = SchedulerKind::Euler;

impl SchedulerKind {
    /// Returns the string representation of the scheduler.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Euler => "euler",
            SchedulerKind::EulerAncestral => "euler_ancestral",
            SchedulerKind::DpmPlusPlus2m => "dpmpp_2m",
            SchedulerKind::Ddim => "ddim",
        }
    }

    /// Parses a scheduler from a wire string.
    ///
    /// Unrecognized values return None; callers treat that as "keep the
    /// default scheduler" rather than an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "euler" => Some(SchedulerKind::Euler),
            "euler_ancestral" | "euler_a" => Some(SchedulerKind::EulerAncestral),
            "dpmpp_2m" | "dpm++_2m" | "dpm++2m" => Some(SchedulerKind::DpmPlusPlus2m),
            "ddim" => Some(SchedulerKind::Ddim),
            _ => None,
        }
    }
}

impl std::fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named weighted modifier (low-rank adapter) applied to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterSpec {
    /// Where the adapter weights come from (path or repository reference).
    pub source: String,
    /// Unique activation name. Duplicate names within one request resolve
    /// last-wins.
    pub name: String,
    /// Per-adapter weight, multiplied by the request's adapter_mix_scale at
    /// apply time.
    pub weight: f32,
}

/// Immutable per-request value object describing one generation.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Text description of the desired image. Required, non-empty.
    pub prompt: String,

    /// Features to steer away from.
    pub negative_prompt: String,

    /// Number of inference steps, > 0.
    pub steps: u32,

    /// Classifier-free guidance scale, >= 0.
    pub guidance_scale: f32,

    /// Requested output width in pixels, > 0.
    pub width: u32,

    /// Requested output height in pixels, > 0.
    pub height: u32,

    /// Seed for reproducible generation. None means non-deterministic.
    pub seed: Option<u64>,

    /// Decoded reference image for feature-based conditioning.
    pub conditioning_image: Option<RgbImage>,

    /// Influence of the conditioning image, in [0, 1].
    pub conditioning_strength: f32,

    /// Ordered adapter activations, default empty.
    pub adapters: Vec<AdapterSpec>,

    /// Global multiplier across all active adapters.
    pub adapter_mix_scale: f32,

    /// Alternate sampling algorithm scoped to this request.
    pub scheduler_override: Option<SchedulerKind>,
}

impl GenerationConfig {
    /// Creates a config with the given prompt and all defaults.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            steps: DEFAULT_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            width: CANONICAL_WIDTH,
            height: CANONICAL_HEIGHT,
            seed: None,
            conditioning_image: None,
            conditioning_strength: DEFAULT_CONDITIONING_STRENGTH,
            adapters: Vec::new(),
            adapter_mix_scale: DEFAULT_ADAPTER_MIX_SCALE,
            scheduler_override: None,
        }
    }

    /// Validates the request fields.
    ///
    /// Adapter entries are deliberately not rejected here: an unresolvable
    /// adapter degrades composition with a warning instead of failing the job.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.is_empty() {
            return Err(DaemonError::empty_prompt());
        }
        if self.steps == 0 {
            return Err(DaemonError::invalid_config("steps must be > 0"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(DaemonError::invalid_config(format!(
                "dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.guidance_scale.is_finite() || self.guidance_scale < 0.0 {
            return Err(DaemonError::invalid_config(format!(
                "guidance_scale must be finite and >= 0, got {}",
                self.guidance_scale
            )));
        }
        if !self.conditioning_strength.is_finite()
            || !(0.0..=1.0).contains(&self.conditioning_strength)
        {
            return Err(DaemonError::invalid_config(format!(
                "conditioning_strength must be within [0, 1], got {}",
                self.conditioning_strength
            )));
        }
        if !self.adapter_mix_scale.is_finite() {
            return Err(DaemonError::invalid_config(
                "adapter_mix_scale must be finite",
            ));
        }
        Ok(())
    }

    /// Returns true if the requested size differs from the canonical
    /// resolution, which implies a refinement stage.
    pub fn needs_refinement(&self) -> bool {
        (self.width, self.height) != (CANONICAL_WIDTH, CANONICAL_HEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_parsing() {
        assert_eq!(SchedulerKind::parse("euler"), Some(SchedulerKind::Euler));
        assert_eq!(
            SchedulerKind::parse("Euler_A"),
            Some(SchedulerKind::EulerAncestral)
        );
        assert_eq!(
            SchedulerKind::parse("dpm++2m"),
            Some(SchedulerKind::DpmPlusPlus2m)
        );
        assert_eq!(SchedulerKind::parse("DDIM"), Some(SchedulerKind::Ddim));
        assert_eq!(SchedulerKind::parse("lms_karras"), None);
    }

    #[test]
    fn scheduler_display() {
        assert_eq!(SchedulerKind::Euler.to_string(), "euler");
        assert_eq!(SchedulerKind::DpmPlusPlus2m.to_string(), "dpmpp_2m");
    }

    #[test]
    fn config_defaults() {
        let config = GenerationConfig::new("a lighthouse at dusk");
        assert_eq!(config.steps, DEFAULT_STEPS);
        assert_eq!(config.guidance_scale, DEFAULT_GUIDANCE_SCALE);
        assert_eq!(config.width, CANONICAL_WIDTH);
        assert_eq!(config.height, CANONICAL_HEIGHT);
        assert!(config.adapters.is_empty());
        assert!(config.validate().is_ok());
        assert!(!config.needs_refinement());
    }

    #[test]
    fn empty_prompt_rejected() {
        let config = GenerationConfig::new("");
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidConfig);
    }

    #[test]
    fn zero_dimensions_rejected() {
        let mut config = GenerationConfig::new("test");
        config.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_finite_strength_rejected() {
        let mut config = GenerationConfig::new("test");
        config.conditioning_strength = f32::NAN;
        assert!(config.validate().is_err());

        config.conditioning_strength = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn refinement_implied_by_size_mismatch() {
        let mut config = GenerationConfig::new("test");
        assert!(!config.needs_refinement());

        config.width = 2048;
        config.height = 2048;
        assert!(config.needs_refinement());

        config.width = CANONICAL_WIDTH;
        config.height = 512;
        assert!(config.needs_refinement());
    }
}
