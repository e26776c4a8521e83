//! Command-line interface.
//!
//! Three modes: `--serve` runs the worker, `--local` generates in-process
//! with the procedural engine, and the default mode submits to the remote
//! endpoint configured in the environment.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::codec;
use crate::error::{DaemonError, Result};
use crate::types::request::{AdapterSpec, GenerationConfig, SchedulerKind};
use crate::types::wire::{LoraEntry, RequestInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchedulerArg {
    Euler,
    EulerAncestral,
    Dpmpp2m,
    Ddim,
}

impl From<SchedulerArg> for SchedulerKind {
    fn from(arg: SchedulerArg) -> Self {
        match arg {
            SchedulerArg::Euler => SchedulerKind::Euler,
            SchedulerArg::EulerAncestral => SchedulerKind::EulerAncestral,
            SchedulerArg::Dpmpp2m => SchedulerKind::DpmPlusPlus2m,
            SchedulerArg::Ddim => SchedulerKind::Ddim,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "imagegen-daemon",
    version,
    about = "Image synthesis worker and client"
)]
pub struct Cli {
    /// Run the worker HTTP server.
    #[arg(long, conflicts_with = "local")]
    pub serve: bool,

    /// Generate in-process instead of submitting to a remote endpoint.
    #[arg(long)]
    pub local: bool,

    /// Text description of the desired image.
    #[arg(long)]
    pub prompt: Option<String>,

    /// Features to steer away from.
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Number of inference steps.
    #[arg(long)]
    pub steps: Option<u32>,

    /// Classifier-free guidance scale.
    #[arg(long)]
    pub guidance_scale: Option<f32>,

    /// Output width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// Seed for reproducible generation.
    #[arg(long)]
    pub seed: Option<u64>,

    /// PNG file used as the conditioning reference image.
    #[arg(long)]
    pub reference_image: Option<PathBuf>,

    /// Influence of the reference image, 0.0 to 1.0.
    #[arg(long)]
    pub conditioning_strength: Option<f32>,

    /// Adapter activation as source:name:weight. Repeatable.
    #[arg(long = "adapter")]
    pub adapters: Vec<String>,

    /// Global multiplier across all adapters.
    #[arg(long)]
    pub adapter_scale: Option<f32>,

    /// Sampling scheduler for this request.
    #[arg(long, value_enum)]
    pub scheduler: Option<SchedulerArg>,

    /// Where to save the generated PNG.
    #[arg(long, default_value = "output.png")]
    pub output: PathBuf,
}

impl Cli {
    fn require_prompt(&self) -> Result<&str> {
        self.prompt
            .as_deref()
            .ok_or_else(|| DaemonError::invalid_config("--prompt is required"))
    }

    fn parsed_adapters(&self) -> Result<Vec<AdapterSpec>> {
        self.adapters.iter().map(|s| parse_adapter(s)).collect()
    }

    /// Builds the wire request for remote submission. The reference image
    /// file is read and base64-encoded as-is; it must already be a PNG.
    pub fn to_request_input(&self) -> Result<RequestInput> {
        let mut input = RequestInput::new(self.require_prompt()?);

        if let Some(v) = &self.negative_prompt {
            input.negative_prompt = v.clone();
        }
        if let Some(v) = self.steps {
            input.steps = v;
        }
        if let Some(v) = self.guidance_scale {
            input.guidance_scale = v;
        }
        if let Some(v) = self.width {
            input.width = v;
        }
        if let Some(v) = self.height {
            input.height = v;
        }
        input.seed = self.seed;
        if let Some(v) = self.conditioning_strength {
            input.ip_adapter_scale = v;
        }
        if let Some(v) = self.adapter_scale {
            input.lora_scale = v;
        }
        input.scheduler = self.scheduler.map(|s| SchedulerKind::from(s).to_string());

        if let Some(path) = &self.reference_image {
            let bytes = std::fs::read(path).map_err(|e| {
                DaemonError::with_source(
                    crate::error::ErrorCode::InvalidConfig,
                    format!("Cannot read reference image {}", path.display()),
                    e,
                )
            })?;
            input.reference_image = Some(codec::encode_bytes(&bytes));
        }

        let adapters = self.parsed_adapters()?;
        if !adapters.is_empty() {
            input.loras = Some(
                adapters
                    .into_iter()
                    .map(|a| LoraEntry {
                        path: a.source,
                        name: a.name,
                        weight: a.weight,
                    })
                    .collect(),
            );
        }

        Ok(input)
    }

    /// Builds the config for local generation, decoding the reference image
    /// from disk.
    pub fn to_generation_config(&self) -> Result<GenerationConfig> {
        let mut config = GenerationConfig::new(self.require_prompt()?);

        if let Some(v) = &self.negative_prompt {
            config.negative_prompt = v.clone();
        }
        if let Some(v) = self.steps {
            config.steps = v;
        }
        if let Some(v) = self.guidance_scale {
            config.guidance_scale = v;
        }
        if let Some(v) = self.width {
            config.width = v;
        }
        if let Some(v) = self.height {
            config.height = v;
        }
        config.seed = self.seed;
        if let Some(v) = self.conditioning_strength {
            config.conditioning_strength = v;
        }
        if let Some(v) = self.adapter_scale {
            config.adapter_mix_scale = v;
        }
        config.scheduler_override = self.scheduler.map(SchedulerKind::from);
        config.adapters = self.parsed_adapters()?;

        if let Some(path) = &self.reference_image {
            let image = image::open(path).map_err(|e| {
                DaemonError::with_source(
                    crate::error::ErrorCode::InvalidConfig,
                    format!("Cannot open reference image {}", path.display()),
                    e,
                )
            })?;
            config.conditioning_image = Some(image.to_rgb8());
        }

        config.validate()?;
        Ok(config)
    }
}

/// Parses `source:name:weight`. The source may itself contain colons
/// (Windows paths, URLs), so the name and weight split off the right.
fn parse_adapter(raw: &str) -> Result<AdapterSpec> {
    let mut parts = raw.rsplitn(3, ':');
    let weight_raw = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    let source = parts.next().unwrap_or_default();

    if source.is_empty() || name.is_empty() {
        return Err(DaemonError::invalid_config(format!(
            "adapter '{}' must be source:name:weight",
            raw
        )));
    }
    let weight: f32 = weight_raw.parse().map_err(|_| {
        DaemonError::invalid_config(format!(
            "adapter '{}' has non-numeric weight '{}'",
            raw, weight_raw
        ))
    })?;

    Ok(AdapterSpec {
        source: source.to_string(),
        name: name.to_string(),
        weight,
    })
}
