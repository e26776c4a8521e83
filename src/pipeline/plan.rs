//! ExecutionPlan: the resolved, ordered description of one job's stages.
//!
//! A plan is derived from a GenerationConfig by the composer, owned by the
//! orchestrator invocation that executes it, and discarded afterwards.

use image::RgbImage;

use crate::types::request::{AdapterSpec, SchedulerKind};

/// Fixed image-to-image strength for the refinement stage.
pub const REFINEMENT_STRENGTH: f32 = 0.3;

/// The role of a stage within the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Generation from noise, optionally conditioned on a reference image.
    BaseSynthesis,
    /// Image-to-image pass over the resized base output.
    Refinement,
}

/// Resolved engine parameters for a single stage.
#[derive(Debug, Clone)]
pub struct StageParams {
    pub kind: StageKind,
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub guidance_scale: f32,
    /// Output width of this stage.
    pub width: u32,
    /// Output height of this stage.
    pub height: u32,
    /// Image-to-image strength; Some only for refinement stages.
    pub strength: Option<f32>,
}

/// Reference-image conditioning resolved for the base stage.
///
/// Conditioning is mutually exclusive with image-to-image mode on the
/// engine, so it is always disabled before a refinement stage runs.
#[derive(Debug, Clone)]
pub struct Conditioning {
    pub image: RgbImage,
    pub strength: f32,
}

/// Ordered execution plan for one job.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Stages in execution order: one base stage, optionally one refinement.
    pub stages: Vec<StageParams>,
    /// Scheduler swap scoped to this request, if any.
    pub scheduler_swap: Option<SchedulerKind>,
    /// Successfully resolved adapters, duplicates already collapsed.
    pub adapters: Vec<AdapterSpec>,
    /// Global adapter multiplier applied at activation time.
    pub adapter_mix_scale: f32,
    /// Conditioning for the base stage, if resolved.
    pub conditioning: Option<Conditioning>,
    /// Seed for the shared reproducibility context.
    pub seed: Option<u64>,
    /// Non-fatal degradations recorded during composition.
    pub warnings: Vec<String>,
}

impl ExecutionPlan {
    /// Returns the refinement stage, if the plan has one.
    pub fn refinement(&self) -> Option<&StageParams> {
        self.stages.iter().find(|s| s.kind == StageKind::Refinement)
    }
}
