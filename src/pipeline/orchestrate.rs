//! PipelineOrchestrator: executes an ExecutionPlan against the engine.
//!
//! The orchestrator owns the engine-state transitions for one job: apply
//! the plan's mutations, run the stages in order, and restore the baseline
//! state before returning on every path. The engine is reused across many
//! requests on one worker process, so a job that leaks adapters or a
//! scheduler swap corrupts every job after it.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::engine::{SeedContext, SynthesisEngine};
use crate::error::Result;
use crate::pipeline::plan::{ExecutionPlan, StageKind};
use crate::types::request::DEFAULT_SCHEDULER;

/// Executes the plan and returns the final image plus accumulated warnings.
///
/// Feature failures at apply time (adapter load, conditioning enable) are
/// absorbed as warnings; a failure inside a synthesis call aborts the job
/// with SYNTHESIS_FAILED. Baseline restoration runs unconditionally before
/// either outcome is returned.
pub fn run(
    engine: &mut dyn SynthesisEngine,
    plan: &ExecutionPlan,
) -> Result<(RgbImage, Vec<String>)> {
    let mut warnings = plan.warnings.clone();
    let mut ctx = SeedContext::new(plan.seed);

    let outcome = execute_stages(engine, plan, &mut ctx, &mut warnings);
    restore_baseline(engine);

    outcome.map(|image| (image, warnings))
}

fn execute_stages(
    engine: &mut dyn SynthesisEngine,
    plan: &ExecutionPlan,
    ctx: &mut SeedContext,
    warnings: &mut Vec<String>,
) -> Result<RgbImage> {
    if let Some(scheduler) = plan.scheduler_swap {
        engine.set_scheduler(scheduler)?;
    }

    engine.set_adapter_scale(plan.adapter_mix_scale);
    for adapter in &plan.adapters {
        if let Err(e) = engine.load_adapter(adapter) {
            warnings.push(format!(
                "adapter '{}' failed to load, continuing without it: {}",
                adapter.name, e.message
            ));
        }
    }

    if let Some(conditioning) = &plan.conditioning {
        if let Err(e) = engine.enable_conditioning(&conditioning.image, conditioning.strength) {
            warnings.push(format!(
                "conditioning could not be enabled, continuing without it: {}",
                e.message
            ));
        }
    }

    let mut current: Option<RgbImage> = None;

    for stage in &plan.stages {
        match stage.kind {
            StageKind::BaseSynthesis => {
                current = Some(engine.synthesize(stage, None, ctx)?);
            }
            StageKind::Refinement => {
                // Conditioning and image-to-image are mutually exclusive on
                // the engine; conditioning must be off before this stage.
                engine.disable_conditioning();

                let base = current.take().ok_or_else(|| {
                    crate::error::DaemonError::synthesis_failed(
                        "refinement stage has no base image",
                    )
                })?;
                let resized =
                    imageops::resize(&base, stage.width, stage.height, FilterType::Lanczos3);
                current = Some(engine.synthesize(stage, Some(&resized), ctx)?);
            }
        }
    }

    current.ok_or_else(|| crate::error::DaemonError::synthesis_failed("plan contained no stages"))
}

/// Restores the engine to the baseline state every job must find it in.
fn restore_baseline(engine: &mut dyn SynthesisEngine) {
    engine.disable_conditioning();
    engine.unload_adapters();
    engine.set_adapter_scale(1.0);
    // The default scheduler is always recognized; a failure here would mean
    // the engine itself is broken, which the next synthesis call surfaces.
    let _ = engine.set_scheduler(DEFAULT_SCHEDULER);
}
