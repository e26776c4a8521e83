//! FeatureComposer: resolves optional request features into an ExecutionPlan.
//!
//! Composition is where the degradation policy lives: a feature that cannot
//! be resolved (missing conditioning capability, bad adapter entry) is
//! dropped with a recorded warning, never a fatal error. Only invalid core
//! fields fail composition.

use crate::engine::EngineCapabilities;
use crate::error::Result;
use crate::pipeline::plan::{
    Conditioning, ExecutionPlan, StageKind, StageParams, REFINEMENT_STRENGTH,
};
use crate::types::request::{
    AdapterSpec, GenerationConfig, CANONICAL_HEIGHT, CANONICAL_WIDTH,
};

/// Produces an ExecutionPlan for the config, or fails with INVALID_CONFIG.
pub fn compose(config: &GenerationConfig, caps: &EngineCapabilities) -> Result<ExecutionPlan> {
    config.validate()?;

    let mut warnings = Vec::new();

    let conditioning = resolve_conditioning(config, caps, &mut warnings);
    let adapters = resolve_adapters(&config.adapters, &mut warnings);
    let stages = resolve_stages(config);

    Ok(ExecutionPlan {
        stages,
        scheduler_swap: config.scheduler_override,
        adapters,
        adapter_mix_scale: config.adapter_mix_scale,
        conditioning,
        seed: config.seed,
        warnings,
    })
}

/// Resolves conditioning, degrading when the engine lacks the capability.
fn resolve_conditioning(
    config: &GenerationConfig,
    caps: &EngineCapabilities,
    warnings: &mut Vec<String>,
) -> Option<Conditioning> {
    let image = config.conditioning_image.as_ref()?;
    if !caps.conditioning {
        warnings.push(
            "engine does not support reference-image conditioning, continuing without it"
                .to_string(),
        );
        return None;
    }
    Some(Conditioning {
        image: image.clone(),
        strength: config.conditioning_strength,
    })
}

/// Resolves adapters independently; bad entries are skipped with a warning
/// and duplicate names collapse last-wins.
fn resolve_adapters(adapters: &[AdapterSpec], warnings: &mut Vec<String>) -> Vec<AdapterSpec> {
    let mut resolved: Vec<AdapterSpec> = Vec::new();

    for adapter in adapters {
        if let Err(reason) = check_adapter(adapter) {
            warnings.push(format!(
                "skipping adapter '{}': {}",
                adapter.name, reason
            ));
            continue;
        }
        // Last-wins on duplicate names: the earlier activation is removed
        // and the later one takes its place in composition order.
        if let Some(pos) = resolved.iter().position(|a| a.name == adapter.name) {
            warnings.push(format!(
                "adapter '{}' specified more than once, keeping the later entry",
                adapter.name
            ));
            resolved.remove(pos);
        }
        resolved.push(adapter.clone());
    }

    resolved
}

fn check_adapter(adapter: &AdapterSpec) -> std::result::Result<(), &'static str> {
    if adapter.name.is_empty() {
        return Err("adapter name is empty");
    }
    if adapter.source.is_empty() {
        return Err("adapter source is empty");
    }
    if !adapter.weight.is_finite() {
        return Err("adapter weight is not finite");
    }
    Ok(())
}

/// Builds the stage list: one base stage, plus a refinement stage whenever
/// the requested size differs from the canonical resolution.
fn resolve_stages(config: &GenerationConfig) -> Vec<StageParams> {
    let base_target = if config.needs_refinement() {
        (CANONICAL_WIDTH, CANONICAL_HEIGHT)
    } else {
        (config.width, config.height)
    };

    let mut stages = vec![StageParams {
        kind: StageKind::BaseSynthesis,
        prompt: config.prompt.clone(),
        negative_prompt: config.negative_prompt.clone(),
        steps: config.steps,
        guidance_scale: config.guidance_scale,
        width: base_target.0,
        height: base_target.1,
        strength: None,
    }];

    if config.needs_refinement() {
        stages.push(StageParams {
            kind: StageKind::Refinement,
            prompt: config.prompt.clone(),
            negative_prompt: config.negative_prompt.clone(),
            steps: config.steps,
            guidance_scale: config.guidance_scale,
            width: config.width,
            height: config.height,
            strength: Some(REFINEMENT_STRENGTH),
        });
    }

    stages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::request::SchedulerKind;
    use image::RgbImage;

    fn caps() -> EngineCapabilities {
        EngineCapabilities { conditioning: true }
    }

    fn no_conditioning_caps() -> EngineCapabilities {
        EngineCapabilities {
            conditioning: false,
        }
    }

    fn adapter(name: &str, weight: f32) -> AdapterSpec {
        AdapterSpec {
            source: format!("adapters/{}.safetensors", name),
            name: name.to_string(),
            weight,
        }
    }

    #[test]
    fn canonical_size_yields_single_stage() {
        let config = GenerationConfig::new("a lighthouse");
        let plan = compose(&config, &caps()).unwrap();
        assert_eq!(plan.stages.len(), 1);
        assert_eq!(plan.stages[0].kind, StageKind::BaseSynthesis);
        assert_eq!(plan.stages[0].width, CANONICAL_WIDTH);
        assert!(plan.stages[0].strength.is_none());
        assert!(plan.refinement().is_none());
    }

    #[test]
    fn size_mismatch_appends_refinement_at_fixed_strength() {
        let mut config = GenerationConfig::new("a lighthouse");
        config.width = 2048;
        config.height = 1536;

        let plan = compose(&config, &caps()).unwrap();
        assert_eq!(plan.stages.len(), 2);

        // Base stage runs at the canonical resolution.
        assert_eq!(plan.stages[0].width, CANONICAL_WIDTH);
        assert_eq!(plan.stages[0].height, CANONICAL_HEIGHT);

        let refine = plan.refinement().unwrap();
        assert_eq!(refine.width, 2048);
        assert_eq!(refine.height, 1536);
        assert_eq!(refine.strength, Some(REFINEMENT_STRENGTH));
        assert_eq!(refine.prompt, plan.stages[0].prompt);
        assert_eq!(refine.guidance_scale, plan.stages[0].guidance_scale);
    }

    #[test]
    fn empty_prompt_fails_composition() {
        let config = GenerationConfig::new("");
        let err = compose(&config, &caps()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[test]
    fn conditioning_resolved_when_supported() {
        let mut config = GenerationConfig::new("test");
        config.conditioning_image = Some(RgbImage::new(16, 16));
        config.conditioning_strength = 0.4;

        let plan = compose(&config, &caps()).unwrap();
        let conditioning = plan.conditioning.unwrap();
        assert_eq!(conditioning.strength, 0.4);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn missing_capability_degrades_conditioning() {
        let mut config = GenerationConfig::new("test");
        config.conditioning_image = Some(RgbImage::new(16, 16));

        let plan = compose(&config, &no_conditioning_caps()).unwrap();
        assert!(plan.conditioning.is_none());
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("conditioning"));
    }

    #[test]
    fn bad_adapter_skipped_with_warning() {
        let mut config = GenerationConfig::new("test");
        config.adapters = vec![
            adapter("good", 0.7),
            AdapterSpec {
                source: String::new(),
                name: "broken".to_string(),
                weight: 0.5,
            },
            AdapterSpec {
                source: "x".to_string(),
                name: "nan".to_string(),
                weight: f32::NAN,
            },
        ];

        let plan = compose(&config, &caps()).unwrap();
        assert_eq!(plan.adapters.len(), 1);
        assert_eq!(plan.adapters[0].name, "good");
        assert_eq!(plan.warnings.len(), 2);
    }

    #[test]
    fn duplicate_adapter_names_resolve_last_wins() {
        let mut config = GenerationConfig::new("test");
        config.adapters = vec![
            adapter("ink", 0.2),
            adapter("wash", 0.5),
            adapter("ink", 0.9),
        ];

        let plan = compose(&config, &caps()).unwrap();
        assert_eq!(plan.adapters.len(), 2);
        // The later "ink" entry wins and moves to the end of the order.
        assert_eq!(plan.adapters[0].name, "wash");
        assert_eq!(plan.adapters[1].name, "ink");
        assert_eq!(plan.adapters[1].weight, 0.9);
    }

    #[test]
    fn scheduler_override_carried_into_plan() {
        let mut config = GenerationConfig::new("test");
        config.scheduler_override = Some(SchedulerKind::Ddim);

        let plan = compose(&config, &caps()).unwrap();
        assert_eq!(plan.scheduler_swap, Some(SchedulerKind::Ddim));

        config.scheduler_override = None;
        let plan = compose(&config, &caps()).unwrap();
        assert!(plan.scheduler_swap.is_none());
    }

    #[test]
    fn seed_carried_into_plan() {
        let mut config = GenerationConfig::new("test");
        config.seed = Some(1234);
        let plan = compose(&config, &caps()).unwrap();
        assert_eq!(plan.seed, Some(1234));
    }
}
