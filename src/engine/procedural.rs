//! Deterministic procedural synthesis engine.
//!
//! Stands in for the neural backend in local mode and in tests. Output is a
//! pure function of the stage parameters, the engine's mutable state, and
//! the shared random stream, so seeded requests replay byte-identically
//! within one engine version.

use image::{Rgb, RgbImage};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use sha2::{Digest, Sha256};

use crate::engine::{EngineCapabilities, EngineState, SeedContext, SynthesisEngine};
use crate::error::{DaemonError, Result};
use crate::pipeline::plan::StageParams;
use crate::types::request::{AdapterSpec, SchedulerKind, DEFAULT_SCHEDULER};

/// Amplitude of the per-pixel Gaussian noise, in 8-bit channel units.
const NOISE_AMPLITUDE: f32 = 14.0;

/// Maximum per-channel shift one adapter at weight 1.0 contributes.
const ADAPTER_TINT_RANGE: f32 = 40.0;

struct ActiveAdapter {
    name: String,
    weight: f32,
}

/// Deterministic engine: structured color fields derived from the stage
/// parameters, perturbed by noise from the shared random stream.
pub struct ProceduralEngine {
    scheduler: SchedulerKind,
    adapters: Vec<ActiveAdapter>,
    adapter_scale: f32,
    conditioning: Option<(RgbImage, f32)>,
}

impl ProceduralEngine {
    pub fn new() -> Self {
        Self {
            scheduler: DEFAULT_SCHEDULER,
            adapters: Vec::new(),
            adapter_scale: 1.0,
            conditioning: None,
        }
    }

    /// Digest over everything that shapes the output besides the random
    /// stream. Any parameter or state change lands in different pixels.
    fn stage_digest(&self, stage: &StageParams) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(stage.prompt.as_bytes());
        hasher.update([0]);
        hasher.update(stage.negative_prompt.as_bytes());
        hasher.update(stage.steps.to_le_bytes());
        hasher.update(stage.guidance_scale.to_le_bytes());
        hasher.update(stage.width.to_le_bytes());
        hasher.update(stage.height.to_le_bytes());
        hasher.update(stage.strength.unwrap_or(0.0).to_le_bytes());
        hasher.update(self.scheduler.as_str().as_bytes());
        for adapter in &self.adapters {
            hasher.update(adapter.name.as_bytes());
            hasher.update((adapter.weight * self.adapter_scale).to_le_bytes());
        }
        hasher.finalize().into()
    }

    /// Per-channel tint accumulated from the active adapters.
    fn adapter_tint(&self) -> [f32; 3] {
        let mut tint = [0.0f32; 3];
        for adapter in &self.adapters {
            let h = hash64(adapter.name.as_bytes());
            let contribution = adapter.weight * self.adapter_scale;
            for (c, t) in tint.iter_mut().enumerate() {
                let unit = ((h >> (c * 8)) & 0xff) as f32 / 255.0 * 2.0 - 1.0;
                *t += unit * ADAPTER_TINT_RANGE * contribution;
            }
        }
        tint
    }
}

impl Default for ProceduralEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisEngine for ProceduralEngine {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities { conditioning: true }
    }

    fn state(&self) -> EngineState {
        EngineState {
            scheduler: self.scheduler,
            adapters: self.adapters.iter().map(|a| a.name.clone()).collect(),
            adapter_scale: self.adapter_scale,
            conditioning_active: self.conditioning.is_some(),
        }
    }

    fn set_scheduler(&mut self, scheduler: SchedulerKind) -> Result<()> {
        self.scheduler = scheduler;
        Ok(())
    }

    fn load_adapter(&mut self, adapter: &AdapterSpec) -> Result<()> {
        if adapter.source.is_empty() {
            return Err(DaemonError::synthesis_failed(format!(
                "adapter '{}' has no source",
                adapter.name
            )));
        }
        // Reactivating a name replaces the earlier activation.
        self.adapters.retain(|a| a.name != adapter.name);
        self.adapters.push(ActiveAdapter {
            name: adapter.name.clone(),
            weight: adapter.weight,
        });
        Ok(())
    }

    fn set_adapter_scale(&mut self, scale: f32) {
        self.adapter_scale = scale;
    }

    fn unload_adapters(&mut self) {
        self.adapters.clear();
    }

    fn enable_conditioning(&mut self, image: &RgbImage, strength: f32) -> Result<()> {
        self.conditioning = Some((image.clone(), strength));
        Ok(())
    }

    fn disable_conditioning(&mut self) {
        self.conditioning = None;
    }

    fn synthesize(
        &mut self,
        stage: &StageParams,
        init: Option<&RgbImage>,
        ctx: &mut SeedContext,
    ) -> Result<RgbImage> {
        if init.is_some() && self.conditioning.is_some() {
            return Err(DaemonError::synthesis_failed(
                "image-to-image requested while conditioning is active",
            ));
        }
        if let Some(init) = init {
            if init.dimensions() != (stage.width, stage.height) {
                return Err(DaemonError::synthesis_failed(format!(
                    "init image is {}x{}, stage wants {}x{}",
                    init.width(),
                    init.height(),
                    stage.width,
                    stage.height
                )));
            }
        }

        // One draw from the shared stream per stage: later stages depend on
        // their position in the stream, not just their parameters.
        let stream_key = ctx.rng().next_u64();
        let digest = self.stage_digest(stage);
        let mut rng = ChaCha8Rng::seed_from_u64(stream_key ^ hash64(&digest));

        let tint = self.adapter_tint();
        let cond_mean = self
            .conditioning
            .as_ref()
            .map(|(image, strength)| (mean_color(image), *strength));

        let mut out = RgbImage::new(stage.width, stage.height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let mut channels = [0.0f32; 3];
            for (c, v) in channels.iter_mut().enumerate() {
                let base = digest[(c * 9) % 32] as f32;
                let wave = ((x.wrapping_mul(7).wrapping_add(y.wrapping_mul(13))
                    .wrapping_add(digest[c] as u32))
                    % 97) as f32;
                let noise: f32 = rng.sample::<f32, _>(StandardNormal) * NOISE_AMPLITUDE;
                *v = base + wave + noise + tint[c];
            }

            if let Some((mean, strength)) = cond_mean {
                for (c, v) in channels.iter_mut().enumerate() {
                    *v = *v * (1.0 - strength) + mean[c] * strength;
                }
            }

            if let Some(init) = init {
                let strength = stage.strength.unwrap_or(1.0);
                let src = init.get_pixel(x, y);
                for (c, v) in channels.iter_mut().enumerate() {
                    *v = src[c] as f32 * (1.0 - strength) + *v * strength;
                }
            }

            *pixel = Rgb([
                channels[0].clamp(0.0, 255.0) as u8,
                channels[1].clamp(0.0, 255.0) as u8,
                channels[2].clamp(0.0, 255.0) as u8,
            ]);
        }

        Ok(out)
    }

    fn version(&self) -> &str {
        "procedural-1"
    }
}

fn hash64(bytes: &[u8]) -> u64 {
    let digest: [u8; 32] = Sha256::digest(bytes).into();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}

fn mean_color(image: &RgbImage) -> [f32; 3] {
    let mut sums = [0.0f64; 3];
    for pixel in image.pixels() {
        for (c, s) in sums.iter_mut().enumerate() {
            *s += pixel[c] as f64;
        }
    }
    let count = (image.width() as f64 * image.height() as f64).max(1.0);
    [
        (sums[0] / count) as f32,
        (sums[1] / count) as f32,
        (sums[2] / count) as f32,
    ]
}
