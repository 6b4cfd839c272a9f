//! Per-kind generation configuration and validation.
//!
//! These structs carry the parameters the workflow builders translate into
//! engine node graphs.  Defaults match the models shipped with a stock
//! local engine install; callers override per request.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::task::MediaKind;

// ---------------------------------------------------------------------------
// Defaults and limits
// ---------------------------------------------------------------------------

/// Default sampler step count across all kinds.
pub const DEFAULT_STEPS: u32 = 20;
/// Default classifier-free-guidance scale.
pub const DEFAULT_CFG_SCALE: f64 = 7.0;
/// Default generated-audio length in seconds.
pub const DEFAULT_AUDIO_DURATION_SECS: f64 = 60.0;
/// Hard ceiling on audio length to keep generations bounded.
pub const MAX_AUDIO_DURATION_SECS: f64 = 600.0;
/// Default image edge length in pixels.
pub const DEFAULT_IMAGE_SIZE: u32 = 1024;
/// Default video clip length in frames.
pub const DEFAULT_VIDEO_FRAMES: u32 = 81;
/// Default video frame rate.
pub const DEFAULT_VIDEO_FPS: u32 = 16;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Parameters for an audio generation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioGenerationConfig {
    /// Style / genre tags driving the generation.
    pub prompt: String,
    /// Optional lyrics; empty means instrumental.
    #[serde(default)]
    pub lyrics: String,
    /// Length of the generated clip in seconds.
    pub duration_secs: f64,
    pub steps: u32,
    pub cfg_scale: f64,
    /// Fixed seed; `None` means pick one at submission time.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Checkpoint file name known to the engine.
    pub checkpoint: String,
}

impl Default for AudioGenerationConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            lyrics: String::new(),
            duration_secs: DEFAULT_AUDIO_DURATION_SECS,
            steps: DEFAULT_STEPS,
            cfg_scale: DEFAULT_CFG_SCALE,
            seed: None,
            checkpoint: "ace_step_v1_3.5b.safetensors".to_string(),
        }
    }
}

/// Parameters for an image generation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationConfig {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    pub checkpoint: String,
    /// Sampler name known to the engine (e.g. `euler`, `dpmpp_2m`).
    pub sampler: String,
}

impl Default for ImageGenerationConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            width: DEFAULT_IMAGE_SIZE,
            height: DEFAULT_IMAGE_SIZE,
            steps: DEFAULT_STEPS,
            cfg_scale: DEFAULT_CFG_SCALE,
            seed: None,
            checkpoint: "sd_xl_base_1.0.safetensors".to_string(),
            sampler: "euler".to_string(),
        }
    }
}

/// Parameters for a video generation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoGenerationConfig {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    /// Clip length in frames.
    pub frames: u32,
    pub fps: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    pub checkpoint: String,
}

impl Default for VideoGenerationConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            width: 832,
            height: 480,
            frames: DEFAULT_VIDEO_FRAMES,
            fps: DEFAULT_VIDEO_FPS,
            steps: DEFAULT_STEPS,
            cfg_scale: DEFAULT_CFG_SCALE,
            seed: None,
            checkpoint: "wan2.1_t2v_1.3B_fp16.safetensors".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Kind-tagged union
// ---------------------------------------------------------------------------

/// Kind-tagged generation parameters carried by a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GenerationConfig {
    Audio(AudioGenerationConfig),
    Image(ImageGenerationConfig),
    Video(VideoGenerationConfig),
}

impl GenerationConfig {
    /// The media kind this config belongs to.
    pub fn kind(&self) -> MediaKind {
        match self {
            GenerationConfig::Audio(_) => MediaKind::Audio,
            GenerationConfig::Image(_) => MediaKind::Image,
            GenerationConfig::Video(_) => MediaKind::Video,
        }
    }

    /// Validate parameter ranges before submission.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            GenerationConfig::Audio(cfg) => {
                if cfg.duration_secs <= 0.0 || cfg.duration_secs > MAX_AUDIO_DURATION_SECS {
                    return Err(CoreError::Validation(format!(
                        "duration_secs must be in (0, {MAX_AUDIO_DURATION_SECS}], got {}",
                        cfg.duration_secs
                    )));
                }
                validate_steps(cfg.steps)
            }
            GenerationConfig::Image(cfg) => {
                validate_dimensions(cfg.width, cfg.height)?;
                validate_steps(cfg.steps)
            }
            GenerationConfig::Video(cfg) => {
                validate_dimensions(cfg.width, cfg.height)?;
                if cfg.frames == 0 {
                    return Err(CoreError::Validation("frames must be > 0".into()));
                }
                if cfg.fps == 0 {
                    return Err(CoreError::Validation("fps must be > 0".into()));
                }
                validate_steps(cfg.steps)
            }
        }
    }
}

fn validate_steps(steps: u32) -> Result<(), CoreError> {
    if steps == 0 || steps > 200 {
        return Err(CoreError::Validation(format!(
            "steps must be in [1, 200], got {steps}"
        )));
    }
    Ok(())
}

fn validate_dimensions(width: u32, height: u32) -> Result<(), CoreError> {
    // Latent-space models require multiples of 8.
    if width == 0 || height == 0 || width % 8 != 0 || height % 8 != 0 {
        return Err(CoreError::Validation(format!(
            "dimensions must be non-zero multiples of 8, got {width}x{height}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_configs_validate() {
        assert!(GenerationConfig::Audio(AudioGenerationConfig::default())
            .validate()
            .is_ok());
        assert!(GenerationConfig::Image(ImageGenerationConfig::default())
            .validate()
            .is_ok());
        assert!(GenerationConfig::Video(VideoGenerationConfig::default())
            .validate()
            .is_ok());
    }

    #[test]
    fn zero_duration_audio_is_rejected() {
        let cfg = GenerationConfig::Audio(AudioGenerationConfig {
            duration_secs: 0.0,
            ..Default::default()
        });
        assert_matches!(cfg.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn non_multiple_of_8_dimensions_are_rejected() {
        let cfg = GenerationConfig::Image(ImageGenerationConfig {
            width: 1000,
            height: 1001,
            ..Default::default()
        });
        assert_matches!(cfg.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn config_kind_matches_variant() {
        let cfg = GenerationConfig::Video(VideoGenerationConfig::default());
        assert_eq!(cfg.kind(), MediaKind::Video);
    }
}
