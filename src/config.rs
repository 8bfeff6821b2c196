use std::path::PathBuf;
use std::time::Duration;

/// Mask post-processing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MaskConfig {
    /// Alpha values strictly above this count as foreground.
    /// Lower values keep thin objects like the club attached to the body.
    pub alpha_threshold: u8,

    /// Side length of the square structuring element used for closing
    pub closing_kernel: u32,

    /// Weight of the current frame when blending with the previous mask
    pub current_weight: f32,

    /// Blended values strictly above this become foreground
    pub smoothing_threshold: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: 5,
            closing_kernel: 5,
            current_weight: 0.7,
            smoothing_threshold: 0.5,
        }
    }
}

/// Head region heuristic parameters
#[derive(Debug, Clone, PartialEq)]
pub struct HeadConfig {
    /// Fraction of the person height treated as head
    pub head_height_ratio: f32,

    /// Padding added on every side, as a fraction of the head height
    pub padding_ratio: f32,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            head_height_ratio: 0.20,
            padding_ratio: 0.20,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlurConfig {
    /// Gaussian standard deviation in pixels
    pub sigma: f32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self { sigma: 30.0 }
    }
}

/// Output encoder settings
///
/// Defaults target H.264 in MP4 so the clips play in browsers.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub codec: String,
    pub pixel_format: String,
    pub crf: u8,
    pub preset: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            crf: 18,
            preset: "medium".to_string(),
        }
    }
}

/// Everything a single video needs to render its levels
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub mask: MaskConfig,
    pub head: HeadConfig,
    pub blur: BlurConfig,
    pub encoder: EncoderConfig,
}

/// Folder layout and relocation policy for batch runs
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub completed_dir: PathBuf,

    /// Wait before the single relocation retry
    pub retry_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("videos_to_process"),
            output_dir: PathBuf::from("videos"),
            completed_dir: PathBuf::from("completed-videos"),
            retry_delay: Duration::from_secs(2),
        }
    }
}
