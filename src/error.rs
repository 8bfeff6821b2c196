use std::path::PathBuf;
use thiserror::Error;

/// Failures at the media and filesystem boundary
#[derive(Debug, Error)]
pub enum RevealError {
    #[error("Input video not found: {0}")]
    InputNotFound(PathBuf),

    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    #[error("ffprobe failed for {path}: {message}")]
    ProbeFailed { path: PathBuf, message: String },

    #[error("ffmpeg failed: {message}{}", describe_exit(.exit_code, .stderr))]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Frame rate of {0} is unknown, cannot encode frames")]
    MissingFrameRate(PathBuf),

    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },

    #[error("Frame is {actual_width}x{actual_height}, sink expects {width}x{height}")]
    FrameSizeMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Unexpected segmentation output: {0}")]
    SegmentationOutput(String),

    #[error("Could not move {from} to {to}: {source}")]
    RelocationFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No videos found in {0}")]
    NoVideos(PathBuf),
}

fn describe_exit(exit_code: &Option<i32>, stderr: &Option<String>) -> String {
    let mut detail = String::new();
    if let Some(code) = exit_code {
        detail.push_str(&format!(" (exit code {})", code));
    }
    if let Some(stderr) = stderr.as_deref().filter(|s| !s.is_empty()) {
        detail.push_str(": ");
        detail.push_str(stderr);
    }
    detail
}

impl RevealError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}
