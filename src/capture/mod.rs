mod ffmpeg_reader;
mod probe;

pub use ffmpeg_reader::FfmpegFrameReader;
pub use probe::probe_video;

use anyhow::Result;
use image::RgbImage;
use std::fmt;

/// Exact frame rate as a rational, e.g. 30000/1001 for NTSC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Intrinsic properties of a video stream
///
/// `frame_rate` is `None` when the container reports no usable rate, which
/// ffprobe does for video tracks with no samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<FrameRate>,
}

impl VideoProperties {
    /// Size in bytes of one packed RGB24 frame
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Frame rate for log lines; 0 when unknown
    pub fn fps(&self) -> f64 {
        self.frame_rate.map_or(0.0, |rate| rate.as_f64())
    }
}

/// Trait for sequential frame sources
///
/// Sources are single-pass: once `next_frame` returns `None` the sequence
/// is exhausted and the source cannot be rewound.
pub trait FrameSource {
    /// Read the next frame, or `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Get the properties of the underlying stream
    fn properties(&self) -> VideoProperties;
}
