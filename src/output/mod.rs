mod ffmpeg_writer;

pub use ffmpeg_writer::FfmpegVideoWriter;

use anyhow::Result;
use image::RgbImage;

/// Trait for output destinations
pub trait OutputSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close the output, returning the number of frames written
    fn finish(&mut self) -> Result<u64>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}
