use super::{log_progress, segment_frame};
use crate::capture::FrameSource;
use crate::config::{BlurConfig, HeadConfig, MaskConfig};
use crate::head::{detect_head_region, HeadBoundingBox};
use crate::mask::MaskProcessor;
use crate::output::OutputSink;
use crate::segmentation::PersonSegmenter;
use anyhow::{Context, Result};
use image::{imageops, RgbImage};

/// Level 2: full frame with the golfer's head blurred
///
/// Each frame is judged on its own thresholded mask: no closing and no
/// temporal smoothing. Frames without a detected person pass through.
pub fn render_head_blur<S, O, M>(
    source: &mut S,
    sink: &mut O,
    segmenter: &mut M,
    mask_config: &MaskConfig,
    head_config: &HeadConfig,
    blur_config: &BlurConfig,
) -> Result<u64>
where
    S: FrameSource + ?Sized,
    O: OutputSink + ?Sized,
    M: PersonSegmenter + ?Sized,
{
    let _span = tracing::info_span!("head_blur").entered();

    let mut processor = MaskProcessor::new(mask_config.clone());
    processor.reset();
    segmenter.reset_state();

    let mut frames = 0u64;
    let mut detections = 0u64;
    while let Some(mut frame) = source.next_frame().context("Failed to read frame")? {
        let alpha = segment_frame(segmenter, &frame)
            .with_context(|| format!("Failed to segment frame {}", frames))?;
        let mask = processor.threshold(&alpha);

        let (width, height) = frame.dimensions();
        if let Some(head) = detect_head_region(&mask, width, height, head_config) {
            if blur_region(&mut frame, head, blur_config.sigma) {
                detections += 1;
            }
        }
        sink.write_frame(&frame).context("Failed to write frame")?;

        frames += 1;
        log_progress(frames);
    }

    tracing::debug!("Blurred a head in {} of {} frames", detections, frames);
    sink.finish()
}

/// Replace `region` of `frame` with a Gaussian blur of itself
///
/// Returns false, leaving the frame untouched, when the region is empty.
pub fn blur_region(frame: &mut RgbImage, region: HeadBoundingBox, sigma: f32) -> bool {
    if region.is_empty() || region.x2() > frame.width() || region.y2() > frame.height() {
        return false;
    }

    let patch = imageops::crop_imm(&*frame, region.x, region.y, region.width, region.height).to_image();
    let blurred = imageops::blur(&patch, sigma);
    imageops::replace(frame, &blurred, region.x as i64, region.y as i64);
    true
}
