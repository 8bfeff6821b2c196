use super::{log_progress, segment_frame};
use crate::capture::FrameSource;
use crate::config::MaskConfig;
use crate::mask::{MaskProcessor, PersonMask};
use crate::output::OutputSink;
use crate::segmentation::PersonSegmenter;
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

/// Level 1: background visible, golfer replaced by a black silhouette
///
/// Masks are closed and temporally smoothed; the smoothing state starts
/// empty for this pass.
pub fn render_silhouette<S, O, M>(
    source: &mut S,
    sink: &mut O,
    segmenter: &mut M,
    config: &MaskConfig,
) -> Result<u64>
where
    S: FrameSource + ?Sized,
    O: OutputSink + ?Sized,
    M: PersonSegmenter + ?Sized,
{
    let _span = tracing::info_span!("silhouette").entered();

    let mut processor = MaskProcessor::new(config.clone());
    processor.reset();
    segmenter.reset_state();

    let mut frames = 0u64;
    while let Some(mut frame) = source.next_frame().context("Failed to read frame")? {
        let alpha = segment_frame(segmenter, &frame)
            .with_context(|| format!("Failed to segment frame {}", frames))?;
        let mask = processor.process(&alpha);

        black_out(&mut frame, &mask);
        sink.write_frame(&frame).context("Failed to write frame")?;

        frames += 1;
        log_progress(frames);
    }

    sink.finish()
}

/// Paint every masked pixel black
pub fn black_out(frame: &mut RgbImage, mask: &PersonMask) {
    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        if mask.get(x, y) {
            *pixel = Rgb([0, 0, 0]);
        }
    }
}
