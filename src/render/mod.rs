//! Reveal level rendering.
//!
//! Every level reads the source video on its own, so segmentation runs once
//! per level. A failing level is recorded in its [`LevelReport`] and the
//! remaining levels still run.

mod head_blur;
mod original;
mod silhouette;

pub use head_blur::{blur_region, render_head_blur};
pub use original::copy_original;
pub use silhouette::{black_out, render_silhouette};

use crate::capture::{FfmpegFrameReader, FrameSource, VideoProperties};
use crate::config::{EncoderConfig, PipelineConfig};
use crate::error::RevealError;
use crate::output::{FfmpegVideoWriter, OutputSink};
use crate::segmentation::{alpha_channel, AlphaChannel, PersonSegmenter};
use anyhow::{Context, Result};
use image::RgbImage;
use std::fmt;
use std::path::{Path, PathBuf};

/// Progress is logged every this many frames
const PROGRESS_INTERVAL: u64 = 30;

/// One of the three renderings of a source video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealLevel {
    /// Person blacked out, background visible
    Silhouette,
    /// Everything visible except a blurred head
    HeadBlur,
    /// Untouched source
    Original,
}

impl RevealLevel {
    pub const ALL: [RevealLevel; 3] = [
        RevealLevel::Silhouette,
        RevealLevel::HeadBlur,
        RevealLevel::Original,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            RevealLevel::Silhouette => "level1.mp4",
            RevealLevel::HeadBlur => "level2.mp4",
            RevealLevel::Original => "original.mp4",
        }
    }
}

impl fmt::Display for RevealLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RevealLevel::Silhouette => "level 1 (silhouette)",
            RevealLevel::HeadBlur => "level 2 (head blur)",
            RevealLevel::Original => "original",
        };
        f.write_str(name)
    }
}

/// Result of rendering one level
#[derive(Debug, Clone, PartialEq)]
pub enum LevelOutcome {
    /// Frames were encoded; zero means no output file was written
    Rendered { frames: u64 },
    /// Source was copied verbatim
    Copied { bytes: u64 },
    /// The pass aborted; any output file is incomplete
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct LevelReport {
    pub level: RevealLevel,
    pub output: PathBuf,
    pub outcome: LevelOutcome,
}

impl LevelReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, LevelOutcome::Failed { .. })
    }
}

/// Opens frame sources and output sinks for a render pass
pub trait MediaBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    fn create_sink(&self, path: &Path, properties: VideoProperties) -> Result<Box<dyn OutputSink>>;
}

/// Decodes and encodes through ffmpeg child processes
pub struct FfmpegBackend {
    encoder: EncoderConfig,
}

impl FfmpegBackend {
    pub fn new(encoder: EncoderConfig) -> Self {
        Self { encoder }
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegFrameReader::open(path)?))
    }

    fn create_sink(&self, path: &Path, properties: VideoProperties) -> Result<Box<dyn OutputSink>> {
        Ok(Box::new(FfmpegVideoWriter::new(
            path,
            properties,
            self.encoder.clone(),
        )?))
    }
}

/// Render every reveal level of `input` under `output_root/<stem>/`
///
/// Fails only when the input is missing or the output directory cannot be
/// created; per-level failures are reported in the returned list.
pub fn render_all_levels(
    input: &Path,
    output_root: &Path,
    backend: &dyn MediaBackend,
    segmenter: &mut dyn PersonSegmenter,
    config: &PipelineConfig,
) -> Result<Vec<LevelReport>> {
    if !input.is_file() {
        return Err(RevealError::InputNotFound(input.to_path_buf()).into());
    }

    let stem = input
        .file_stem()
        .ok_or_else(|| RevealError::InputNotFound(input.to_path_buf()))?;
    let video_dir = output_root.join(stem);
    std::fs::create_dir_all(&video_dir)
        .with_context(|| format!("Failed to create {}", video_dir.display()))?;

    let mut reports = Vec::with_capacity(RevealLevel::ALL.len());
    for level in RevealLevel::ALL {
        let output = video_dir.join(level.file_name());
        tracing::info!("Creating {}: {}", level, output.display());

        let outcome = match render_level(level, input, &output, backend, segmenter, config) {
            Ok(outcome) => {
                tracing::info!("{} complete: {}", level, output.display());
                outcome
            }
            Err(e) => {
                tracing::error!("Error processing {}: {:#}", output.display(), e);
                LevelOutcome::Failed {
                    error: format!("{:#}", e),
                }
            }
        };

        reports.push(LevelReport {
            level,
            output,
            outcome,
        });
    }

    Ok(reports)
}

/// Run a single level's pass; all handles are released before returning
pub fn render_level(
    level: RevealLevel,
    input: &Path,
    output: &Path,
    backend: &dyn MediaBackend,
    segmenter: &mut dyn PersonSegmenter,
    config: &PipelineConfig,
) -> Result<LevelOutcome> {
    let frames = match level {
        RevealLevel::Original => {
            let bytes = copy_original(input, output)?;
            return Ok(LevelOutcome::Copied { bytes });
        }
        RevealLevel::Silhouette => {
            let mut source = backend.open_source(input)?;
            let mut sink = backend.create_sink(output, source.properties())?;
            render_silhouette(source.as_mut(), sink.as_mut(), segmenter, &config.mask)?
        }
        RevealLevel::HeadBlur => {
            let mut source = backend.open_source(input)?;
            let mut sink = backend.create_sink(output, source.properties())?;
            render_head_blur(
                source.as_mut(),
                sink.as_mut(),
                segmenter,
                &config.mask,
                &config.head,
                &config.blur,
            )?
        }
    };

    if frames == 0 {
        tracing::warn!("{} has no frames, no output written", input.display());
    }
    Ok(LevelOutcome::Rendered { frames })
}

/// Segment a frame and pull out its alpha channel
fn segment_frame<M: PersonSegmenter + ?Sized>(segmenter: &mut M, frame: &RgbImage) -> Result<AlphaChannel> {
    let cutout = segmenter.segment(frame)?;
    if cutout.dimensions() != frame.dimensions() {
        let (w, h) = cutout.dimensions();
        return Err(RevealError::SegmentationOutput(format!(
            "cutout is {}x{}, frame is {}x{}",
            w,
            h,
            frame.width(),
            frame.height()
        ))
        .into());
    }
    Ok(alpha_channel(&cutout))
}

fn log_progress(frames: u64) {
    if frames % PROGRESS_INTERVAL == 0 {
        tracing::info!("  Processed {} frames...", frames);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory media and a colour-keyed segmenter for render tests.

    use super::*;
    use anyhow::bail;
    use image::{Rgb, RgbaImage};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Pixels of exactly this colour are reported as the person
    pub const PERSON: Rgb<u8> = Rgb([200, 30, 30]);

    pub struct MemorySource {
        frames: std::vec::IntoIter<RgbImage>,
        properties: VideoProperties,
        fail_at: Option<usize>,
        served: usize,
    }

    impl MemorySource {
        pub fn new(frames: Vec<RgbImage>, width: u32, height: u32) -> Self {
            Self {
                frames: frames.into_iter(),
                properties: VideoProperties {
                    width,
                    height,
                    frame_rate: Some(crate::capture::FrameRate::new(30, 1)),
                },
                fail_at: None,
                served: 0,
            }
        }

        pub fn failing_at(mut self, index: usize) -> Self {
            self.fail_at = Some(index);
            self
        }
    }

    impl FrameSource for MemorySource {
        fn next_frame(&mut self) -> Result<Option<RgbImage>> {
            if self.fail_at == Some(self.served) {
                bail!("decode error at frame {}", self.served);
            }
            self.served += 1;
            Ok(self.frames.next())
        }

        fn properties(&self) -> VideoProperties {
            self.properties
        }
    }

    #[derive(Default)]
    pub struct MemorySink {
        pub frames: Vec<RgbImage>,
        pub finished: bool,
    }

    impl OutputSink for MemorySink {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<u64> {
            self.finished = true;
            Ok(self.frames.len() as u64)
        }

        fn resolution(&self) -> (u32, u32) {
            self.frames.first().map(|f| f.dimensions()).unwrap_or((0, 0))
        }
    }

    /// Sink that hands its frames to a shared map when finished
    struct SharedSink {
        path: PathBuf,
        frames: Vec<RgbImage>,
        store: Rc<RefCell<HashMap<PathBuf, Vec<RgbImage>>>>,
    }

    impl OutputSink for SharedSink {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<u64> {
            let count = self.frames.len() as u64;
            self.store
                .borrow_mut()
                .insert(self.path.clone(), std::mem::take(&mut self.frames));
            Ok(count)
        }

        fn resolution(&self) -> (u32, u32) {
            (0, 0)
        }
    }

    /// Serves the same frames for every pass and records what each sink got
    pub struct MemoryBackend {
        pub frames: Vec<RgbImage>,
        pub width: u32,
        pub height: u32,
        /// Zero-based pass whose source fails on its first read
        pub failing_pass: Option<usize>,
        pub outputs: Rc<RefCell<HashMap<PathBuf, Vec<RgbImage>>>>,
        opened: Cell<usize>,
    }

    impl MemoryBackend {
        pub fn new(frames: Vec<RgbImage>, width: u32, height: u32) -> Self {
            Self {
                frames,
                width,
                height,
                failing_pass: None,
                outputs: Rc::default(),
                opened: Cell::new(0),
            }
        }

        pub fn opened(&self) -> usize {
            self.opened.get()
        }

        pub fn output(&self, path: &Path) -> Option<Vec<RgbImage>> {
            self.outputs.borrow().get(path).cloned()
        }
    }

    impl MediaBackend for MemoryBackend {
        fn open_source(&self, _path: &Path) -> Result<Box<dyn FrameSource>> {
            let pass = self.opened.get();
            self.opened.set(pass + 1);

            let source = MemorySource::new(self.frames.clone(), self.width, self.height);
            if self.failing_pass == Some(pass) {
                return Ok(Box::new(source.failing_at(0)));
            }
            Ok(Box::new(source))
        }

        fn create_sink(&self, path: &Path, _properties: VideoProperties) -> Result<Box<dyn OutputSink>> {
            Ok(Box::new(SharedSink {
                path: path.to_path_buf(),
                frames: Vec::new(),
                store: Rc::clone(&self.outputs),
            }))
        }
    }

    /// Reports full confidence wherever a pixel has the person colour
    #[derive(Default)]
    pub struct ColourKeySegmenter {
        pub calls: usize,
        pub resets: usize,
    }

    impl PersonSegmenter for ColourKeySegmenter {
        fn segment(&mut self, frame: &RgbImage) -> Result<RgbaImage> {
            self.calls += 1;
            let (width, height) = frame.dimensions();
            Ok(RgbaImage::from_fn(width, height, |x, y| {
                let p = frame.get_pixel(x, y);
                let alpha = if *p == PERSON { 255 } else { 0 };
                image::Rgba([p[0], p[1], p[2], alpha])
            }))
        }

        fn reset_state(&mut self) {
            self.resets += 1;
        }

        fn input_size(&self) -> (u32, u32) {
            (0, 0)
        }
    }

    /// Background gradient with a person-coloured rectangle
    pub fn frame_with_person(width: u32, height: u32, rect: (u32, u32, u32, u32)) -> RgbImage {
        let (x0, y0, x1, y1) = rect;
        RgbImage::from_fn(width, height, |x, y| {
            if x >= x0 && x <= x1 && y >= y0 && y <= y1 {
                PERSON
            } else {
                Rgb([(x * 4) as u8, (y * 4) as u8, 90])
            }
        })
    }
}
