mod batch;
mod capture;
mod config;
mod error;
mod head;
mod mask;
mod output;
mod process;
mod render;
mod segmentation;

use anyhow::{Context, Result};
use clap::Parser;
use config::{BatchConfig, BlurConfig, EncoderConfig, MaskConfig, PipelineConfig};
use render::FfmpegBackend;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the person segmentation model (ONNX file, e.g. u2net_human_seg.onnx)
    #[arg(short, long)]
    model: String,

    /// Folder scanned for *.mp4 source videos
    #[arg(short, long, default_value = "videos_to_process")]
    input_dir: PathBuf,

    /// Folder receiving <name>/level1.mp4, level2.mp4 and original.mp4
    #[arg(short, long, default_value = "videos")]
    output_dir: PathBuf,

    /// Folder fully processed sources are moved to
    #[arg(long, default_value = "completed-videos")]
    completed_dir: PathBuf,

    /// Render a single video instead of scanning the input folder
    /// The source is left in place
    #[arg(long)]
    video: Option<PathBuf>,

    /// Alpha values above this count as person (lower keeps the club attached)
    #[arg(long, default_value_t = 5)]
    alpha_threshold: u8,

    /// Gaussian sigma for the head blur
    #[arg(long, default_value_t = 30.0)]
    blur_sigma: f32,

    /// H.264 constant rate factor for encoded levels
    #[arg(long, default_value_t = 18)]
    crf: u8,

    /// Milliseconds to wait before retrying a failed move
    #[arg(long, default_value_t = 2000)]
    retry_delay_ms: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("swing-reveal starting");

    let pipeline = PipelineConfig {
        mask: MaskConfig {
            alpha_threshold: args.alpha_threshold,
            ..MaskConfig::default()
        },
        blur: BlurConfig {
            sigma: args.blur_sigma,
        },
        encoder: EncoderConfig {
            crf: args.crf,
            ..EncoderConfig::default()
        },
        ..PipelineConfig::default()
    };
    tracing::info!(
        "Alpha threshold: {}, blur sigma: {}",
        pipeline.mask.alpha_threshold,
        pipeline.blur.sigma
    );

    tracing::info!("Loading segmentation model from {}", args.model);
    let mut segmenter = segmentation::create_default_model(&args.model)
        .context("Failed to load segmentation model")?;
    let (model_width, model_height) = segmenter.input_size();
    tracing::info!("Model input: {}x{}", model_width, model_height);

    let backend = FfmpegBackend::new(pipeline.encoder.clone());

    if let Some(video) = &args.video {
        let reports = render::render_all_levels(
            video,
            &args.output_dir,
            &backend,
            segmenter.as_mut(),
            &pipeline,
        )?;
        let failed = reports.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            anyhow::bail!("{} level(s) failed for {}", failed, video.display());
        }
        tracing::info!("All levels complete for {}", video.display());
        return Ok(());
    }

    let batch = BatchConfig {
        input_dir: args.input_dir,
        output_dir: args.output_dir,
        completed_dir: args.completed_dir,
        retry_delay: Duration::from_millis(args.retry_delay_ms),
    };

    let summary = batch::run_batch(&batch, &pipeline, &backend, segmenter.as_mut())?;
    if !summary.is_clean() {
        anyhow::bail!(
            "{} level(s) failed, {} video(s) skipped, {} of {} moved",
            summary.failed_levels,
            summary.skipped,
            summary.moved,
            summary.videos
        );
    }

    tracing::info!("All {} video(s) complete", summary.videos);
    Ok(())
}
