use super::OutputSink;
use crate::capture::VideoProperties;
use crate::config::EncoderConfig;
use crate::error::RevealError;
use crate::process::StderrDrain;
use anyhow::{Context, Result};
use image::RgbImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// A running encoder child with its input pipe and stderr collector
struct Encoder {
    child: Child,
    stdin: ChildStdin,
    stderr: StderrDrain,
}

impl Encoder {
    /// Close stdin, wait for exit and gather stderr
    fn close(self) -> Result<(std::process::ExitStatus, String)> {
        let Encoder {
            mut child,
            stdin,
            stderr,
        } = self;
        // Closing stdin signals end of stream
        drop(stdin);
        let status = child.wait().context("Failed to wait for encoder")?;
        Ok((status, stderr.collect()))
    }
}

/// Encodes RGB24 frames into a video file through an ffmpeg child process
///
/// The encoder is spawned on the first frame, so a pass that writes no
/// frames leaves no file behind.
pub struct FfmpegVideoWriter {
    path: PathBuf,
    properties: VideoProperties,
    encoder: EncoderConfig,
    process: Option<Encoder>,
    frames_written: u64,
}

impl FfmpegVideoWriter {
    pub fn new<P: AsRef<Path>>(path: P, properties: VideoProperties, encoder: EncoderConfig) -> Result<Self> {
        which::which("ffmpeg").map_err(|_| RevealError::ToolNotFound("ffmpeg"))?;

        let path = path.as_ref().to_path_buf();
        tracing::debug!(
            "Preparing encoder for {} ({}x{} @ {:.2} fps, {})",
            path.display(),
            properties.width,
            properties.height,
            properties.fps(),
            encoder.codec
        );

        Ok(Self {
            path,
            properties,
            encoder,
            process: None,
            frames_written: 0,
        })
    }

    fn build_args(&self) -> Result<Vec<String>> {
        let VideoProperties {
            width,
            height,
            frame_rate,
        } = self.properties;
        let frame_rate = frame_rate.ok_or_else(|| RevealError::MissingFrameRate(self.path.clone()))?;
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.extend([
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            frame_rate.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-an".to_string(),
            // yuv420p needs even dimensions; a no-op for even-sized sources
            "-vf".to_string(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
            "-c:v".to_string(),
            self.encoder.codec.clone(),
            "-preset".to_string(),
            self.encoder.preset.clone(),
            "-crf".to_string(),
            self.encoder.crf.to_string(),
            "-pix_fmt".to_string(),
            self.encoder.pixel_format.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);
        args.push(self.path.to_string_lossy().to_string());
        Ok(args)
    }

    fn spawn(&self) -> Result<Encoder> {
        let mut child = Command::new("ffmpeg")
            .args(self.build_args()?)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RevealError::ffmpeg_failed(format!("Failed to spawn encoder: {}", e), None, None))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RevealError::ffmpeg_failed("Failed to capture encoder stdin", None, None))?;
        let stderr = StderrDrain::spawn(child.stderr.take());
        tracing::debug!("Encoder started for {}", self.path.display());
        Ok(Encoder {
            child,
            stdin,
            stderr,
        })
    }

    fn stdin(&mut self) -> Result<&mut ChildStdin> {
        if self.process.is_none() {
            self.process = Some(self.spawn()?);
        }
        self.process
            .as_mut()
            .map(|encoder| &mut encoder.stdin)
            .ok_or_else(|| RevealError::ffmpeg_failed("Encoder is not running", None, None).into())
    }

    /// Turn a failed pipe write into an error carrying the encoder's own output
    fn write_failed(&mut self, error: std::io::Error) -> anyhow::Error {
        let message = format!(
            "Encoder stopped accepting frames for {} after {} frames: {}",
            self.path.display(),
            self.frames_written,
            error
        );
        match self.process.take().map(Encoder::close) {
            Some(Ok((status, stderr))) => RevealError::ffmpeg_failed(message, Some(stderr), status.code()).into(),
            Some(Err(e)) => e.context(message),
            None => RevealError::ffmpeg_failed(message, None, None).into(),
        }
    }
}

impl OutputSink for FfmpegVideoWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let (width, height) = frame.dimensions();
        if (width, height) != self.resolution() {
            return Err(RevealError::FrameSizeMismatch {
                width: self.properties.width,
                height: self.properties.height,
                actual_width: width,
                actual_height: height,
            }
            .into());
        }

        let stdin = self.stdin()?;
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            return Err(self.write_failed(e));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<u64> {
        let Some(encoder) = self.process.take() else {
            tracing::debug!("No frames written, skipping {}", self.path.display());
            return Ok(0);
        };

        let (status, stderr) = encoder.close()?;
        if !status.success() {
            return Err(RevealError::ffmpeg_failed(
                format!("Encoder failed for {}", self.path.display()),
                Some(stderr),
                status.code(),
            )
            .into());
        }

        Ok(self.frames_written)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.properties.width, self.properties.height)
    }
}

impl Drop for FfmpegVideoWriter {
    fn drop(&mut self) {
        if let Some(Encoder {
            mut child,
            stdin,
            stderr,
        }) = self.process.take()
        {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            stderr.collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameRate;

    fn writer(width: u32, height: u32) -> FfmpegVideoWriter {
        FfmpegVideoWriter {
            path: PathBuf::from("out/level1.mp4"),
            properties: VideoProperties {
                width,
                height,
                frame_rate: Some(FrameRate::new(30000, 1001)),
            },
            encoder: EncoderConfig::default(),
            process: None,
            frames_written: 0,
        }
    }

    #[test]
    fn test_build_args_preserves_geometry_and_rate() {
        let args = writer(1280, 720).build_args().unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-s 1280x720"));
        assert!(joined.contains("-r 30000/1001"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert_eq!(args.last().map(String::as_str), Some("out/level1.mp4"));
    }

    #[test]
    fn test_finish_without_frames_is_empty() {
        let mut w = writer(4, 4);
        assert_eq!(w.finish().unwrap(), 0);
    }

    #[test]
    fn test_unknown_rate_is_fine_until_a_frame_arrives() {
        let mut w = writer(4, 4);
        w.properties.frame_rate = None;
        assert_eq!(w.finish().unwrap(), 0);

        let err = w.write_frame(&RgbImage::new(4, 4)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RevealError>(),
            Some(RevealError::MissingFrameRate(_))
        ));
        assert!(w.process.is_none());
    }

    #[test]
    fn test_encoder_failure_reports_stderr() {
        if which::which("ffmpeg").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(16, 16);
        w.path = dir.path().join("level1.mp4");
        w.encoder.codec = "no_such_codec".to_string();

        // The bad codec makes ffmpeg exit at startup; the error surfaces on a
        // write once the pipe closes, or on finish if the pipe buffer absorbed
        // every frame
        let frame = RgbImage::new(16, 16);
        let err = (0..500)
            .find_map(|_| w.write_frame(&frame).err())
            .or_else(|| w.finish().err())
            .expect("encoder with an unknown codec should fail");

        let message = format!("{:#}", err);
        assert!(message.contains("no_such_codec"), "{}", message);
        assert!(w.process.is_none());
    }

    #[test]
    fn test_rejects_mismatched_frame() {
        let mut w = writer(4, 4);
        let err = w.write_frame(&RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RevealError>(),
            Some(RevealError::FrameSizeMismatch { .. })
        ));
    }
}
