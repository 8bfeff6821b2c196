use super::{probe_video, FrameSource, VideoProperties};
use crate::error::RevealError;
use crate::process::StderrDrain;
use anyhow::{Context, Result};
use image::RgbImage;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

/// Decodes a video file to packed RGB24 frames through an ffmpeg child process
#[derive(Debug)]
pub struct FfmpegFrameReader {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<StderrDrain>,
    properties: VideoProperties,
    frames_read: u64,
    finished: bool,
}

impl FfmpegFrameReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let properties = probe_video(path)
            .with_context(|| format!("Failed to probe {}", path.display()))?;
        which::which("ffmpeg").map_err(|_| RevealError::ToolNotFound("ffmpeg"))?;

        tracing::debug!(
            "Opening {} ({}x{} @ {:.2} fps)",
            path.display(),
            properties.width,
            properties.height,
            properties.fps()
        );

        // Autorotation would swap the dimensions reported by ffprobe
        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RevealError::ffmpeg_failed(format!("Failed to spawn decoder: {}", e), None, None))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RevealError::ffmpeg_failed("Failed to capture decoder stdout", None, None))?;
        let stderr = StderrDrain::spawn(child.stderr.take());

        Ok(Self {
            child,
            stdout,
            stderr: Some(stderr),
            properties,
            frames_read: 0,
            finished: false,
        })
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let status = self.child.wait().context("Failed to wait for decoder")?;
        let stderr = self.stderr.take().map(StderrDrain::collect).unwrap_or_default();
        if !status.success() {
            return Err(RevealError::ffmpeg_failed(
                format!("Decoder exited after {} frames", self.frames_read),
                Some(stderr),
                status.code(),
            )
            .into());
        }
        tracing::debug!("Decoder finished after {} frames", self.frames_read);
        Ok(())
    }
}

impl FrameSource for FfmpegFrameReader {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.properties.frame_bytes()];
        let filled = read_full(&mut self.stdout, &mut buffer).context("Failed to read decoded frame")?;

        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }
        if filled < buffer.len() {
            self.finished = true;
            let _ = self.child.wait();
            let stderr = self.stderr.take().map(StderrDrain::collect).unwrap_or_default();
            if !stderr.is_empty() {
                tracing::warn!("Decoder reported: {}", stderr);
            }
            return Err(RevealError::TruncatedFrame {
                expected: buffer.len(),
                actual: filled,
            }
            .into());
        }

        self.frames_read += 1;
        let frame = RgbImage::from_raw(self.properties.width, self.properties.height, buffer)
            .ok_or(RevealError::TruncatedFrame {
                expected: self.properties.frame_bytes(),
                actual: filled,
            })?;
        Ok(Some(frame))
    }

    fn properties(&self) -> VideoProperties {
        self.properties
    }
}

impl Drop for FfmpegFrameReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        if let Some(stderr) = self.stderr.take() {
            stderr.collect();
        }
    }
}

/// Fill `buf` as far as the stream allows, returning the byte count
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
