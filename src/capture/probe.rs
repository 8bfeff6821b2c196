use super::{FrameRate, VideoProperties};
use crate::error::RevealError;
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Read width, height and frame rate of the first video stream
///
/// A stream with no usable rate still probes successfully; the rate is only
/// needed once a frame has to be encoded.
pub fn probe_video(path: &Path) -> Result<VideoProperties> {
    if !path.exists() {
        return Err(RevealError::InputNotFound(path.to_path_buf()).into());
    }

    which::which("ffprobe").map_err(|_| RevealError::ToolNotFound("ffprobe"))?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        return Err(RevealError::ProbeFailed {
            path: path.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    parse_probe_output(path, &output.stdout)
}

fn parse_probe_output(path: &Path, json: &[u8]) -> Result<VideoProperties> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;
    let probe_failed = |message: &str| RevealError::ProbeFailed {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let stream = probe
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| probe_failed("file has no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(probe_failed("video stream has no dimensions").into()),
    };

    // avg_frame_rate is 0/0 for some containers, r_frame_rate is the fallback
    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));

    if frame_rate.is_none() {
        tracing::warn!("{} reports no frame rate", path.display());
    }

    Ok(VideoProperties {
        width,
        height,
        frame_rate,
    })
}

/// Parse an ffprobe rate such as `30000/1001`, `25` or `29.97`
pub fn parse_frame_rate(rate: &str) -> Option<FrameRate> {
    let rate = rate.trim();
    let parsed = match rate.split_once('/') {
        Some((num, den)) => FrameRate::new(num.trim().parse().ok()?, den.trim().parse().ok()?),
        None => match rate.parse::<u32>() {
            Ok(whole) => FrameRate::new(whole, 1),
            Err(_) => {
                let fps: f64 = rate.parse().ok()?;
                if !fps.is_finite() || fps <= 0.0 || fps > 1_000_000.0 {
                    return None;
                }
                FrameRate::new((fps * 1000.0).round() as u32, 1000)
            }
        },
    };

    (parsed.num > 0 && parsed.den > 0).then_some(parsed)
}
