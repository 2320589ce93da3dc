//! ffprobe 元数据探测（带超时）

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::core::error::{DetectError, DetectResult};

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Metadata that takes longer than this is treated as a zero-duration asset.
    pub timeout: Duration,
    /// Explicit ffprobe binary; looked up on PATH when unset.
    pub ffprobe: Option<PathBuf>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ffprobe: None,
        }
    }
}

impl ProbeConfig {
    pub fn ffprobe_path(&self) -> DetectResult<PathBuf> {
        locate_tool("ffprobe", self.ffprobe.as_deref())
    }
}

/// `explicit` if it is a file, otherwise a PATH lookup for `name`.
pub(crate) fn locate_tool(name: &str, explicit: Option<&Path>) -> DetectResult<PathBuf> {
    match explicit {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(DetectError::DecodeUnavailable(format!(
            "{}: {} does not exist",
            name,
            path.display()
        ))),
        None => which::which(name)
            .map_err(|e| DetectError::DecodeUnavailable(format!("{}: {}", name, e))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a video file. `Ok(VideoInfo::default())` when ffprobe stalls past the timeout.
pub fn probe_video(path: impl AsRef<Path>, config: &ProbeConfig) -> DetectResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DetectError::SourceNotFound(path.to_path_buf()));
    }

    let ffprobe = config.ffprobe_path()?;

    let mut child = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| DetectError::decode("ffprobe stdout unavailable"))?;

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = stdout.read_to_end(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });

    let output = match rx.recv_timeout(config.timeout) {
        Ok(result) => result?,
        Err(_) => {
            warn!(
                "⏱️ ffprobe timed out after {:?} on {}, treating as zero duration",
                config.timeout,
                path.display()
            );
            let _ = child.kill();
            let _ = child.wait();
            return Ok(VideoInfo::default());
        }
    };

    let status = child.wait()?;
    if !status.success() {
        return Err(DetectError::decode(format!(
            "ffprobe exited with {} for {}",
            status,
            path.display()
        )));
    }

    let info = parse_probe_output(&output)?;
    debug!("📐 probed {}: {:?}", path.display(), info);
    Ok(info)
}

/// Duration only; any probe failure becomes 0.0 (a degenerate asset, not an error).
pub fn probe_duration(path: impl AsRef<Path>, config: &ProbeConfig) -> f64 {
    let path = path.as_ref();
    match probe_video(path, config) {
        Ok(info) if info.duration.is_finite() => info.duration,
        Ok(_) => 0.0,
        Err(e) => {
            warn!("⚠️ could not probe {}: {}", path.display(), e);
            0.0
        }
    }
}

fn parse_probe_output(json: &[u8]) -> DetectResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| DetectError::decode("no video stream found"))?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        fps,
    })
}

/// "30000/1001" or "29.97"; `None` for zero or malformed rates.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("abc").is_none());
    }

    #[test]
    fn test_parse_metadata_output() {
        let json = br#"{
            "format": {"duration": "123.456"},
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "avg_frame_rate": "0/0", "r_frame_rate": "60/1"}
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.duration - 123.456).abs() < 1e-9);
        assert!((info.fps - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_metadata_without_video_stream() {
        let json = br#"{"format": {"duration": "3.0"}, "streams": [{"codec_type": "audio"}]}"#;
        assert!(parse_probe_output(json).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = probe_video("/definitely/not/here.mp4", &ProbeConfig::default()).unwrap_err();
        assert!(matches!(err, DetectError::SourceNotFound(_)));
        assert_eq!(probe_duration("/definitely/not/here.mp4", &ProbeConfig::default()), 0.0);
    }
}
