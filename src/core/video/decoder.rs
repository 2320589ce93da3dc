//! ffmpeg 子进程解码：rawvideo rgb24 管道逐帧读取

use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::core::batch::{SourceOpener, VideoAsset};
use crate::core::error::{DetectError, DetectResult};
use crate::core::video::probe::{locate_tool, probe_video, ProbeConfig, VideoInfo};
use crate::marker_detector::frame::Frame;
use crate::marker_detector::source::{FrameSource, MemorySource};

/// Output size for a `width`x`height` video scaled down to `target` width.
///
/// Never upscales. Height keeps the aspect ratio and is rounded down to even.
pub fn scaled_dimensions(width: u32, height: u32, target: Option<u32>) -> (u32, u32) {
    match target {
        Some(t) if t > 0 && width > t => {
            let h = (height as u64 * t as u64 / width as u64) as u32;
            (t, (h & !1).max(2))
        }
        _ => (width, height),
    }
}

pub struct FfmpegSource {
    ffmpeg: PathBuf,
    path: PathBuf,
    info: VideoInfo,
    out_width: u32,
    out_height: u32,
    child: Option<Child>,
    reader: Option<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
    /// Set once ffmpeg reached end of stream and exited cleanly.
    finished: bool,
    base_time: f64,
    index: u64,
}

impl FfmpegSource {
    /// Decode with the ffmpeg found on PATH.
    pub fn open(
        path: impl AsRef<Path>,
        info: VideoInfo,
        process_width: Option<u32>,
    ) -> DetectResult<Self> {
        Self::open_with(None, path, info, process_width)
    }

    /// Decode with an explicit ffmpeg binary, or the one on PATH when `None`.
    pub fn open_with(
        ffmpeg: Option<&Path>,
        path: impl AsRef<Path>,
        info: VideoInfo,
        process_width: Option<u32>,
    ) -> DetectResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DetectError::SourceNotFound(path));
        }
        if info.width == 0 || info.height == 0 {
            return Err(DetectError::decode(format!(
                "unknown frame size for {}",
                path.display()
            )));
        }

        let ffmpeg = locate_tool("ffmpeg", ffmpeg)?;
        let (out_width, out_height) = scaled_dimensions(info.width, info.height, process_width);

        let mut source = Self {
            ffmpeg,
            path,
            info,
            out_width,
            out_height,
            child: None,
            reader: None,
            stderr: None,
            finished: false,
            base_time: 0.0,
            index: 0,
        };
        source.spawn(0.0)?;

        info!(
            "🎞️ decoding {} at {}x{} ({:.2} fps)",
            source.path.display(),
            out_width,
            out_height,
            source.info.fps
        );
        Ok(source)
    }

    fn spawn(&mut self, start: f64) -> DetectResult<()> {
        self.stop();
        self.finished = false;

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-v", "error", "-nostdin"]);
        if start > 0.0 {
            cmd.args(["-ss", &format!("{:.3}", start)]);
        }
        cmd.arg("-i")
            .arg(&self.path)
            .args([
                "-an",
                "-vf",
                &format!("scale={}:{}", self.out_width, self.out_height),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            DetectError::decode(format!(
                "failed to start ffmpeg for {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        self.child = Some(child);

        let stdout = stdout.ok_or_else(|| DetectError::decode("ffmpeg stdout unavailable"))?;
        self.reader = Some(BufReader::with_capacity(self.frame_len() * 2, stdout));
        self.stderr = stderr.map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).trim().to_string()
            })
        });
        self.base_time = start;
        self.index = 0;
        Ok(())
    }

    fn stop(&mut self) {
        self.reader = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.stderr = None;
    }

    /// Reap ffmpeg after its output pipe closed; a non-zero exit is a decode error.
    fn finish_stream(&mut self) -> DetectResult<()> {
        self.reader = None;
        let status = match self.child.take() {
            Some(mut child) => Some(child.wait()?),
            None => None,
        };
        let message = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        match status {
            Some(status) if !status.success() => Err(DetectError::decode(format!(
                "ffmpeg exited with {} for {}: {}",
                status,
                self.path.display(),
                message
            ))),
            _ => {
                self.finished = true;
                Ok(())
            }
        }
    }

    fn frame_len(&self) -> usize {
        self.out_width as usize * self.out_height as usize * 3
    }

    fn fps(&self) -> f64 {
        if self.info.fps > 0.0 {
            self.info.fps
        } else {
            30.0
        }
    }
}

impl FrameSource for FfmpegSource {
    fn duration(&self) -> f64 {
        self.info.duration
    }

    fn next_frame(&mut self) -> DetectResult<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        let len = self.frame_len();
        let Some(reader) = self.reader.as_mut() else {
            return Err(DetectError::decode(format!(
                "decoder for {} is not running",
                self.path.display()
            )));
        };

        let mut data = vec![0u8; len];
        match reader.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.finish_stream()?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let fps = self.fps();
        let timestamp = self.base_time + self.index as f64 / fps;
        self.index += 1;

        Ok(Some(Frame::new(
            self.out_width,
            self.out_height,
            data,
            timestamp,
            (timestamp * fps).round() as u64,
        )))
    }

    fn seek(&mut self, seconds: f64) -> DetectResult<()> {
        debug!("⏩ seek {} to {:.3}s", self.path.display(), seconds);
        self.spawn(seconds.max(0.0))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop();
        debug!("🗑️ released decoder for {}", self.path.display());
    }
}

/// Opens assets through ffprobe + ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    pub process_width: Option<u32>,
    pub probe: ProbeConfig,
    /// Explicit ffmpeg binary; looked up on PATH when unset.
    pub ffmpeg: Option<PathBuf>,
}

impl Default for FfmpegOpener {
    fn default() -> Self {
        Self {
            process_width: Some(640),
            probe: ProbeConfig::default(),
            ffmpeg: None,
        }
    }
}

impl SourceOpener for FfmpegOpener {
    fn ensure_available(&self) -> DetectResult<()> {
        locate_tool("ffmpeg", self.ffmpeg.as_deref())?;
        self.probe.ffprobe_path()?;
        Ok(())
    }

    /// Metadata that could not be loaded (timeout, no frame size, zero
    /// duration) yields an empty zero-duration source rather than an error.
    fn open(&self, asset: &VideoAsset) -> DetectResult<Box<dyn FrameSource>> {
        let mut info = probe_video(&asset.path, &self.probe)?;
        if info.width == 0 || info.height == 0 {
            warn!("⚠️ no metadata for {}, treating as empty", asset.file_name);
            return Ok(Box::new(MemorySource::new(Vec::new(), 0.0)));
        }
        if asset.duration_seconds > 0.0 {
            info.duration = asset.duration_seconds;
        }
        if info.duration <= 0.0 {
            warn!("⚠️ {} has zero duration, treating as empty", asset.file_name);
            return Ok(Box::new(MemorySource::new(Vec::new(), 0.0)));
        }

        Ok(Box::new(FfmpegSource::open_with(
            self.ffmpeg.as_deref(),
            &asset.path,
            info,
            self.process_width,
        )?))
    }
}
