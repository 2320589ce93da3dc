use crate::core::error::{DetectError, DetectResult};
use crate::marker_detector::frame::Frame;

/// Seekable, frame-decodable video.
///
/// Implementations own their decode resource and must release it on drop.
pub trait FrameSource {
    /// Total media duration in seconds, 0.0 when unknown.
    fn duration(&self) -> f64;

    /// Next frame in presentation order, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> DetectResult<Option<Frame>>;

    /// Reposition so the next frame returned is the first at or after `seconds`.
    fn seek(&mut self, seconds: f64) -> DetectResult<()>;
}

/// 内存帧源，用于测试和合成数据
pub struct MemorySource {
    frames: Vec<Frame>,
    cursor: usize,
    duration: f64,
    fail_seeks: bool,
    seek_count: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>, duration: f64) -> Self {
        Self {
            frames,
            cursor: 0,
            duration,
            fail_seeks: false,
            seek_count: 0,
        }
    }

    /// Tiny black frames at a constant rate covering `[0, duration)`.
    pub fn blank(duration: f64, fps: f64) -> Self {
        Self::painted(duration, fps, 4, 4, |_| [0, 0, 0])
    }

    /// Solid frames whose color is chosen per timestamp.
    pub fn painted<F>(duration: f64, fps: f64, width: u32, height: u32, paint: F) -> Self
    where
        F: Fn(f64) -> [u8; 3],
    {
        let count = (duration * fps).ceil() as u64;
        let frames = (0..count)
            .map(|n| {
                let t = n as f64 / fps;
                Frame::filled(width, height, paint(t), t, n)
            })
            .collect();
        Self::new(frames, duration)
    }

    pub fn with_failing_seeks(mut self) -> Self {
        self.fail_seeks = true;
        self
    }

    pub fn seek_count(&self) -> usize {
        self.seek_count
    }
}

impl FrameSource for MemorySource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn next_frame(&mut self) -> DetectResult<Option<Frame>> {
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn seek(&mut self, seconds: f64) -> DetectResult<()> {
        self.seek_count += 1;
        if self.fail_seeks {
            return Err(DetectError::decode("seek rejected"));
        }
        self.cursor = self
            .frames
            .iter()
            .position(|f| f.timestamp >= seconds)
            .unwrap_or(self.frames.len());
        Ok(())
    }
}
