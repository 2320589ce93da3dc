//! 边缘精扫: 在粗采样检测到状态翻转时，回退一小段逐帧重扫

use log::{debug, warn};

use crate::core::cancel::CancelToken;
use crate::core::error::{DetectError, DetectResult};
use crate::marker_detector::frame::Frame;
use crate::marker_detector::source::FrameSource;

#[derive(Debug, Clone, Copy)]
pub struct PrecisionRefiner {
    /// How far before the coarse edge to rewind.
    window: f64,
    /// A rescanned frame counts as a hit above this confidence.
    hit_threshold: f32,
}

impl PrecisionRefiner {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            hit_threshold: 0.5,
        }
    }

    pub fn window(&self) -> f64 {
        self.window
    }

    /// Rescan `[target - window, target)` at native frame rate, appending hit
    /// timestamps to `hits`. Best effort: failures are logged, never returned.
    ///
    /// Leaves the source positioned at or just past `target`.
    pub fn refine<F>(
        &self,
        source: &mut dyn FrameSource,
        target: f64,
        token: &CancelToken,
        hits: &mut Vec<f64>,
        confidence: F,
    ) -> usize
    where
        F: FnMut(&Frame) -> f32,
    {
        if target < self.window {
            return 0;
        }

        let before = hits.len();
        match self.scan_window(source, target, token, hits, confidence) {
            Ok(()) => {}
            Err(DetectError::Cancelled) => debug!("⏹️ refinement @{:.3}s cancelled", target),
            Err(e) => warn!("⚠️ refinement @{:.3}s failed: {}", target, e),
        }
        let added = hits.len() - before;
        debug!("🔬 refined edge @{:.3}s: {} extra hits", target, added);
        added
    }

    fn scan_window<F>(
        &self,
        source: &mut dyn FrameSource,
        target: f64,
        token: &CancelToken,
        hits: &mut Vec<f64>,
        mut confidence: F,
    ) -> DetectResult<()>
    where
        F: FnMut(&Frame) -> f32,
    {
        token.check()?;
        source.seek((target - self.window).max(0.0))?;

        loop {
            token.check()?;
            let Some(frame) = source.next_frame()? else {
                // stalled before reaching the edge
                return Ok(());
            };
            if frame.timestamp >= target {
                return Ok(());
            }
            if confidence(&frame) > self.hit_threshold {
                hits.push(frame.timestamp);
            }
        }
    }
}

impl Default for PrecisionRefiner {
    fn default() -> Self {
        Self::new(0.2)
    }
}
