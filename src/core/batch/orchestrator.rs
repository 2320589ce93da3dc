//! 串行批处理：一次只分析一个视频，单项失败不影响整批

use std::collections::HashSet;

use log::{error, info, warn};
use serde::Serialize;

use crate::core::batch::queue::{BatchQueue, ProcessingStatus, VideoAsset};
use crate::core::cancel::{CancelToken, RunSlot};
use crate::core::error::{DetectError, DetectResult};
use crate::marker_detector::classifier::MarkerClassifier;
use crate::marker_detector::pipeline::{MarkerScanner, ScanConfig};
use crate::marker_detector::profile::find_profile;
use crate::marker_detector::ranges::{
    calculate_keep_ranges, DetectionRange, KeepRange, KeepRangeConfig,
};
use crate::marker_detector::source::{FrameSource, MemorySource};

/// Turns a queued asset into a frame source.
pub trait SourceOpener: Send + Sync {
    /// `Err(DecodeUnavailable)` when no asset can be opened at all.
    fn ensure_available(&self) -> DetectResult<()>;

    /// The returned source's duration is the one keep ranges are computed
    /// against; a zero-duration source yields no keep ranges.
    fn open(&self, asset: &VideoAsset) -> DetectResult<Box<dyn FrameSource>>;
}

/// Blank in-memory sources sized by each asset's duration.
pub struct MemoryOpener {
    fps: f64,
    available: bool,
    missing: HashSet<String>,
}

impl MemoryOpener {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            available: true,
            missing: HashSet::new(),
        }
    }

    /// Opener whose decoder is reported unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(10.0)
        }
    }

    /// Assets with this file name fail with `SourceNotFound`.
    pub fn without(mut self, file_name: &str) -> Self {
        self.missing.insert(file_name.to_string());
        self
    }
}

impl SourceOpener for MemoryOpener {
    fn ensure_available(&self) -> DetectResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(DetectError::DecodeUnavailable("memory decoder disabled".into()))
        }
    }

    fn open(&self, asset: &VideoAsset) -> DetectResult<Box<dyn FrameSource>> {
        self.ensure_available()?;
        if self.missing.contains(&asset.file_name) {
            return Err(DetectError::SourceNotFound(asset.path.clone()));
        }
        Ok(Box::new(MemorySource::blank(asset.duration_seconds, self.fps)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAnalysis {
    pub detections: Vec<DetectionRange>,
    pub keep_ranges: Vec<KeepRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

pub struct BatchOrchestrator {
    classifier: Box<dyn MarkerClassifier>,
    opener: Box<dyn SourceOpener>,
    scan_config: ScanConfig,
    keep_config: KeepRangeConfig,
    run_slot: RunSlot,
}

impl BatchOrchestrator {
    pub fn new(classifier: Box<dyn MarkerClassifier>, opener: Box<dyn SourceOpener>) -> Self {
        Self {
            classifier,
            opener,
            scan_config: ScanConfig::default(),
            keep_config: KeepRangeConfig::default(),
            run_slot: RunSlot::new(),
        }
    }

    pub fn with_scan_config(mut self, config: ScanConfig) -> Self {
        self.scan_config = config;
        self
    }

    pub fn with_keep_config(mut self, config: KeepRangeConfig) -> Self {
        self.keep_config = config;
        self
    }

    /// Share a run slot so another owner can cancel runs of this orchestrator.
    pub fn with_run_slot(mut self, slot: RunSlot) -> Self {
        self.run_slot = slot;
        self
    }

    pub fn cancel_handle(&self) -> RunSlot {
        self.run_slot.clone()
    }

    pub fn cancel(&self) -> bool {
        self.run_slot.cancel_active()
    }

    /// Analyze a single asset. Supersedes any run still in flight.
    pub fn process_video(
        &self,
        asset: &VideoAsset,
        profile_id: &str,
        progress: &mut dyn FnMut(u32),
    ) -> DetectResult<VideoAnalysis> {
        let token = self.run_slot.begin();
        let result = self.analyze(asset, profile_id, &token, progress);
        self.run_slot.finish(&token);
        result
    }

    /// Process every unfinished item in order.
    ///
    /// Per-item failures mark the item `Error` and the batch moves on; a
    /// fatal failure (no decoder) aborts the run; cancellation puts the
    /// current item back to `Pending` and stops.
    pub fn process_queue(
        &self,
        queue: &mut BatchQueue,
        profile_id: &str,
        progress: &mut dyn FnMut(&str, u32),
    ) -> DetectResult<BatchSummary> {
        self.opener.ensure_available()?;

        let token = self.run_slot.begin();
        let mut summary = BatchSummary::default();

        info!("📦 batch start: {} item(s), profile {}", queue.len(), profile_id);

        for id in queue.ids() {
            let asset = match queue.get_mut(&id) {
                Some(item) if item.is_done() => {
                    summary.skipped += 1;
                    continue;
                }
                Some(item) => {
                    item.status = ProcessingStatus::Processing;
                    item.progress = 0;
                    item.asset.clone()
                }
                None => continue,
            };
            progress(&id, 0);

            let result = self.analyze(&asset, profile_id, &token, &mut |p| {
                if let Some(item) = queue.get_mut(&id) {
                    item.progress = p;
                }
                progress(&id, p);
            });

            let Some(item) = queue.get_mut(&id) else {
                continue;
            };
            match result {
                Ok(analysis) => {
                    item.status = ProcessingStatus::Completed;
                    item.progress = 100;
                    item.detections = analysis.detections;
                    item.keep_ranges = analysis.keep_ranges;
                    summary.completed += 1;
                }
                Err(DetectError::Cancelled) => {
                    warn!("⏹️ batch cancelled during {}", asset.file_name);
                    item.status = ProcessingStatus::Pending;
                    item.progress = 0;
                    summary.cancelled = true;
                    break;
                }
                Err(e) if e.is_fatal() => {
                    error!("❌ batch aborted on {}: {}", asset.file_name, e);
                    item.status = ProcessingStatus::Error;
                    self.run_slot.finish(&token);
                    return Err(e);
                }
                Err(e) => {
                    error!("❌ {} failed: {}", asset.file_name, e);
                    item.status = ProcessingStatus::Error;
                    summary.failed += 1;
                }
            }
        }

        self.run_slot.finish(&token);
        info!(
            "🏁 batch done: {} completed, {} failed, {} skipped{}",
            summary.completed,
            summary.failed,
            summary.skipped,
            if summary.cancelled { " (cancelled)" } else { "" }
        );
        Ok(summary)
    }

    fn analyze(
        &self,
        asset: &VideoAsset,
        profile_id: &str,
        token: &CancelToken,
        progress: &mut dyn FnMut(u32),
    ) -> DetectResult<VideoAnalysis> {
        let profile = find_profile(profile_id)?;
        let mut scanner = MarkerScanner::with_config(self.scan_config.clone());

        // the source lives only for this block and is released before the next item
        let (detections, duration) = {
            let mut source = self.opener.open(asset)?;
            let result = scanner.scan(
                source.as_mut(),
                self.classifier.as_ref(),
                profile,
                token,
                progress,
            )?;
            (result.detections, source.duration())
        };

        let keep_ranges = calculate_keep_ranges(&detections, duration, &self.keep_config);
        info!(
            "✂️ {}: {} detection(s), {} keep range(s)",
            asset.file_name,
            detections.len(),
            keep_ranges.len()
        );
        Ok(VideoAnalysis {
            detections,
            keep_ranges,
        })
    }
}
