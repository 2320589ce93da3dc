//! 批量视频分析队列

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use flutter_rust_bridge::frb;
use log::info;

use crate::core::batch::{
    BatchOrchestrator, BatchQueue, BatchSummary, ProcessingStatus, QueueItem, SourceOpener,
    VideoAsset,
};
use crate::core::cancel::RunSlot;
use crate::core::error::DetectResult;
use crate::core::manifest::{read_manifest, write_manifest};
use crate::core::video::{probe_duration, FfmpegOpener, ProbeConfig};
use crate::marker_detector::classifier::{FrameClassifier, MarkerClassifier};
use crate::marker_detector::ranges::{DetectionRange, KeepRange};

/// 队列项快照（给 UI 显示）
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItemView {
    pub id: String,
    pub file_name: String,
    pub path: String,
    pub duration_seconds: f64,
    pub status: ProcessingStatus,
    pub progress: u32,
    pub detections: Vec<DetectionRange>,
    pub keep_ranges: Vec<KeepRange>,
}

impl From<&QueueItem> for QueueItemView {
    fn from(item: &QueueItem) -> Self {
        Self {
            id: item.id.clone(),
            file_name: item.asset.file_name.clone(),
            path: item.asset.path.to_string_lossy().into_owned(),
            duration_seconds: item.asset.duration_seconds,
            status: item.status,
            progress: item.progress,
            detections: item.detections.clone(),
            keep_ranges: item.keep_ranges.clone(),
        }
    }
}

/// 视频批处理 - 串行检测 + 剪辑清单导出
///
/// ```dart
/// final batch = VideoBatch.create();
/// await batch.addVideos(paths: files);
/// await batch.process(profileId: "c6a-16-9");
/// final manifest = await batch.exportManifest(dir: outDir);
/// ```
#[frb(opaque)]
pub struct VideoBatch {
    queue: Mutex<BatchQueue>,
    orchestrator: BatchOrchestrator,
    cancel: RunSlot,
    probe: ProbeConfig,
}

impl VideoBatch {
    /// 创建批处理（ffmpeg 解码 + CPU HSV 分类）
    #[frb(sync)]
    pub fn create() -> Self {
        crate::init_logging();
        info!("🎬 VideoBatch: created");
        Self::with_parts(
            Box::new(FrameClassifier::default()),
            Box::new(FfmpegOpener::default()),
        )
    }

    #[frb(ignore)]
    pub fn with_parts(
        classifier: Box<dyn MarkerClassifier>,
        opener: Box<dyn SourceOpener>,
    ) -> Self {
        let cancel = RunSlot::new();
        Self {
            queue: Mutex::new(BatchQueue::new()),
            orchestrator: BatchOrchestrator::new(classifier, opener).with_run_slot(cancel.clone()),
            cancel,
            probe: ProbeConfig::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BatchQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 添加视频（探测时长，超时按 0 处理），返回新队列项 id
    #[frb]
    pub fn add_videos(&self, paths: Vec<String>) -> Vec<String> {
        let assets: Vec<VideoAsset> = paths
            .iter()
            .map(|p| VideoAsset::new(p, probe_duration(p, &self.probe)))
            .collect();
        self.add_assets(assets)
    }

    #[frb(ignore)]
    pub fn add_assets(&self, assets: Vec<VideoAsset>) -> Vec<String> {
        let mut queue = self.lock();
        assets.into_iter().map(|a| queue.push(a)).collect()
    }

    #[frb(sync)]
    pub fn remove(&self, id: String) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// 串行处理所有未完成项
    ///
    /// 处理在队列快照上进行，UI 可随时读取进度或取消。
    #[frb]
    pub fn process(&self, profile_id: String) -> DetectResult<BatchSummary> {
        let mut work = self.lock().clone();

        let result = self.orchestrator.process_queue(&mut work, &profile_id, &mut |id, p| {
            if let Some(item) = self.lock().get_mut(id) {
                item.status = ProcessingStatus::Processing;
                item.progress = p;
            }
        });

        let mut queue = self.lock();
        for done in work.items() {
            if let Some(item) = queue.get_mut(&done.id) {
                item.status = done.status;
                item.progress = done.progress;
                item.detections = done.detections.clone();
                item.keep_ranges = done.keep_ranges.clone();
            }
        }
        result
    }

    /// 取消正在进行的处理
    #[frb(sync)]
    pub fn cancel(&self) -> bool {
        self.cancel.cancel_active()
    }

    #[frb(sync, getter)]
    pub fn items(&self) -> Vec<QueueItemView> {
        self.lock().items().iter().map(QueueItemView::from).collect()
    }

    /// 导出已完成项为 batch-cut-list-<millis>.json，返回文件路径
    #[frb]
    pub fn export_manifest(&self, dir: String) -> DetectResult<String> {
        let entries = self.lock().to_manifest();
        let path = write_manifest(Path::new(&dir), &entries)?;
        Ok(path.to_string_lossy().into_owned())
    }

    /// 从清单恢复已完成项，替换当前队列
    #[frb]
    pub fn load_manifest(&self, path: String) -> DetectResult<usize> {
        let entries = read_manifest(&path)?;
        *self.lock() = BatchQueue::from_manifest(&entries);
        Ok(entries.len())
    }
}

impl Drop for VideoBatch {
    fn drop(&mut self) {
        self.cancel.cancel_active();
        info!("🗑️ VideoBatch: released");
    }
}
