use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::manifest::ManifestEntry;
use crate::marker_detector::ranges::{DetectionRange, KeepRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAsset {
    pub path: PathBuf,
    pub file_name: String,
    pub duration_seconds: f64,
}

impl VideoAsset {
    pub fn new(path: impl AsRef<Path>, duration_seconds: f64) -> Self {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            path,
            file_name,
            duration_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub asset: VideoAsset,
    pub status: ProcessingStatus,
    pub progress: u32,
    pub detections: Vec<DetectionRange>,
    pub keep_ranges: Vec<KeepRange>,
}

impl QueueItem {
    pub fn is_done(&self) -> bool {
        self.status == ProcessingStatus::Completed
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchQueue {
    items: Vec<QueueItem>,
    next_id: u64,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a video; returns the new item's id.
    pub fn push(&mut self, asset: VideoAsset) -> String {
        self.next_id += 1;
        let id = format!("item-{}", self.next_id);
        self.items.push(QueueItem {
            id: id.clone(),
            asset,
            status: ProcessingStatus::Pending,
            progress: 0,
            detections: Vec::new(),
            keep_ranges: Vec::new(),
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<QueueItem> {
        let index = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, status: ProcessingStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// Manifest entries for every completed item, in queue order.
    pub fn to_manifest(&self) -> Vec<ManifestEntry> {
        self.items
            .iter()
            .filter(|i| i.is_done())
            .map(|i| ManifestEntry {
                file_name: Some(i.asset.file_name.clone()),
                duration_seconds: i.asset.duration_seconds,
                keep_ranges: i.keep_ranges.clone(),
                detections: i.detections.clone(),
            })
            .collect()
    }

    /// Rebuild a queue of completed items from a loaded manifest.
    pub fn from_manifest(entries: &[ManifestEntry]) -> Self {
        let mut queue = Self::new();
        for entry in entries {
            let name = entry.file_name.clone().unwrap_or_default();
            let id = queue.push(VideoAsset::new(&name, entry.duration_seconds));
            if let Some(item) = queue.get_mut(&id) {
                item.status = ProcessingStatus::Completed;
                item.progress = 100;
                item.detections = entry.detections.clone();
                item.keep_ranges = entry.keep_ranges.clone();
            }
        }
        queue
    }
}
