//! 剪辑清单 (cut list) 的读写与发现
//!
//! 批量清单是对象数组；旧版单文件清单是单个对象。两种都可读。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::core::error::DetectResult;
use crate::marker_detector::ranges::{DetectionRange, KeepRange};

pub const BATCH_MANIFEST_PREFIX: &str = "batch-cut-list";
pub const LEGACY_MANIFEST_NAME: &str = "cut-list.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(alias = "file", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(alias = "duration", default)]
    pub duration_seconds: f64,
    #[serde(alias = "ranges", default)]
    pub keep_ranges: Vec<KeepRange>,
    #[serde(default)]
    pub detections: Vec<DetectionRange>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    Batch(Vec<ManifestEntry>),
    Single(ManifestEntry),
}

pub fn parse_manifest(json: &str) -> DetectResult<Vec<ManifestEntry>> {
    Ok(match serde_json::from_str::<ManifestDocument>(json)? {
        ManifestDocument::Batch(entries) => entries,
        ManifestDocument::Single(entry) => vec![entry],
    })
}

pub fn read_manifest(path: impl AsRef<Path>) -> DetectResult<Vec<ManifestEntry>> {
    let json = fs::read_to_string(path)?;
    parse_manifest(&json)
}

pub fn batch_manifest_name(unix_millis: u128) -> String {
    format!("{}-{}.json", BATCH_MANIFEST_PREFIX, unix_millis)
}

/// Write `entries` as a pretty JSON array into `dir`; returns the file path.
pub fn write_manifest(dir: impl AsRef<Path>, entries: &[ManifestEntry]) -> DetectResult<PathBuf> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let path = dir.as_ref().join(batch_manifest_name(millis));

    fs::create_dir_all(dir.as_ref())?;
    fs::write(&path, serde_json::to_string_pretty(entries)?)?;

    info!("💾 wrote {} manifest entries to {}", entries.len(), path.display());
    Ok(path)
}

fn is_batch_manifest(name: &str) -> bool {
    name.starts_with(BATCH_MANIFEST_PREFIX) && name.ends_with(".json")
}

/// Batch manifests in `dir` (sorted by name), else the legacy file, else nothing.
pub fn discover_manifests(dir: impl AsRef<Path>) -> DetectResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut found: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter(|entry| is_batch_manifest(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    found.sort();

    if found.is_empty() {
        let legacy = dir.join(LEGACY_MANIFEST_NAME);
        if legacy.is_file() {
            found.push(legacy);
        }
    }
    Ok(found)
}

/// Concatenate every discovered manifest; unreadable files are logged and skipped.
pub fn load_all(dir: impl AsRef<Path>) -> DetectResult<Vec<ManifestEntry>> {
    let mut combined = Vec::new();
    for path in discover_manifests(dir)? {
        match read_manifest(&path) {
            Ok(entries) => {
                info!("📚 loaded {} job(s) from {}", entries.len(), path.display());
                combined.extend(entries);
            }
            Err(e) => error!("❌ failed to parse {}: {}", path.display(), e),
        }
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::batch::BatchQueue;

    fn sample_entry() -> ManifestEntry {
        ManifestEntry {
            file_name: Some("run01.mp4".into()),
            duration_seconds: 20.0,
            keep_ranges: vec![
                KeepRange { start: 0.0, end: 9.9 },
                KeepRange { start: 12.1, end: 20.0 },
            ],
            detections: vec![DetectionRange::new(10.0, 12.0)],
        }
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(sample_entry()).unwrap();
        assert_eq!(json["fileName"], "run01.mp4");
        assert_eq!(json["durationSeconds"], 20.0);
        assert_eq!(json["keepRanges"][1]["start"], 12.1);
        assert_eq!(json["detections"][0]["confidence"], 1.0);
    }

    #[test]
    fn test_parse_array_and_single() {
        let one = serde_json::to_string(&sample_entry()).unwrap();
        let many = serde_json::to_string(&vec![sample_entry(), sample_entry()]).unwrap();

        assert_eq!(parse_manifest(&one).unwrap(), vec![sample_entry()]);
        assert_eq!(parse_manifest(&many).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_legacy_keys() {
        let json = r#"{"file": "old.mp4", "duration": 5.0,
                       "ranges": [{"start": 1.1, "end": 5.0}]}"#;
        let entries = parse_manifest(json).unwrap();
        assert_eq!(entries[0].file_name.as_deref(), Some("old.mp4"));
        assert_eq!(entries[0].duration_seconds, 5.0);
        assert_eq!(entries[0].keep_ranges.len(), 1);
        assert!(entries[0].detections.is_empty());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_manifest("[1, 2").is_err());
        assert!(parse_manifest("42").is_err());
    }

    #[test]
    fn test_write_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), &[sample_entry()]).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(is_batch_manifest(&name));
        assert_eq!(read_manifest(&path).unwrap(), vec![sample_entry()]);
    }

    #[test]
    fn test_batch_queue_survives_export_and_reload() {
        let queue = BatchQueue::from_manifest(&[sample_entry()]);
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), &queue.to_manifest()).unwrap();

        let reloaded = BatchQueue::from_manifest(&read_manifest(path).unwrap());
        assert_eq!(reloaded.items(), queue.items());
    }

    #[test]
    fn test_discover_prefers_batch_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LEGACY_MANIFEST_NAME), "{}").unwrap();
        fs::write(dir.path().join("batch-cut-list-2.json"), "[]").unwrap();
        fs::write(dir.path().join("batch-cut-list-1.json"), "[]").unwrap();
        fs::write(dir.path().join("batch-cut-list-1.txt"), "[]").unwrap();

        let found = discover_manifests(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["batch-cut-list-1.json", "batch-cut-list-2.json"]);
    }

    #[test]
    fn test_discover_falls_back_to_legacy() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_manifests(dir.path()).unwrap().is_empty());

        fs::write(dir.path().join(LEGACY_MANIFEST_NAME), "{}").unwrap();
        let found = discover_manifests(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_load_all_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = serde_json::to_string(&vec![sample_entry()]).unwrap();
        fs::write(dir.path().join("batch-cut-list-a.json"), good).unwrap();
        fs::write(dir.path().join("batch-cut-list-b.json"), "not json").unwrap();

        let jobs = load_all(dir.path()).unwrap();
        assert_eq!(jobs, vec![sample_entry()]);
    }
}
