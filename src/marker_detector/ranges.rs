//! 检测时间戳 → 检测区间 → 保留区间

use serde::{Deserialize, Serialize};

/// Timestamps further apart than this open a new detection range.
pub const GAP_TOLERANCE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRange {
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
}

impl DetectionRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            confidence: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeepRange {
    pub start: f64,
    pub end: f64,
}

impl KeepRange {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Sort raw hit timestamps and bridge gaps up to `gap_tolerance`.
pub fn merge_detections(timestamps: &[f64], gap_tolerance: f64) -> Vec<DetectionRange> {
    let mut sorted = timestamps.to_vec();
    sorted.sort_by(f64::total_cmp);

    let Some((&first, rest)) = sorted.split_first() else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    let mut start = first;
    let mut prev = first;

    for &curr in rest {
        if curr - prev > gap_tolerance {
            ranges.push(DetectionRange::new(start, prev));
            start = curr;
        }
        prev = curr;
    }
    ranges.push(DetectionRange::new(start, prev));

    ranges
}

#[derive(Debug, Clone, Copy)]
pub struct KeepRangeConfig {
    /// Margin trimmed before each detection and after it.
    pub safety_buffer: f64,
    /// Keep fragments this short or shorter are dropped.
    pub min_segment: f64,
}

impl Default for KeepRangeConfig {
    fn default() -> Self {
        Self {
            safety_buffer: 0.1,
            min_segment: 0.1,
        }
    }
}

/// Footage to retain: `[0, duration]` minus the buffered detections.
pub fn calculate_keep_ranges(
    detections: &[DetectionRange],
    duration: f64,
    config: &KeepRangeConfig,
) -> Vec<KeepRange> {
    if duration <= 0.0 {
        return Vec::new();
    }
    if detections.is_empty() {
        return vec![KeepRange {
            start: 0.0,
            end: duration,
        }];
    }

    let mut sorted = detections.to_vec();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut keep = Vec::new();
    let mut cursor = 0.0_f64;

    for det in &sorted {
        let safe_end = (det.start - config.safety_buffer).max(0.0);
        if safe_end > cursor + config.min_segment {
            keep.push(KeepRange {
                start: cursor,
                end: safe_end,
            });
        }
        cursor = cursor.max(duration.min(det.end + config.safety_buffer));
    }

    if cursor < duration - config.min_segment {
        keep.push(KeepRange {
            start: cursor,
            end: duration,
        });
    }

    keep
}
