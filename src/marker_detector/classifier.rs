//! ROI 颜色分类: 裁剪 → HSV → 掩码 → 像素密度

use image::{GrayImage, RgbImage};
use log::warn;
use rayon::prelude::*;

use crate::core::error::{DetectError, DetectResult};
use crate::marker_detector::frame::Frame;
use crate::marker_detector::profile::{HsvRange, Profile, Roi};

/// Fraction of ROI pixels that must match before a frame counts as a hit.
pub const DENSITY_THRESHOLD: f64 = 0.30;

/// Color-space capability the classifier is built on.
///
/// HSV images reuse the RGB container: channel 0 is H (0-180), 1 is S, 2 is V.
pub trait MaskBackend: Send + Sync {
    fn to_hsv(&self, region: &RgbImage) -> RgbImage;

    /// Binary mask, 255 where the pixel lies inside `range` (inclusive).
    fn in_range(&self, hsv: &RgbImage, range: &HsvRange) -> GrayImage;
}

/// Per-sample confidence source consumed by the scanner.
pub trait MarkerClassifier: Send + Sync {
    fn classify(&self, frame: &Frame, profile: &Profile) -> f32;
}

/// 8-bit HSV conversion, same conventions as OpenCV's `COLOR_RGB2HSV`.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { diff / v * 255.0 } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round() as u8,
        v as u8,
    ]
}

pub struct CpuHsvBackend;

impl MaskBackend for CpuHsvBackend {
    fn to_hsv(&self, region: &RgbImage) -> RgbImage {
        let (w, h) = region.dimensions();
        let data: Vec<u8> = region
            .as_raw()
            .par_chunks_exact(3)
            .flat_map_iter(|px| rgb_to_hsv(px[0], px[1], px[2]))
            .collect();
        RgbImage::from_raw(w, h, data).unwrap_or_else(|| RgbImage::new(w, h))
    }

    fn in_range(&self, hsv: &RgbImage, range: &HsvRange) -> GrayImage {
        let (w, h) = hsv.dimensions();
        let data: Vec<u8> = hsv
            .as_raw()
            .par_chunks_exact(3)
            .map(|px| {
                if range.contains([px[0], px[1], px[2]]) {
                    255
                } else {
                    0
                }
            })
            .collect();
        GrayImage::from_raw(w, h, data).unwrap_or_else(|| GrayImage::new(w, h))
    }
}

/// Deterministic backend: every mask has the same fraction of pixels set.
pub struct MockMaskBackend {
    coverage: f64,
}

impl MockMaskBackend {
    pub fn with_coverage(coverage: f64) -> Self {
        Self {
            coverage: coverage.clamp(0.0, 1.0),
        }
    }
}

impl MaskBackend for MockMaskBackend {
    fn to_hsv(&self, region: &RgbImage) -> RgbImage {
        region.clone()
    }

    fn in_range(&self, hsv: &RgbImage, _range: &HsvRange) -> GrayImage {
        let (w, h) = hsv.dimensions();
        let total = (w * h) as usize;
        let set = (total as f64 * self.coverage).round() as usize;
        let data = (0..total).map(|i| if i < set { 255 } else { 0 }).collect();
        GrayImage::from_raw(w, h, data).unwrap_or_else(|| GrayImage::new(w, h))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Pixel rectangle for a normalized ROI, each edge floored.
pub fn roi_rect(roi: &Roi, width: u32, height: u32) -> DetectResult<PixelRect> {
    let x = (width as f64 * roi.x).floor() as i64;
    let y = (height as f64 * roi.y).floor() as i64;
    let w = (width as f64 * roi.w).floor() as i64;
    let h = (height as f64 * roi.h).floor() as i64;

    if x < 0 || y < 0 || w <= 0 || h <= 0 || x + w > width as i64 || y + h > height as i64 {
        return Err(DetectError::RoiOutOfBounds {
            x,
            y,
            w,
            h,
            frame_width: width,
            frame_height: height,
        });
    }

    Ok(PixelRect {
        x: x as u32,
        y: y as u32,
        w: w as u32,
        h: h as u32,
    })
}

pub struct FrameClassifier {
    backend: Box<dyn MaskBackend>,
}

impl FrameClassifier {
    pub fn new(backend: Box<dyn MaskBackend>) -> Self {
        Self { backend }
    }

    /// Matched-pixel density of the profile's color family inside its ROI.
    pub fn density(&self, frame: &Frame, profile: &Profile) -> DetectResult<f64> {
        if !frame.is_valid() {
            return Err(DetectError::decode(format!(
                "frame {} has {} bytes for {}x{}",
                frame.frame_number,
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }

        let rect = roi_rect(&profile.roi, frame.width, frame.height)?;
        let crop = frame.crop(rect.x, rect.y, rect.w, rect.h);
        let hsv = self.backend.to_hsv(&crop);

        let bounds = profile.bounds();
        let mut mask = self.backend.in_range(&hsv, &bounds.primary);
        if let Some(wrap) = &bounds.wrap {
            let second = self.backend.in_range(&hsv, wrap);
            for (a, b) in mask.iter_mut().zip(second.iter()) {
                *a |= *b;
            }
        }

        let total = (rect.w * rect.h) as f64;
        let matched = mask.iter().filter(|&&p| p != 0).count() as f64;
        Ok(matched / total)
    }

    pub fn try_classify(&self, frame: &Frame, profile: &Profile) -> DetectResult<f32> {
        let density = self.density(frame, profile)?;
        Ok(if density > DENSITY_THRESHOLD { 1.0 } else { 0.0 })
    }
}

impl Default for FrameClassifier {
    fn default() -> Self {
        Self::new(Box::new(CpuHsvBackend))
    }
}

impl MarkerClassifier for FrameClassifier {
    fn classify(&self, frame: &Frame, profile: &Profile) -> f32 {
        match self.try_classify(frame, profile) {
            Ok(confidence) => confidence,
            Err(e) => {
                warn!("⚠️ classify @{:.3}s: {}", frame.timestamp, e);
                0.0
            }
        }
    }
}

/// Confidence as a function of the frame timestamp.
pub struct MockClassifier {
    pattern: Box<dyn Fn(f64) -> f32 + Send + Sync>,
}

impl MockClassifier {
    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(f64) -> f32 + Send + Sync + 'static,
    {
        Self {
            pattern: Box::new(pattern),
        }
    }

    /// 1.0 inside any of the `[start, end]` windows, 0.0 elsewhere.
    pub fn with_windows(windows: Vec<(f64, f64)>) -> Self {
        Self::with_pattern(move |t| {
            if windows.iter().any(|&(s, e)| t >= s && t <= e) {
                1.0
            } else {
                0.0
            }
        })
    }
}

impl MarkerClassifier for MockClassifier {
    fn classify(&self, frame: &Frame, _profile: &Profile) -> f32 {
        (self.pattern)(frame.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker_detector::profile::find_profile;

    const PURPLE: [u8; 3] = [180, 0, 255];
    const RED: [u8; 3] = [255, 0, 0];
    const DEEP_RED: [u8; 3] = [255, 0, 20];
    const GREEN: [u8; 3] = [0, 200, 0];

    /// Frame with the profile's ROI painted `rgb` over `fraction` of its rows.
    fn frame_with_roi(profile: &Profile, rgb: [u8; 3], fraction: f64) -> Frame {
        let mut frame = Frame::filled(640, 360, GREEN, 1.0, 30);
        let rect = roi_rect(&profile.roi, 640, 360).unwrap();
        let rows = (rect.h as f64 * fraction).round() as u32;
        frame.fill_rect(rect.x, rect.y, rect.w, rows, rgb);
        frame
    }

    #[test]
    fn test_hsv_conversion_matches_opencv() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
        assert_eq!(rgb_to_hsv(180, 0, 255)[0], 141);
    }

    #[test]
    fn test_roi_rect_floors() {
        let profile = find_profile("c6a-4-3").unwrap();
        let rect = roi_rect(&profile.roi, 640, 480).unwrap();
        assert_eq!(rect, PixelRect { x: 96, y: 48, w: 448, h: 120 });
    }

    #[test]
    fn test_roi_out_of_bounds() {
        let roi = Roi { x: 0.9, y: 0.0, w: 0.2, h: 0.5 };
        assert!(matches!(
            roi_rect(&roi, 100, 100),
            Err(DetectError::RoiOutOfBounds { .. })
        ));

        let empty = Roi { x: 0.0, y: 0.0, w: 0.001, h: 0.5 };
        assert!(roi_rect(&empty, 100, 100).is_err());
    }

    #[test]
    fn test_purple_header_detected() {
        let classifier = FrameClassifier::default();
        let profile = find_profile("c6a-16-9").unwrap();

        let hit = frame_with_roi(profile, PURPLE, 0.5);
        assert_eq!(classifier.classify(&hit, profile), 1.0);

        let miss = frame_with_roi(profile, PURPLE, 0.2);
        assert_eq!(classifier.classify(&miss, profile), 0.0);
    }

    #[test]
    fn test_density_threshold_is_strict() {
        let classifier = FrameClassifier::default();
        let profile = find_profile("c6a-16-9").unwrap();

        // ROI is 90 rows high at 360p; 27 rows is exactly 30%.
        let edge = frame_with_roi(profile, PURPLE, 0.3);
        let density = classifier.density(&edge, profile).unwrap();
        assert!((density - 0.30).abs() < 1e-9);
        assert_eq!(classifier.classify(&edge, profile), 0.0);
    }

    #[test]
    fn test_red_wraparound_ors_both_bands() {
        let classifier = FrameClassifier::default();
        let profile = find_profile("vlt-dual").unwrap();

        let mut frame = Frame::filled(640, 360, GREEN, 0.0, 0);
        let rect = roi_rect(&profile.roi, 640, 360).unwrap();
        // 20% hue near 0, 20% hue near 180: neither alone passes 30%.
        let band = (rect.h as f64 * 0.2).round() as u32;
        frame.fill_rect(rect.x, rect.y, rect.w, band, RED);
        frame.fill_rect(rect.x, rect.y + band, rect.w, band, DEEP_RED);

        assert!(rgb_to_hsv(DEEP_RED[0], DEEP_RED[1], DEEP_RED[2])[0] >= 170);
        assert_eq!(classifier.classify(&frame, profile), 1.0);
    }

    #[test]
    fn test_wrong_family_not_detected() {
        let classifier = FrameClassifier::default();
        let purple_profile = find_profile("c6a-4-3").unwrap();
        let frame = frame_with_roi(purple_profile, RED, 1.0);
        assert_eq!(classifier.classify(&frame, purple_profile), 0.0);
    }

    #[test]
    fn test_mock_backend_is_deterministic() {
        let profile = find_profile("c6a-4-3").unwrap();
        let frame = Frame::filled(64, 64, GREEN, 0.0, 0);

        let high = FrameClassifier::new(Box::new(MockMaskBackend::with_coverage(0.5)));
        assert_eq!(high.classify(&frame, profile), 1.0);

        let low = FrameClassifier::new(Box::new(MockMaskBackend::with_coverage(0.1)));
        assert_eq!(low.classify(&frame, profile), 0.0);
    }

    #[test]
    fn test_invalid_frame_is_zero_confidence() {
        let classifier = FrameClassifier::default();
        let profile = find_profile("c6a-4-3").unwrap();
        let broken = Frame::new(64, 64, vec![0; 12], 0.0, 0);
        assert!(classifier.try_classify(&broken, profile).is_err());
        assert_eq!(classifier.classify(&broken, profile), 0.0);
    }

    #[test]
    fn test_mock_classifier_windows() {
        let profile = find_profile("c6a-4-3").unwrap();
        let mock = MockClassifier::with_windows(vec![(1.0, 2.0)]);
        let at = |t| Frame::filled(4, 4, GREEN, t, 0);
        assert_eq!(mock.classify(&at(0.5), profile), 0.0);
        assert_eq!(mock.classify(&at(1.5), profile), 1.0);
        assert_eq!(mock.classify(&at(2.5), profile), 0.0);
    }
}
