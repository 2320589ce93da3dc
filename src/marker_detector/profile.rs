//! 游戏界面标记的静态配置表
//!
//! 每个 profile 给出一个归一化的 ROI 和一种颜色族。
//! HSV 采用 8-bit 约定: H ∈ [0, 180], S/V ∈ [0, 255]。

use serde::{Deserialize, Serialize};

use crate::core::error::{DetectError, DetectResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionFamily {
    /// Single contiguous hue band (purple header).
    HueBand,
    /// Hue band crossing the 0/180 seam (red button).
    HueBandWrap,
}

/// Region of interest, each component normalized to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvBounds {
    pub primary: HsvRange,
    pub wrap: Option<HsvRange>,
}

impl HsvBounds {
    pub fn ranges(&self) -> impl Iterator<Item = &HsvRange> {
        std::iter::once(&self.primary).chain(self.wrap.as_ref())
    }
}

// Purple: approx H 130-160, broad S/V to catch different screen brightnesses.
const PURPLE_BOUNDS: HsvBounds = HsvBounds {
    primary: HsvRange::new([125, 40, 40], [165, 255, 255]),
    wrap: None,
};

// Red: 0-10 and 170-180.
const RED_BOUNDS: HsvBounds = HsvBounds {
    primary: HsvRange::new([0, 100, 100], [10, 255, 255]),
    wrap: Some(HsvRange::new([170, 100, 100], [180, 255, 255])),
};

impl DetectionFamily {
    pub fn bounds(&self) -> &'static HsvBounds {
        match self {
            DetectionFamily::HueBand => &PURPLE_BOUNDS,
            DetectionFamily::HueBandWrap => &RED_BOUNDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Profile {
    pub id: &'static str,
    pub label: &'static str,
    pub family: DetectionFamily,
    pub roi: Roi,
}

impl Profile {
    pub fn bounds(&self) -> &'static HsvBounds {
        self.family.bounds()
    }
}

pub const PROFILES: &[Profile] = &[
    Profile {
        id: "c6a-4-3",
        label: "C6a Standard (4:3)",
        family: DetectionFamily::HueBand,
        roi: Roi { x: 0.15, y: 0.10, w: 0.7, h: 0.25 },
    },
    Profile {
        id: "c6a-16-9",
        label: "C6a Widescreen (16:9)",
        family: DetectionFamily::HueBand,
        roi: Roi { x: 0.20, y: 0.10, w: 0.6, h: 0.25 },
    },
    Profile {
        id: "vlt-dual",
        label: "VLT Dual Screen",
        family: DetectionFamily::HueBandWrap,
        roi: Roi { x: 0.01, y: 0.82, w: 0.20, h: 0.16 },
    },
];

pub fn find_profile(id: &str) -> DetectResult<&'static Profile> {
    PROFILES
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| DetectError::ProfileNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_profile() {
        let profile = find_profile("vlt-dual").unwrap();
        assert_eq!(profile.family, DetectionFamily::HueBandWrap);
        assert!(profile.bounds().wrap.is_some());
    }

    #[test]
    fn test_unknown_profile() {
        let err = find_profile("snes-4-3").unwrap_err();
        assert!(matches!(err, DetectError::ProfileNotFound(id) if id == "snes-4-3"));
    }

    #[test]
    fn test_rois_are_normalized() {
        for p in PROFILES {
            assert!(p.roi.x >= 0.0 && p.roi.x + p.roi.w <= 1.0, "{}", p.id);
            assert!(p.roi.y >= 0.0 && p.roi.y + p.roi.h <= 1.0, "{}", p.id);
        }
    }

    #[test]
    fn test_wrap_bounds_cover_both_sides_of_seam() {
        let bounds = DetectionFamily::HueBandWrap.bounds();
        assert!(bounds.ranges().any(|r| r.contains([3, 200, 200])));
        assert!(bounds.ranges().any(|r| r.contains([176, 200, 200])));
        assert!(!bounds.ranges().any(|r| r.contains([90, 200, 200])));
    }
}
