//! 游戏标记检测器 - 定位录像中固定位置的彩色 UI 标记，输出需保留的片段
//!
//! 核心策略：
//! 1. ROI 颜色分类 - 裁剪固定区域，HSV 掩码，像素密度判定
//! 2. 滞回状态机 - 双阈值抑制逐帧噪声
//! 3. 边缘精扫 - 状态翻转时回退逐帧重扫，提高边界精度
//! 4. 区间代数 - 时间戳合并为检测区间，再反转为保留区间

pub mod classifier;
pub mod frame;
pub mod hysteresis;
pub mod pipeline;
pub mod profile;
pub mod ranges;
pub mod refiner;
pub mod source;

pub use classifier::{
    CpuHsvBackend, FrameClassifier, MarkerClassifier, MaskBackend, MockClassifier, MockMaskBackend,
};
pub use frame::Frame;
pub use hysteresis::{Edge, HysteresisConfig, HysteresisTracker, TrackingState};
pub use pipeline::{MarkerScanner, ScanConfig, ScanResult};
pub use profile::{find_profile, DetectionFamily, Profile, Roi, PROFILES};
pub use ranges::{
    calculate_keep_ranges, merge_detections, DetectionRange, KeepRange, KeepRangeConfig,
};
pub use refiner::PrecisionRefiner;
pub use source::{FrameSource, MemorySource};
