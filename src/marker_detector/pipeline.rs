use log::{debug, info};

use crate::core::cancel::CancelToken;
use crate::core::error::DetectResult;
use crate::marker_detector::classifier::MarkerClassifier;
use crate::marker_detector::frame::Frame;
use crate::marker_detector::hysteresis::{Edge, HysteresisConfig, HysteresisTracker};
use crate::marker_detector::profile::Profile;
use crate::marker_detector::ranges::{merge_detections, DetectionRange, GAP_TOLERANCE};
use crate::marker_detector::refiner::PrecisionRefiner;
use crate::marker_detector::source::FrameSource;

/// Absorbs float drift so a 30fps stream samples every 3rd frame, not every 4th.
const GATE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Minimum media-time step between classified samples.
    pub sample_interval: f64,
    pub refine_window: f64,
    pub gap_tolerance: f64,
    /// Frames are scaled to this width before classification.
    pub process_width: Option<u32>,
    /// Report progress every N delivered frames.
    pub progress_every: u64,
    pub hysteresis: HysteresisConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sample_interval: 0.1,
            refine_window: 0.2,
            gap_tolerance: GAP_TOLERANCE,
            process_width: Some(640),
            progress_every: 30,
            hysteresis: HysteresisConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub detections: Vec<DetectionRange>,
    pub frames_delivered: u64,
    pub samples: u64,
    pub edges: u64,
    pub raw_hits: usize,
}

pub struct MarkerScanner {
    config: ScanConfig,
    tracker: HysteresisTracker,
    refiner: PrecisionRefiner,
    raw_hits: Vec<f64>,
    last_sample: Option<f64>,
    edges: u64,
}

impl MarkerScanner {
    pub fn new() -> Self {
        Self::with_config(ScanConfig::default())
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self {
            tracker: HysteresisTracker::with_config(config.hysteresis),
            refiner: PrecisionRefiner::new(config.refine_window),
            raw_hits: Vec::new(),
            last_sample: None,
            edges: 0,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.raw_hits.clear();
        self.last_sample = None;
        self.edges = 0;
    }

    fn should_sample(&self, timestamp: f64) -> bool {
        match self.last_sample {
            None => true,
            Some(last) => timestamp - last + GATE_EPSILON >= self.config.sample_interval,
        }
    }

    /// Run one full pass over `source`. Cancellation discards all state.
    pub fn scan(
        &mut self,
        source: &mut dyn FrameSource,
        classifier: &dyn MarkerClassifier,
        profile: &Profile,
        token: &CancelToken,
        progress: &mut dyn FnMut(u32),
    ) -> DetectResult<ScanResult> {
        self.reset();

        let duration = source.duration();
        let width = self.config.process_width;
        let mut delivered = 0u64;

        info!("🎬 scanning {:.1}s with profile {}", duration, profile.id);

        loop {
            token.check()?;
            let Some(frame) = source.next_frame()? else {
                break;
            };
            delivered += 1;
            let t = frame.timestamp;

            if self.should_sample(t) {
                self.last_sample = Some(t);
                let confidence = prepared_confidence(classifier, profile, width, &frame);

                if let Some(edge) = self.tracker.process_sample(confidence) {
                    self.edges += 1;
                    debug!(
                        "{} edge @{:.3}s",
                        match edge {
                            Edge::Rising => "📈",
                            Edge::Falling => "📉",
                        },
                        t
                    );
                    self.refiner
                        .refine(source, t, token, &mut self.raw_hits, |f| {
                            prepared_confidence(classifier, profile, width, f)
                        });
                }

                if self.tracker.is_tracking() {
                    self.raw_hits.push(t);
                }
            }

            if self.config.progress_every > 0 && delivered % self.config.progress_every == 0 {
                progress(progress_percent(t, duration));
            }
        }

        token.check()?;

        let detections = merge_detections(&self.raw_hits, self.config.gap_tolerance);
        progress(100);

        info!(
            "✅ scan done: {} frames, {} samples, {} edges, {} detection ranges",
            delivered,
            self.tracker.sample_count(),
            self.edges,
            detections.len()
        );

        Ok(ScanResult {
            detections,
            frames_delivered: delivered,
            samples: self.tracker.sample_count(),
            edges: self.edges,
            raw_hits: self.raw_hits.len(),
        })
    }
}

impl Default for MarkerScanner {
    fn default() -> Self {
        Self::new()
    }
}

pub fn progress_percent(media_time: f64, duration: f64) -> u32 {
    if duration <= 0.0 {
        return 0;
    }
    ((100.0 * media_time / duration).round().max(0.0) as u32).min(100)
}

fn prepared_confidence(
    classifier: &dyn MarkerClassifier,
    profile: &Profile,
    width: Option<u32>,
    frame: &Frame,
) -> f32 {
    match width {
        Some(w) if frame.width != w => match frame.resize_to_width(w) {
            Some(scaled) => classifier.classify(&scaled, profile),
            None => classifier.classify(frame, profile),
        },
        _ => classifier.classify(frame, profile),
    }
}
