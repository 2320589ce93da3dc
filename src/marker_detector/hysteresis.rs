#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    NotTracking,
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy)]
pub struct HysteresisConfig {
    /// NotTracking → Tracking when confidence >= enter
    pub enter: f32,
    /// Tracking → NotTracking when confidence <= exit
    pub exit: f32,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            enter: 0.9,
            exit: 0.5,
        }
    }
}

impl TrackingState {
    pub fn transition(self, confidence: f32, config: &HysteresisConfig) -> (TrackingState, Option<Edge>) {
        match self {
            TrackingState::NotTracking if confidence >= config.enter => {
                (TrackingState::Tracking, Some(Edge::Rising))
            }
            TrackingState::Tracking if confidence <= config.exit => {
                (TrackingState::NotTracking, Some(Edge::Falling))
            }
            state => (state, None),
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self, TrackingState::Tracking)
    }
}

pub struct HysteresisTracker {
    state: TrackingState,
    config: HysteresisConfig,
    sample_counter: u64,
}

impl HysteresisTracker {
    pub fn new() -> Self {
        Self::with_config(HysteresisConfig::default())
    }

    pub fn with_config(config: HysteresisConfig) -> Self {
        Self {
            state: TrackingState::NotTracking,
            config,
            sample_counter: 0,
        }
    }

    /// Advance by one sample; returns the edge if the state flipped.
    pub fn process_sample(&mut self, confidence: f32) -> Option<Edge> {
        self.sample_counter += 1;

        let (new_state, edge) = self.state.transition(confidence, &self.config);
        self.state = new_state;

        edge
    }

    pub fn current_state(&self) -> TrackingState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state.is_tracking()
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_counter
    }

    pub fn reset(&mut self) {
        self.state = TrackingState::default();
        self.sample_counter = 0;
    }
}

impl Default for HysteresisTracker {
    fn default() -> Self {
        Self::new()
    }
}
