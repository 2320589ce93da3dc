pub mod decoder;
pub mod probe;

pub use decoder::{scaled_dimensions, FfmpegOpener, FfmpegSource};
pub use probe::{parse_frame_rate, probe_duration, probe_video, ProbeConfig, VideoInfo};
