//! 离线渲染：按清单的保留区间裁剪并拼接源视频

pub mod filter_graph;
pub mod progress;
pub mod runner;

use std::path::PathBuf;

use thiserror::Error;

use crate::core::error::DetectError;

pub use filter_graph::{build_filter_graph, encode_args, output_path};
pub use progress::RenderProgress;
pub use runner::{plan_job, resolve_source, JobPlan, RenderSummary, Renderer, SkipReason};

pub const SOURCE_DIR_ENV: &str = "FREDALIZER_SOURCE_DIR";
pub const OUTPUT_DIR_ENV: &str = "FREDALIZER_OUTPUT_DIR";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("ffmpeg not found in PATH")]
    FfmpegUnavailable,
    #[error("Failed to start ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("ffmpeg exited with code {0}")]
    FfmpegExit(i32),
    #[error("No valid manifest jobs found in {0}")]
    NoJobs(PathBuf),
    #[error("Manifest error: {0}")]
    Manifest(#[from] DetectError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Where `batch-cut-list*.json` manifests are looked up.
    pub manifest_dir: PathBuf,
    /// Fallback location for sources missing from `source_dir`.
    pub working_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("game_elements").join("footage"),
            output_dir: PathBuf::from("game_elements").join("processed"),
            manifest_dir: PathBuf::from("."),
            working_dir: PathBuf::from("."),
        }
    }
}
