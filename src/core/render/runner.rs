use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::core::manifest::{load_all, ManifestEntry};
use crate::core::render::filter_graph::{build_filter_graph, encode_args, output_path};
use crate::core::render::progress::RenderProgress;
use crate::core::render::{RenderConfig, RenderError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("job missing filename")]
    MissingFileName,
    #[error("file not found in source dir or working dir: {0}")]
    SourceNotFound(String),
    #[error("no cuts needed")]
    NoCutsNeeded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobPlan {
    Skip(SkipReason),
    Render {
        input: PathBuf,
        output: PathBuf,
        args: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderSummary {
    pub rendered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Source dir first, then the working dir.
pub fn resolve_source(file_name: &str, config: &RenderConfig) -> Option<PathBuf> {
    [&config.source_dir, &config.working_dir]
        .into_iter()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

pub fn plan_job(entry: &ManifestEntry, config: &RenderConfig) -> JobPlan {
    let Some(file_name) = entry.file_name.as_deref().filter(|n| !n.is_empty()) else {
        return JobPlan::Skip(SkipReason::MissingFileName);
    };
    let Some(input) = resolve_source(file_name, config) else {
        return JobPlan::Skip(SkipReason::SourceNotFound(file_name.to_string()));
    };
    let Some(graph) = build_filter_graph(&entry.keep_ranges) else {
        return JobPlan::Skip(SkipReason::NoCutsNeeded);
    };

    let output = output_path(&config.output_dir, file_name);
    let args = encode_args(&input, &graph, &output);
    JobPlan::Render {
        input,
        output,
        args,
    }
}

pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render every job from the manifests in the manifest dir.
    ///
    /// `progress` receives `(job_index, percent)`. A failing job is counted
    /// and the batch moves on.
    pub fn render_all(
        &self,
        progress: &mut dyn FnMut(usize, f64),
    ) -> Result<RenderSummary, RenderError> {
        let jobs = load_all(&self.config.manifest_dir)?;
        if jobs.is_empty() {
            return Err(RenderError::NoJobs(self.config.manifest_dir.clone()));
        }
        let ffmpeg = which::which("ffmpeg").map_err(|_| RenderError::FfmpegUnavailable)?;

        if !self.config.output_dir.exists() {
            info!("📂 creating output folder {}", self.config.output_dir.display());
            fs::create_dir_all(&self.config.output_dir)?;
        }

        info!(
            "📂 {} job(s) queued; source {}, output {}",
            jobs.len(),
            self.config.source_dir.display(),
            self.config.output_dir.display()
        );

        let mut summary = RenderSummary::default();
        for (index, entry) in jobs.iter().enumerate() {
            let label = entry.file_name.as_deref().unwrap_or("<unnamed>");
            info!("[{}/{}] {}", index + 1, jobs.len(), label);

            match plan_job(entry, &self.config) {
                JobPlan::Skip(reason) => {
                    warn!("⚠️ skipped {}: {}", label, reason);
                    summary.skipped += 1;
                }
                JobPlan::Render { output, args, .. } => {
                    info!("🚀 rendering to {}", output.display());
                    let outcome = run_ffmpeg(&ffmpeg, &args, &mut |p| progress(index, p));
                    match outcome {
                        Ok(()) => {
                            progress(index, 100.0);
                            info!("✅ saved {}", output.display());
                            summary.rendered += 1;
                        }
                        Err(e) => {
                            error!("❌ {}: {}", label, e);
                            summary.failed += 1;
                        }
                    }
                }
            }
        }

        info!(
            "🏁 render done: {} rendered, {} skipped, {} failed",
            summary.rendered, summary.skipped, summary.failed
        );
        Ok(summary)
    }
}

fn run_ffmpeg(
    ffmpeg: &Path,
    args: &[String],
    on_percent: &mut dyn FnMut(f64),
) -> Result<(), RenderError> {
    let mut child = Command::new(ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RenderError::Spawn)?;

    if let Some(mut stderr) = child.stderr.take() {
        let mut tracker = RenderProgress::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = match stderr.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    // reap the child before bailing out
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            };
            if let Some(p) = tracker.feed_bytes(&buf[..n]) {
                on_percent(p);
            }
        }
    }

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(RenderError::FfmpegExit(status.code().unwrap_or(-1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker_detector::ranges::KeepRange;

    fn config_in(root: &Path) -> RenderConfig {
        RenderConfig {
            source_dir: root.join("footage"),
            output_dir: root.join("processed"),
            manifest_dir: root.to_path_buf(),
            working_dir: root.to_path_buf(),
        }
    }

    fn entry(name: Option<&str>, ranges: Vec<KeepRange>) -> ManifestEntry {
        ManifestEntry {
            file_name: name.map(String::from),
            duration_seconds: 20.0,
            keep_ranges: ranges,
            detections: Vec::new(),
        }
    }

    fn one_range() -> Vec<KeepRange> {
        vec![KeepRange { start: 0.0, end: 9.9 }]
    }

    #[test]
    fn test_resolve_prefers_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::create_dir_all(&config.source_dir).unwrap();
        fs::write(config.source_dir.join("a.mp4"), b"x").unwrap();
        fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        fs::write(dir.path().join("b.mp4"), b"x").unwrap();

        assert_eq!(resolve_source("a.mp4", &config), Some(config.source_dir.join("a.mp4")));
        assert_eq!(resolve_source("b.mp4", &config), Some(dir.path().join("b.mp4")));
        assert_eq!(resolve_source("c.mp4", &config), None);
    }

    #[test]
    fn test_plan_skips() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(dir.path().join("a.mp4"), b"x").unwrap();

        assert_eq!(
            plan_job(&entry(None, one_range()), &config),
            JobPlan::Skip(SkipReason::MissingFileName)
        );
        assert_eq!(
            plan_job(&entry(Some("gone.mp4"), one_range()), &config),
            JobPlan::Skip(SkipReason::SourceNotFound("gone.mp4".into()))
        );
        assert_eq!(
            plan_job(&entry(Some("a.mp4"), vec![]), &config),
            JobPlan::Skip(SkipReason::NoCutsNeeded)
        );
    }

    #[test]
    fn test_plan_render() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(dir.path().join("a.mp4"), b"x").unwrap();

        match plan_job(&entry(Some("a.mp4"), one_range()), &config) {
            JobPlan::Render {
                input,
                output,
                args,
            } => {
                assert_eq!(input, dir.path().join("a.mp4"));
                assert_eq!(output, config.output_dir.join("a_clean.mp4"));
                assert!(args.iter().any(|a| a.contains("concat=n=1")));
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_render_all_without_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let err = Renderer::new(config_in(dir.path()))
            .render_all(&mut |_, _| {})
            .unwrap_err();
        assert!(matches!(err, RenderError::NoJobs(_)));
    }

    #[test]
    fn test_render_all_with_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("batch-cut-list-1.json"), "[]").unwrap();
        let err = Renderer::new(config_in(dir.path()))
            .render_all(&mut |_, _| {})
            .unwrap_err();
        assert!(matches!(err, RenderError::NoJobs(_)));
    }

    #[cfg(unix)]
    mod with_fake_ffmpeg {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("ffmpeg");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        const STATUS: &str = "printf \"Input #0, mov,mp4 from '视频.mp4':\\n  Duration: 00:00:10.00, start: 0\\n\" >&2\nprintf 'frame= 1 time=00:00:05.00 bitrate=1\\r' >&2";

        #[test]
        fn test_failed_encode_reports_exit_code() {
            let dir = tempfile::tempdir().unwrap();
            let ffmpeg = fake_ffmpeg(dir.path(), &format!("{}\nexit 1", STATUS));

            let mut seen = Vec::new();
            let err = run_ffmpeg(&ffmpeg, &[], &mut |p| seen.push(p)).unwrap_err();

            assert!(matches!(err, RenderError::FfmpegExit(1)));
            assert_eq!(seen.len(), 1);
            assert!((seen[0] - 50.0).abs() < 1e-9);
        }

        #[test]
        fn test_successful_encode_streams_progress() {
            let dir = tempfile::tempdir().unwrap();
            let ffmpeg = fake_ffmpeg(dir.path(), STATUS);

            let mut seen = Vec::new();
            run_ffmpeg(&ffmpeg, &[], &mut |p| seen.push(p)).unwrap();
            assert_eq!(seen.len(), 1);
        }

        #[test]
        fn test_missing_binary_is_a_spawn_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = run_ffmpeg(&dir.path().join("ffmpeg"), &[], &mut |_| {}).unwrap_err();
            assert!(matches!(err, RenderError::Spawn(_)));
        }
    }
}
