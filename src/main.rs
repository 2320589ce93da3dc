//! fredalizer - detect game UI markers in footage and render the clean cut
//!
//! `analyze` writes a batch cut list; `render` trims and concatenates the
//! keep ranges from every cut list it finds.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use fredalizer::api::profiles::list_profiles;
use fredalizer::core::batch::{BatchOrchestrator, BatchQueue, VideoAsset};
use fredalizer::core::manifest::write_manifest;
use fredalizer::core::render::{RenderConfig, Renderer, OUTPUT_DIR_ENV, SOURCE_DIR_ENV};
use fredalizer::core::video::{probe_duration, FfmpegOpener, ProbeConfig};
use fredalizer::marker_detector::profile::find_profile;
use fredalizer::marker_detector::FrameClassifier;

#[derive(Parser, Debug)]
#[command(name = "fredalizer")]
#[command(about = "Cut game UI marker segments out of recorded footage")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the built-in game profiles
    Profiles,

    /// Analyze videos and write a batch cut list
    Analyze {
        /// Profile id (see `fredalizer profiles`)
        #[arg(short, long)]
        profile: String,

        /// Directory the cut list is written to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Videos to analyze, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Render every cut list found in the manifest directory
    Render {
        #[arg(long, env = SOURCE_DIR_ENV)]
        source_dir: Option<PathBuf>,

        #[arg(long, env = OUTPUT_DIR_ENV)]
        output_dir: Option<PathBuf>,

        #[arg(long, default_value = ".")]
        manifest_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    fredalizer::init_logging();
    let args = Args::parse();

    match args.command {
        Commands::Profiles => {
            for p in list_profiles() {
                println!("{:<10} {:<24} {}", p.id, p.label, p.family);
            }
            Ok(())
        }
        Commands::Analyze {
            profile,
            out_dir,
            files,
        } => analyze(&profile, out_dir, files),
        Commands::Render {
            source_dir,
            output_dir,
            manifest_dir,
        } => render(source_dir, output_dir, manifest_dir),
    }
}

fn analyze(profile_id: &str, out_dir: PathBuf, files: Vec<PathBuf>) -> Result<()> {
    let profile = find_profile(profile_id).context("Unknown profile")?;
    info!("🎮 profile {} ({})", profile.id, profile.label);

    let probe = ProbeConfig::default();
    let mut queue = BatchQueue::new();
    for file in &files {
        queue.push(VideoAsset::new(file, probe_duration(file, &probe)));
    }

    let orchestrator = BatchOrchestrator::new(
        Box::new(FrameClassifier::default()),
        Box::new(FfmpegOpener::default()),
    );
    let summary = orchestrator
        .process_queue(&mut queue, profile.id, &mut |id, p| {
            eprint!("\r   ⏳ {} {:>3}%", id, p);
            if p == 100 {
                eprintln!();
            }
            let _ = std::io::stderr().flush();
        })
        .context("Batch analysis aborted")?;

    let entries = queue.to_manifest();
    if entries.is_empty() {
        bail!("No video was analyzed successfully ({} failed)", summary.failed);
    }
    let path = write_manifest(&out_dir, &entries).context("Failed to write cut list")?;

    println!(
        "✅ {} analyzed, {} failed; cut list: {}",
        summary.completed,
        summary.failed,
        path.display()
    );
    Ok(())
}

fn render(
    source_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    manifest_dir: PathBuf,
) -> Result<()> {
    let defaults = RenderConfig::default();
    let config = RenderConfig {
        source_dir: source_dir.unwrap_or(defaults.source_dir),
        output_dir: output_dir.unwrap_or(defaults.output_dir),
        manifest_dir,
        working_dir: defaults.working_dir,
    };

    let summary = Renderer::new(config)
        .render_all(&mut |_, percent| draw_progress_bar(percent))
        .context("Render failed")?;

    println!(
        "✅ {} rendered, {} skipped, {} failed",
        summary.rendered, summary.skipped, summary.failed
    );
    Ok(())
}

fn draw_progress_bar(percent: f64) {
    const WIDTH: usize = 30;
    let filled = ((WIDTH as f64 * percent / 100.0).floor() as usize).min(WIDTH);
    eprint!(
        "\r   ⏳ Progress: [{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(WIDTH - filled),
        percent
    );
    if percent >= 100.0 {
        eprintln!();
    }
    let _ = std::io::stderr().flush();
}
