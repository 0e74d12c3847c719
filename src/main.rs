use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use deepscan::config::RunConfig;
use deepscan::core::{run_configured, RunOutcome};
use deepscan::decoder::{interval_for_rate, probe};
use deepscan::logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample a video and run the feature extractors on each sample
    Run {
        /// Video file, or a directory of frame images
        video: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Keep every N-th decoded frame
        #[arg(short, long, conflicts_with = "per_second")]
        frame_skip: Option<NonZeroU32>,
        /// Target samples per second of footage (needs a known frame rate)
        #[arg(long)]
        per_second: Option<f64>,
        /// Crop each sample to its largest detected face
        #[arg(long, default_value_t = false)]
        isolate_faces: bool,
        /// Haar cascade XML used for face detection
        #[arg(long)]
        cascade: Option<PathBuf>,
        /// Face box expansion factor (>= 1.0)
        #[arg(long)]
        scale_factor: Option<f64>,
        /// Leave the scratch frames on disk after a successful run
        #[arg(long, default_value_t = false)]
        keep_scratch: bool,
        #[arg(long)]
        scratch_root: Option<PathBuf>,
        /// Write the run outcome as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print stream properties
    Probe { video: PathBuf },
    /// Write a default configuration file
    InitConfig { output: PathBuf },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(cli.verbose, cli.log_file.as_deref());

    match cli.command {
        Commands::Run {
            video,
            config,
            frame_skip,
            per_second,
            isolate_faces,
            cascade,
            scale_factor,
            keep_scratch,
            scratch_root,
            report,
        } => {
            let mut run_config = match &config {
                Some(path) => RunConfig::load(path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => RunConfig::default(),
            };
            run_config.video_path = video;
            if let Some(n) = frame_skip {
                run_config.frame_skip = n;
            }
            if let Some(rate) = per_second {
                run_config.frame_skip = frame_skip_for_rate(&run_config.video_path, rate)?;
            }
            if isolate_faces {
                run_config.enable_face_isolation = true;
            }
            if let Some(path) = cascade {
                run_config.detection.cascade_path = Some(path);
            }
            if let Some(scale) = scale_factor {
                run_config.face_expand_scale_factor = scale;
            }
            if keep_scratch {
                run_config.cleanup_scratch_on_success = false;
            }
            if scratch_root.is_some() {
                run_config.scratch_root = scratch_root;
            }
            run(run_config, report.as_deref())
        }
        Commands::Probe { video } => {
            let info = probe(&video)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::InitConfig { output } => {
            RunConfig::write_template(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote default configuration to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn frame_skip_for_rate(video: &Path, per_second: f64) -> Result<NonZeroU32> {
    let info = probe(video)?;
    let fps = info
        .fps
        .context("Frame rate unknown for this source; pass --frame-skip instead")?;
    let interval = interval_for_rate(fps, per_second)
        .and_then(NonZeroU32::new)
        .with_context(|| format!("--per-second must be positive, got {}", per_second))?;
    info!("{} fps at {}/s -> keeping every {} frames", fps, per_second, interval);
    Ok(interval)
}

fn run(config: RunConfig, report: Option<&Path>) -> Result<ExitCode> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Error registering Ctrl-C handler")?;

    let outcome = run_configured(config, Some(interrupted));

    if let Some(path) = report {
        fs::write(path, serde_json::to_string_pretty(&outcome)?)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    match &outcome {
        RunOutcome::Success {
            scratch_dir,
            scratch_retained,
            results,
            skipped,
            ..
        } => {
            println!(
                "Processed {} frames ({} samples skipped)",
                results.len(),
                skipped.len()
            );
            for frame in results {
                println!(
                    "  frame {} (decode index {}): {}/{} extractors ok",
                    frame.ordinal,
                    frame.decode_index,
                    frame.results.len() - frame.failures(),
                    frame.results.len()
                );
            }
            if *scratch_retained {
                println!("Frames kept in {}", scratch_dir.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Failure { kind, message, .. } => {
            eprintln!("Run failed ({:?}): {}", kind, message);
            Ok(ExitCode::FAILURE)
        }
    }
}
