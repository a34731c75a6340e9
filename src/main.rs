use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use pose_trainer_lib::core::config::Config;
use pose_trainer_lib::core::dataset::SplitBoundary;
use pose_trainer_lib::platform::capture::ImageSequenceSource;
use pose_trainer_lib::platform::pose::{DefaultPoseDetector, PoseDetector, ReplayPoseDetector};
use pose_trainer_lib::PoseTrainerApp;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pose-trainer", about = "Capture labeled poses and train a pose classifier")]
struct Args {
    /// Use this settings file instead of ~/.pose_trainer/config/settings.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train and evaluate on recorded dataset files
    Train {
        #[arg(long, required = true, num_args = 1..)]
        data: Vec<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        /// Drop the row at the split index, as older recordings were split
        #[arg(long)]
        keep_boundary_gap: bool,
    },
    /// Run one timed capture session against an image sequence and export it
    Capture {
        /// Glob pattern of the frames to replay, e.g. "frames/*.png"
        #[arg(long)]
        frames: String,
        #[arg(long)]
        label: String,
        /// Recorded detections to replay, one entry per frame
        #[arg(long)]
        landmarks: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show or reset the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Reset,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("Failed to load configuration")
}

async fn train(config: Config, data: Vec<PathBuf>) -> Result<()> {
    // Training never opens the camera
    let source = ImageSequenceSource::from_paths("none", Vec::new());
    let app = PoseTrainerApp::with_default_classifier(
        config,
        Box::new(source),
        Arc::new(DefaultPoseDetector::default()),
    )
    .map_err(|e| anyhow!(e))?;

    let run = app.bootstrap(&data).await.map_err(|e| anyhow!(e))?;

    println!("{}", serde_json::to_string_pretty(&run)?);
    Ok(())
}

async fn capture(
    config: Config,
    frames: &str,
    label: &str,
    landmarks: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<()> {
    let source = ImageSequenceSource::new(frames)?;
    let detector: Arc<dyn PoseDetector> = match landmarks {
        Some(path) => Arc::new(ReplayPoseDetector::from_file(&path, config.landmark_count)?),
        None => Arc::new(DefaultPoseDetector::default()),
    };
    log::info!("Using {}", detector.model_info());

    let app = PoseTrainerApp::with_default_classifier(config, Box::new(source), detector)
        .map_err(|e| anyhow!(e))?;
    app.start_device().await.map_err(|e| anyhow!(e))?;
    app.select_pose(label).await.map_err(|e| anyhow!(e))?;
    app.controller().wait_until_idle().await;
    app.stop_device().await.map_err(|e| anyhow!(e))?;

    let status = app.capture_status().await;
    let path = app
        .export_dataset(out.as_deref())
        .await
        .map_err(|e| anyhow!(e))?;

    println!("{}", serde_json::to_string_pretty(&status)?);
    println!("Dataset written to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    pose_trainer_lib::init_logging();
    let args = Args::parse();

    match args.command {
        Command::Train {
            data,
            seed,
            keep_boundary_gap,
        } => {
            let mut config = load_config(args.config.as_ref())?;
            if seed.is_some() {
                config.shuffle_seed = seed;
            }
            if keep_boundary_gap {
                config.split_boundary = SplitBoundary::SkipBoundaryRow;
            }
            train(config, data).await
        }
        Command::Capture {
            frames,
            label,
            landmarks,
            out,
        } => {
            let config = load_config(args.config.as_ref())?;
            capture(config, &frames, &label, landmarks, out).await
        }
        Command::Config { action } => {
            let config = match (action, args.config.as_ref()) {
                (ConfigAction::Show, path) => load_config(path)?,
                (ConfigAction::Reset, Some(path)) => {
                    let config = Config::default();
                    config.save_to(path)?;
                    config
                }
                (ConfigAction::Reset, None) => Config::reset()?,
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
