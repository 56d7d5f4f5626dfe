use anyhow::{Context, Result};
use clap::Parser;
use facescope_core::detector::FaceDetector;
use facescope_core::recognizer::FaceRecognizer;
use facescope_core::{
    overlay, Gallery, ModelPaths, OnnxAttributeEstimator, OnnxFaceEncoder, OnnxLandmarkDetector,
    RealtimeAnnotator, StaticAnalyzer,
};
use facescope_hw::{Camera, Display};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod static_mode;
mod video;

use config::Config;

const MODE_PROMPT: &str = "Choose mode: 'static' for image processing or 'video' for real-time video: ";
const INVALID_MODE: &str = "Invalid mode. Please choose 'static' or 'video'.";

#[derive(Parser)]
#[command(
    name = "facescope",
    about = "Recognize enrolled faces and estimate age, gender, emotion and race"
)]
struct Cli {
    /// `static` or `video`; prompted for when omitted
    mode: Option<String>,
    /// Enrollment directory or single image
    #[arg(long)]
    enroll: Option<PathBuf>,
    /// Image to analyze in static mode
    #[arg(long)]
    image: Option<PathBuf>,
    /// Video session length in seconds
    #[arg(long)]
    duration: Option<u64>,
    /// Print static results as JSON
    #[arg(long)]
    json: bool,
    /// TOML config file (default: ./facescope.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory containing the ONNX models
    #[arg(long)]
    models: Option<PathBuf>,
    /// V4L2 capture device
    #[arg(long)]
    device: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Static,
    Video,
}

impl Mode {
    /// Trimmed and case-insensitive.
    fn parse(answer: &str) -> Option<Self> {
        match answer.trim().to_lowercase().as_str() {
            "static" => Some(Mode::Static),
            "video" => Some(Mode::Video),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    apply_flags(&mut config, &cli);

    let answer = match &cli.mode {
        Some(mode) => mode.clone(),
        None => prompt_mode()?,
    };
    let Some(mode) = Mode::parse(&answer) else {
        println!("{INVALID_MODE}");
        return Ok(());
    };

    match mode {
        Mode::Static => run_static(&config, cli.json),
        Mode::Video => run_video(&config),
    }
}

fn apply_flags(config: &mut Config, cli: &Cli) {
    if let Some(path) = &cli.enroll {
        config.enroll_path = path.clone();
    }
    if let Some(path) = &cli.image {
        config.target_image = path.clone();
    }
    if let Some(secs) = cli.duration {
        config.video_duration_secs = secs;
    }
    if let Some(dir) = &cli.models {
        config.model_dir = dir.clone();
    }
    if let Some(device) = &cli.device {
        config.camera_device = device.clone();
    }
}

fn prompt_mode() -> Result<String> {
    print!("{MODE_PROMPT}");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer).context("failed to read mode")?;
    Ok(answer)
}

/// Detector, recognizer and attribute models shared by both modes.
fn load_pipeline(config: &Config, models: &ModelPaths) -> Result<(OnnxFaceEncoder, OnnxAttributeEstimator)> {
    for path in models.missing() {
        tracing::warn!(path = %path.display(), "model file missing");
    }
    let threads = config.intra_threads;
    let detector = FaceDetector::load(&models.detector, threads).context("failed to load face detector")?;
    let recognizer =
        FaceRecognizer::load(&models.recognizer, threads).context("failed to load face recognizer")?;
    let estimator = OnnxAttributeEstimator::load(&models.attributes, threads)
        .context("failed to load attribute models")?;
    Ok((OnnxFaceEncoder::new(detector, recognizer), estimator))
}

fn enroll_gallery(
    config: &Config,
    encoder: &mut OnnxFaceEncoder,
    estimator: &mut OnnxAttributeEstimator,
) -> Result<Gallery> {
    let mut gallery = Gallery::new();
    let report = gallery
        .enroll(&config.enroll_path, encoder, estimator)
        .context("enrollment failed")?;
    if report.enrolled == 0 {
        tracing::warn!(path = %config.enroll_path.display(), "no faces enrolled, every face will be Unknown");
    }
    Ok(gallery)
}

fn run_static(config: &Config, json: bool) -> Result<()> {
    let models = ModelPaths::in_dir(&config.model_dir);
    let (mut encoder, mut estimator) = load_pipeline(config, &models)?;
    let gallery = enroll_gallery(config, &mut encoder, &mut estimator)?;
    let matcher = config.match_policy.matcher(config.match_tolerance);

    let mut analyzer = StaticAnalyzer::new(&gallery, matcher.as_ref(), &mut encoder, &mut estimator);
    let results = analyzer
        .analyze_path(&config.target_image)
        .with_context(|| format!("failed to analyze {}", config.target_image.display()))?;

    if json {
        println!("{}", static_mode::format_json(&results)?);
    } else {
        print!("{}", static_mode::format_text(&results));
    }
    Ok(())
}

fn run_video(config: &Config) -> Result<()> {
    let models = ModelPaths::in_dir(&config.model_dir);
    let (mut encoder, mut estimator) = load_pipeline(config, &models)?;
    let mut landmarks = OnnxLandmarkDetector::load(&models.landmarks, config.intra_threads)
        .context("failed to load landmark model")?;
    let gallery = enroll_gallery(config, &mut encoder, &mut estimator)?;
    let matcher = config.match_policy.matcher(config.match_tolerance);

    let mut camera = Camera::open(&config.camera_device)
        .with_context(|| format!("failed to open camera {}", config.camera_device))?;
    let mut display = match Display::open(video::WINDOW_TITLE, camera.width, camera.height) {
        Ok(display) => display,
        Err(e) => {
            camera.release();
            return Err(e).context("failed to open preview window");
        }
    };

    let mut annotator =
        RealtimeAnnotator::new(&gallery, matcher.as_ref(), &mut encoder, &mut landmarks, &mut estimator)
            .with_font(overlay::load_font(config.font_path.as_deref()));

    let summary = video::run_session(
        &mut camera,
        &mut display,
        Duration::from_secs(config.video_duration_secs),
        |frame| annotator.process_frame(frame),
    );
    tracing::debug!(?summary, "session summary");
    Ok(())
}
