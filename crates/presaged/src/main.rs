//! presaged — camera presence watcher.
//!
//! Polls a V4L2 camera, debounces face matches and motion into presence
//! transitions, and emits them as JSON lines on stdout while logs go to
//! stderr. The blocking capture loop runs on its own thread; the async
//! main thread only waits for Ctrl-C or loop exit.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use presage_hw::Camera;
use presage_vision::MotionGauge;
use tokio::sync::{oneshot, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod driver;
mod sink;

use config::Config;
use driver::{Driver, DriverError, FacePipeline};
use sink::{EventSink, JsonLineSink};

#[derive(Parser)]
#[command(name = "presaged", about = "Camera presence watcher")]
struct Args {
    /// Path to a TOML config file; defaults to the system/user chain.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured camera device.
    #[arg(long)]
    device: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is the event protocol; all logging goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(device) = args.device {
        config.camera.device = device;
    }

    let mut sink = JsonLineSink::stdout();
    sink.status("Presence watcher started...")?;

    let face = build_face_pipeline(&config, &mut sink)?;
    let motion = build_motion_gauge(&config);

    let camera = Camera::open(&config.capture_config()).context("opening camera")?;

    let mut driver = Driver::new(
        Box::new(camera),
        sink,
        config.interval(),
        config.session_policy(),
        config.motion_policy(),
    );
    if let Some(pipeline) = face {
        driver = driver.with_face(pipeline);
    }
    if let Some(gauge) = motion {
        driver = driver.with_motion(gauge);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (done_tx, mut done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("presage-loop".into())
        .spawn(move || {
            let result = driver.run(&shutdown_rx);
            let _ = done_tx.send(result);
        })
        .context("spawning presence loop thread")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
        result = &mut done_rx => {
            return finish(result);
        }
    }

    finish(done_rx.await)
}

fn finish(result: Result<Result<(), DriverError>, oneshot::error::RecvError>) -> Result<()> {
    match result {
        Ok(Ok(())) => {
            info!("presence loop exited cleanly");
            Ok(())
        }
        Ok(Err(err)) => Err(err.into()),
        Err(_) => bail!("presence loop thread panicked"),
    }
}

#[cfg(feature = "backend-opencv")]
fn build_face_pipeline(
    config: &Config,
    sink: &mut impl EventSink,
) -> Result<Option<FacePipeline>> {
    use presage_vision::cv::{CascadeFaceFinder, LbphClassifier};

    if !config.detection.enabled {
        return Ok(None);
    }
    sink.status("Loading recognition model...")?;
    let finder =
        CascadeFaceFinder::open(&config.detection.cascade).context("loading face cascade")?;
    let classifier =
        LbphClassifier::load(&config.detection.training_file, config.detection.threshold)
            .context("loading recognition model")?;
    sink.status("Recognition model loaded!")?;
    Ok(Some(FacePipeline {
        finder: Box::new(finder),
        classifier: Box::new(classifier),
        margin_factor: config.detection.face_factor,
    }))
}

#[cfg(not(feature = "backend-opencv"))]
fn build_face_pipeline(
    config: &Config,
    _sink: &mut impl EventSink,
) -> Result<Option<FacePipeline>> {
    if config.detection.enabled {
        bail!(
            "face detection requires the backend-opencv feature; rebuild with \
             --features backend-opencv or set detection.enabled = false"
        );
    }
    Ok(None)
}

fn build_motion_gauge(config: &Config) -> Option<Box<dyn MotionGauge>> {
    if !config.motion.enabled {
        return None;
    }
    #[cfg(feature = "backend-opencv")]
    return Some(Box::new(presage_vision::cv::ContourGauge));
    #[cfg(not(feature = "backend-opencv"))]
    Some(Box::new(presage_vision::DiffGauge))
}
