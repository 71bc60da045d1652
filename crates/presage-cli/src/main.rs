//! presage — camera diagnostics and trace replay.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use presage_core::{
    Detection, Event, IdentityDebouncer, MatchOutcome, MotionDebouncer, MotionPolicy,
    SessionPolicy,
};
use presage_hw::{list_devices, Camera, CaptureConfig};
use presage_vision::FrameSource;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Parser)]
#[command(name = "presage", about = "Presage camera diagnostics and trace replay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List V4L2 capture devices
    Devices,
    /// Grab frames from a camera and print their stats
    Capture {
        /// V4L2 device to open
        #[arg(long, default_value = "/dev/video0")]
        device: PathBuf,
        #[arg(long, default_value_t = 640)]
        width: u32,
        #[arg(long, default_value_t = 480)]
        height: u32,
        /// Frames to grab after warm-up
        #[arg(long, default_value_t = 5)]
        count: u32,
        /// Warm-up frames to discard
        #[arg(long, default_value_t = 3)]
        warmup: u32,
    },
    /// Feed a recorded tick trace through the debouncers and print the
    /// events they would emit
    Replay {
        /// JSON-lines trace file, one tick object per line
        trace: PathBuf,
        #[arg(long, default_value_t = 15.0)]
        logout_delay: f64,
        #[arg(long, default_value_t = 5.0)]
        unknown_cooldown: f64,
        #[arg(long, default_value_t = 500.0)]
        motion_threshold: f64,
        #[arg(long, default_value_t = 120.0)]
        motion_stop_delay: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => run_devices(),
        Commands::Capture {
            device,
            width,
            height,
            count,
            warmup,
        } => run_capture(device, width, height, count, warmup),
        Commands::Replay {
            trace,
            logout_delay,
            unknown_cooldown,
            motion_threshold,
            motion_stop_delay,
        } => run_replay(
            &trace,
            logout_delay,
            unknown_cooldown,
            motion_threshold,
            motion_stop_delay,
        ),
    }
}

fn run_devices() -> Result<()> {
    let devices = list_devices();
    if devices.is_empty() {
        println!("no V4L2 capture devices found");
        return Ok(());
    }
    for device in devices {
        println!(
            "{}  {} ({})",
            device.path.display(),
            device.card,
            device.driver
        );
    }
    Ok(())
}

fn run_capture(device: PathBuf, width: u32, height: u32, count: u32, warmup: u32) -> Result<()> {
    let config = CaptureConfig {
        device,
        width,
        height,
        warmup_frames: warmup,
    };
    let mut camera = Camera::open(&config).context("opening camera")?;
    for i in 0..count {
        match camera.read()? {
            Some(frame) => println!(
                "frame {i}: {}x{}, mean brightness {:.1}",
                frame.width,
                frame.height,
                frame.mean_brightness()
            ),
            None => bail!("camera produced no frame"),
        }
    }
    camera.stop();
    Ok(())
}

/// One replayed tick. `label` and `confidence` describe a classifier
/// result, `no_face` marks a frame without a face, `motion` is a gauge
/// score. Omitted parts of a tick are simply not fed to that debouncer.
#[derive(Debug, Deserialize)]
struct TraceTick {
    t: f64,
    #[serde(default)]
    label: Option<i32>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    no_face: bool,
    #[serde(default)]
    motion: Option<f64>,
}

fn detection_for(tick: &TraceTick) -> Option<Detection> {
    match (tick.label, tick.no_face) {
        (Some(label), _) => Some(Detection::Face(MatchOutcome::from_raw(
            label,
            tick.confidence.unwrap_or(0.0),
        ))),
        (None, true) => Some(Detection::NoFace),
        (None, false) => None,
    }
}

fn print_event(t: f64, event: &Event) {
    let mut envelope = Map::new();
    envelope.insert(event.name().to_string(), event.payload());
    println!("t={t:<8} {}", Value::Object(envelope));
}

fn run_replay(
    trace: &Path,
    logout_delay: f64,
    unknown_cooldown: f64,
    motion_threshold: f64,
    motion_stop_delay: f64,
) -> Result<()> {
    for (name, value) in [
        ("--logout-delay", logout_delay),
        ("--unknown-cooldown", unknown_cooldown),
        ("--motion-threshold", motion_threshold),
        ("--motion-stop-delay", motion_stop_delay),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            bail!("{name} must be a non-negative number");
        }
    }

    let contents =
        fs::read_to_string(trace).with_context(|| format!("reading trace {}", trace.display()))?;

    let base = Instant::now();
    let mut session = IdentityDebouncer::new(
        SessionPolicy {
            logout_delay: Duration::from_secs_f64(logout_delay),
            unknown_cooldown: Duration::from_secs_f64(unknown_cooldown),
        },
        base,
    );
    let mut motion = MotionDebouncer::new(MotionPolicy {
        threshold: motion_threshold,
        stop_delay: Duration::from_secs_f64(motion_stop_delay),
    });

    let mut last_t = 0.0f64;
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let tick: TraceTick =
            serde_json::from_str(line).with_context(|| format!("trace line {}", index + 1))?;
        if !(tick.t.is_finite() && tick.t >= last_t) {
            bail!("trace line {}: t must not go backwards", index + 1);
        }
        last_t = tick.t;
        let now = base + Duration::from_secs_f64(tick.t);

        if let Some(intensity) = tick.motion {
            if let Some(event) = motion.observe(intensity, now) {
                print_event(tick.t, &event);
            }
        }
        if let Some(detection) = detection_for(&tick) {
            if let Some(event) = session.observe(detection, now) {
                print_event(tick.t, &event);
            }
        }
    }
    Ok(())
}
