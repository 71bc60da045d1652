//! Daemon configuration, loaded from TOML with compiled defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use presage_core::{MotionPolicy, SessionPolicy};
use presage_hw::CaptureConfig;
use serde::Deserialize;
use thiserror::Error;

/// System-wide config location; a per-user file under `~/.config`
/// overrides it.
const SYSTEM_CONFIG: &str = "/etc/presage/config.toml";
const USER_CONFIG_SUFFIX: &str = ".config/presage/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub camera: CameraSection,
    pub detection: DetectionSection,
    pub motion: MotionSection,
    pub tick: TickSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraSection {
    pub device: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Frames discarded after open so auto-exposure can settle.
    pub warmup_frames: u32,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
            width: 640,
            height: 480,
            warmup_frames: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionSection {
    pub enabled: bool,
    /// Haar cascade XML used to locate faces.
    pub cascade: PathBuf,
    /// Trained LBPH model file.
    pub training_file: PathBuf,
    /// LBPH distance threshold; matches past it are rejected.
    pub threshold: f64,
    /// Crop margin around a detected face, as a fraction of its width.
    pub face_factor: f64,
    pub logout_delay_secs: f64,
    pub unknown_cooldown_secs: f64,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            enabled: true,
            cascade: PathBuf::from("haarcascade_frontalface_default.xml"),
            training_file: PathBuf::from("training.yml"),
            threshold: 80.0,
            face_factor: 0.1,
            logout_delay_secs: 15.0,
            unknown_cooldown_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionSection {
    pub enabled: bool,
    /// Motion score a frame triple must exceed to count as movement.
    pub threshold: f64,
    pub stop_delay_secs: f64,
}

impl Default for MotionSection {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 500.0,
            stop_delay_secs: 120.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TickSection {
    /// Seconds slept between polling ticks.
    pub interval_secs: f64,
}

impl Default for TickSection {
    fn default() -> Self {
        Self { interval_secs: 2.0 }
    }
}

impl Config {
    /// Load configuration. An explicit path must parse; otherwise the
    /// fallback chain is the system file, the user file, then compiled
    /// defaults, where only a missing file rolls over to the next.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load_default_chain()?,
        };
        config.validate()?;
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn load_default_chain() -> Result<Self, ConfigError> {
        for candidate in Self::candidate_paths() {
            match fs::read_to_string(&candidate) {
                Ok(contents) => {
                    let config: Config = toml::from_str(&contents)?;
                    tracing::info!(path = %candidate.display(), "loaded config");
                    return Ok(config);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            }
        }
        tracing::info!("no config file found, using defaults");
        Ok(Self::default())
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(USER_CONFIG_SUFFIX));
        }
        paths
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Validation(
                "camera dimensions must be non-zero".to_string(),
            ));
        }
        if self.camera.device.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "camera device path cannot be empty".to_string(),
            ));
        }
        if !(self.tick.interval_secs.is_finite() && self.tick.interval_secs > 0.0) {
            return Err(ConfigError::Validation(
                "tick interval must be a positive number of seconds".to_string(),
            ));
        }
        for (name, value) in [
            ("detection threshold", self.detection.threshold),
            ("detection face factor", self.detection.face_factor),
            ("logout delay", self.detection.logout_delay_secs),
            ("unknown cooldown", self.detection.unknown_cooldown_secs),
            ("motion threshold", self.motion.threshold),
            ("motion stop delay", self.motion.stop_delay_secs),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        if self.detection.enabled {
            if self.detection.cascade.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "cascade path cannot be empty while detection is enabled".to_string(),
                ));
            }
            if self.detection.training_file.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "training file path cannot be empty while detection is enabled".to_string(),
                ));
            }
        }
        Ok(())
    }

    // from_secs_f64 panics on negative or non-finite input; validate()
    // must have run before any accessor below.

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            logout_delay: Duration::from_secs_f64(self.detection.logout_delay_secs),
            unknown_cooldown: Duration::from_secs_f64(self.detection.unknown_cooldown_secs),
        }
    }

    pub fn motion_policy(&self) -> MotionPolicy {
        MotionPolicy {
            threshold: self.motion.threshold,
            stop_delay: Duration::from_secs_f64(self.motion.stop_delay_secs),
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            device: self.camera.device.clone(),
            width: self.camera.width,
            height: self.camera.height,
            warmup_frames: self.camera.warmup_frames,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick.interval_secs)
    }
}
