//! Runtime configuration
//!
//! Defaults, then an optional JSON file, then `POSECAST_*` environment
//! overrides. The result is validated before any session starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use posecast_core::{CaptureHints, PosecastError, PosecastResult, VISIBILITY_THRESHOLD};
use posecast_time::frame_interval;
use posecast_transport::LogMode;
use posecast_wire::{DEFAULT_HOST, DEFAULT_PORT};

use crate::LogConfig;

/// Default publishing rate
pub const DEFAULT_TARGET_FPS: f64 = 15.0;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Consumer host used when a request does not name one
    pub destination_host: String,
    /// Consumer UDP port
    pub destination_port: u16,
    /// Publishing rate
    pub target_fps: f64,
    /// Directory holding one log per source
    pub log_dir: PathBuf,
    pub log_mode: LogMode,
    /// Minimum detection confidence
    pub confidence_threshold: f32,
    /// Requested capture width
    pub capture_width: u32,
    /// Requested capture height
    pub capture_height: u32,
    /// Replacement seed pose asset
    pub seed_path: Option<PathBuf>,
    /// Bound on joining a stopping worker, e.g. "2s" or "500ms"
    #[serde(deserialize_with = "deserialize_duration")]
    pub stop_timeout: Duration,
    pub logging: LogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let hints = CaptureHints::default();
        RuntimeConfig {
            destination_host: DEFAULT_HOST.to_string(),
            destination_port: DEFAULT_PORT,
            target_fps: DEFAULT_TARGET_FPS,
            log_dir: PathBuf::from("data"),
            log_mode: LogMode::Append,
            confidence_threshold: VISIBILITY_THRESHOLD,
            capture_width: hints.width,
            capture_height: hints.height,
            seed_path: None,
            stop_timeout: Duration::from_secs(2),
            logging: LogConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults, optional file, environment overrides, validation
    pub fn load(path: Option<&Path>) -> PosecastResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> PosecastResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PosecastError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> PosecastResult<Self> {
        serde_json::from_str(text).map_err(|e| PosecastError::Config(e.to_string()))
    }

    /// Apply `POSECAST_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> PosecastResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("POSECAST_DEST_HOST") {
            self.destination_host = host;
        }
        if let Some(port) = lookup("POSECAST_DEST_PORT") {
            self.destination_port = parse_env("POSECAST_DEST_PORT", &port)?;
        }
        if let Some(fps) = lookup("POSECAST_TARGET_FPS") {
            self.target_fps = parse_env("POSECAST_TARGET_FPS", &fps)?;
        }
        if let Some(dir) = lookup("POSECAST_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = lookup("POSECAST_STOP_TIMEOUT") {
            self.stop_timeout = humantime::parse_duration(&timeout).map_err(|e| {
                PosecastError::Config(format!("POSECAST_STOP_TIMEOUT: {}", e))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> PosecastResult<()> {
        if self.destination_host.trim().is_empty() {
            return Err(PosecastError::Config("destination_host is empty".into()));
        }
        if self.destination_port == 0 {
            return Err(PosecastError::Config("destination_port must not be 0".into()));
        }
        frame_interval(self.target_fps)
            .map_err(|e| PosecastError::Config(format!("target_fps: {}", e)))?;
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PosecastError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(PosecastError::Config("capture size must be non-zero".into()));
        }
        if self.stop_timeout.is_zero() {
            return Err(PosecastError::Config("stop_timeout must be non-zero".into()));
        }
        Ok(())
    }

    pub fn capture_hints(&self) -> CaptureHints {
        CaptureHints {
            width: self.capture_width,
            height: self.capture_height,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> PosecastResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PosecastError::Config(format!("{}: cannot parse {:?}", key, value)))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}
