use crate::error::StartupError;
use crate::global_variables::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Timing parameters of the adaptive signal controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalTiming {
    /// No congestion-triggered change happens before this much GREEN time.
    #[serde(with = "secs")]
    pub min_green: Duration,
    /// GREEN is forcibly ended once it has lasted this long.
    #[serde(with = "secs")]
    pub max_green: Duration,
    /// Length of the YELLOW phase between two GREEN phases.
    #[serde(with = "secs")]
    pub yellow: Duration,
    /// A challenger lane must exceed `active_count * congestion_ratio`.
    pub congestion_ratio: f64,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            min_green: Duration::from_secs_f64(DEFAULT_MIN_GREEN_SECS),
            max_green: Duration::from_secs_f64(DEFAULT_MAX_GREEN_SECS),
            yellow: Duration::from_secs_f64(DEFAULT_YELLOW_SECS),
            congestion_ratio: DEFAULT_CONGESTION_RATIO,
        }
    }
}

/// Top-level configuration, optionally loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub timing: SignalTiming,
    /// Only every Nth decoded frame is sent to the detector.
    pub frame_skip: u32,
    /// How long the render loop waits for every lane's first frame.
    #[serde(with = "secs")]
    pub startup_timeout: Duration,
    /// Upper bound on the render loop's wait for a new frame.
    #[serde(with = "secs")]
    pub refresh_interval: Duration,
    /// Time lane workers get to exit after the stop signal.
    #[serde(with = "secs")]
    pub shutdown_grace: Duration,
    /// Optional pacing between decoded frames, emulating a camera's frame rate.
    #[serde(with = "opt_secs")]
    pub frame_interval: Option<Duration>,
    /// The display sink writes a preview every this many shown views.
    pub preview_every: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timing: SignalTiming::default(),
            frame_skip: DEFAULT_FRAME_SKIP,
            startup_timeout: Duration::from_secs_f64(DEFAULT_STARTUP_TIMEOUT_SECS),
            refresh_interval: Duration::from_secs_f64(DEFAULT_REFRESH_INTERVAL_SECS),
            shutdown_grace: Duration::from_secs_f64(DEFAULT_SHUTDOWN_GRACE_SECS),
            frame_interval: None,
            preview_every: DEFAULT_PREVIEW_EVERY,
        }
    }
}

impl MonitorConfig {
    /// Reads a JSON config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            StartupError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let config: MonitorConfig = serde_json::from_str(&raw).map_err(|e| {
            StartupError::Config(format!("cannot parse '{}': {}", path.display(), e))
        })?;
        Ok(config)
    }

    // Rejects settings that would make the controller or workers misbehave.
    pub fn validate(&self, lanes: usize) -> Result<(), StartupError> {
        if lanes == 0 {
            return Err(StartupError::Config("at least one lane is required".into()));
        }
        if self.frame_skip == 0 {
            return Err(StartupError::Config("frame_skip must be at least 1".into()));
        }
        if !(self.timing.congestion_ratio > 0.0) {
            return Err(StartupError::Config(format!(
                "congestion_ratio must be positive, got {}",
                self.timing.congestion_ratio
            )));
        }
        if self.timing.min_green > self.timing.max_green {
            return Err(StartupError::Config(format!(
                "min_green ({:?}) exceeds max_green ({:?})",
                self.timing.min_green, self.timing.max_green
            )));
        }
        if self.refresh_interval.is_zero() {
            return Err(StartupError::Config("refresh_interval must be non-zero".into()));
        }
        Ok(())
    }
}

// Durations are written as fractional seconds in config files.
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
