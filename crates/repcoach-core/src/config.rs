//! Configuration types for RepCoach.
//!
//! Configuration is read from `repcoach.json` (camelCase keys). Every field
//! has a default, so a missing file is equivalent to `{}`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RepCoachError, Result};
use crate::landmark::Side;
use crate::profile::{ExerciseId, ProfileTable, ThresholdOverride};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "repcoach.json";

/// Default exercise selected when a session starts.
const fn default_exercise() -> ExerciseId {
    ExerciseId::Squat
}

/// Default feedback display time in milliseconds.
const fn default_feedback_duration_ms() -> u64 {
    2000
}

/// Default minimum landmark visibility.
const fn default_min_visibility() -> f64 {
    0.5
}

const fn default_center_min() -> f64 {
    0.4
}

const fn default_center_max() -> f64 {
    0.6
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Exercise selected when a session starts.
    #[serde(default = "default_exercise")]
    pub default_exercise: ExerciseId,

    /// How long a feedback message stays visible, in milliseconds.
    #[serde(default = "default_feedback_duration_ms")]
    pub feedback_duration_ms: u64,

    /// Landmarks reported below this visibility are treated as missing.
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f64,

    /// Body side whose joints are measured.
    #[serde(default)]
    pub side: Side,

    /// Calibration gate settings.
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Per-exercise threshold overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<ExerciseId, ThresholdOverride>,

    /// HTTP/WebSocket bridge settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_exercise: default_exercise(),
            feedback_duration_ms: default_feedback_duration_ms(),
            min_visibility: default_min_visibility(),
            side: Side::default(),
            calibration: CalibrationConfig::default(),
            thresholds: BTreeMap::new(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `repcoach.json` exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            RepCoachError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `repcoach.json` in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `RepCoachError::ConfigParseError` for unreadable files or
    /// invalid JSON, and `RepCoachError::ConfigValidationError` for values
    /// out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(RepCoachError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| RepCoachError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `RepCoachError::ConfigValidationError` on the first failing check.
    pub fn validate(&self) -> Result<()> {
        if self.feedback_duration_ms == 0 {
            return Err(RepCoachError::config_validation(
                "feedbackDurationMs must be greater than 0",
                "Set feedbackDurationMs to at least 1 in your repcoach.json",
            ));
        }

        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(RepCoachError::config_validation(
                format!("minVisibility must be in [0, 1], got {}", self.min_visibility),
                "Use a value such as 0.5 in your repcoach.json",
            ));
        }

        let CalibrationConfig {
            center_min,
            center_max,
        } = self.calibration;
        if !(0.0..=1.0).contains(&center_min)
            || !(0.0..=1.0).contains(&center_max)
            || center_min >= center_max
        {
            return Err(RepCoachError::config_validation(
                format!("calibration band [{center_min}, {center_max}] is invalid"),
                "Use 0 <= calibration.centerMin < calibration.centerMax <= 1",
            ));
        }

        for (exercise, o) in &self.thresholds {
            for value in [o.down_enter, o.up_enter].into_iter().flatten() {
                if !(0.0..=180.0).contains(&value) {
                    return Err(RepCoachError::config_validation(
                        format!("threshold {value} for '{exercise}' is outside [0, 180]"),
                        "Thresholds are joint angles in degrees",
                    ));
                }
            }
        }

        // The two edges must not admit a common angle, or a held pose
        // would flip state on every frame.
        let profiles = self.profiles();
        for exercise in self.thresholds.keys() {
            let profile = profiles.get(*exercise);
            let (down, up) = (profile.down_enter.value(), profile.up_enter.value());
            if down >= up {
                return Err(RepCoachError::config_validation(
                    format!(
                        "thresholds for '{exercise}' overlap: downEnter {down} must be below upEnter {up}"
                    ),
                    "Keep downEnter well below upEnter so a held pose cannot count repetitions",
                ));
            }
        }

        Ok(())
    }

    /// Feedback display time.
    #[must_use]
    pub const fn feedback_duration(&self) -> Duration {
        Duration::from_millis(self.feedback_duration_ms)
    }

    /// Profiles with the configured overrides applied.
    #[must_use]
    pub fn profiles(&self) -> ProfileTable {
        ProfileTable::with_overrides(&self.thresholds)
    }
}

/// Calibration gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConfig {
    /// Left edge of the centered band (normalized x).
    #[serde(default = "default_center_min")]
    pub center_min: f64,
    /// Right edge of the centered band (normalized x).
    #[serde(default = "default_center_max")]
    pub center_max: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            center_min: default_center_min(),
            center_max: default_center_max(),
        }
    }
}

/// HTTP/WebSocket bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
