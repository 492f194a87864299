use crate::core::{
    PermissionState, PositionOptions, DEFAULT_STREAM_CAPACITY, MAX_HISTORY_LIMIT,
    MAX_STREAM_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Tracker and demo configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Options passed to every fix request and watch
    pub options: PositionOptions,
    /// Number of unread updates a stream subscriber may lag behind
    pub stream_capacity: usize,
    /// Maximum number of positions kept by the display history (None keeps all)
    pub history_limit: Option<usize>,
    /// Simulated provider settings
    pub simulation: SimulationConfig,
}

/// Simulated provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Walk origin latitude (decimal degrees)
    pub origin_latitude: f64,
    /// Walk origin longitude (decimal degrees)
    pub origin_longitude: f64,
    /// Distance moved between fixes (meters)
    pub step_m: f64,
    /// Pause between watch updates (milliseconds)
    pub interval_ms: u64,
    /// Time needed to acquire one fix (milliseconds)
    pub fix_delay_ms: u64,
    /// Probability that an acquisition fails with "position unavailable"
    pub error_probability: f64,
    /// Permission the simulated user has granted
    pub permission: PermissionState,
    /// Fixed altitude reported with every fix (meters)
    pub altitude_m: Option<f64>,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            options: PositionOptions::default(),
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            history_limit: None,
            simulation: SimulationConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            origin_latitude: 51.4779,
            origin_longitude: -0.0015,
            step_m: 5.0,
            interval_ms: 1000,
            fix_delay_ms: 250,
            error_probability: 0.0,
            permission: PermissionState::Granted,
            altitude_m: None,
        }
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl TrackerConfig {
    /// Load and validate configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;

        let config: TrackerConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path_str,
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|source| ConfigError::Io {
            path: path.as_ref().to_string_lossy().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_capacity == 0 {
            return Err(invalid(
                "stream_capacity",
                self.stream_capacity,
                "Stream capacity must be at least 1",
            ));
        }

        if self.history_limit == Some(0) {
            return Err(invalid("history_limit", 0, "History limit must be at least 1 when set"));
        }

        if self.stream_capacity > MAX_STREAM_CAPACITY {
            return Err(invalid(
                "stream_capacity",
                self.stream_capacity,
                &format!("Stream capacity must not exceed {}", MAX_STREAM_CAPACITY),
            ));
        }

        if let Some(limit) = self.history_limit.filter(|limit| *limit > MAX_HISTORY_LIMIT) {
            return Err(invalid(
                "history_limit",
                limit,
                &format!("History limit must not exceed {}", MAX_HISTORY_LIMIT),
            ));
        }

        if self.options.timeout_ms == Some(0) {
            return Err(invalid(
                "options.timeout_ms",
                0,
                "A zero timeout can never produce a fix; omit it for an unbounded wait",
            ));
        }

        self.simulation.validate()
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.origin_latitude) {
            return Err(invalid(
                "simulation.origin_latitude",
                self.origin_latitude,
                "Latitude must be between -90 and 90 degrees",
            ));
        }

        if !(-180.0..=180.0).contains(&self.origin_longitude) {
            return Err(invalid(
                "simulation.origin_longitude",
                self.origin_longitude,
                "Longitude must be between -180 and 180 degrees",
            ));
        }

        if !self.step_m.is_finite() || self.step_m < 0.0 {
            return Err(invalid(
                "simulation.step_m",
                self.step_m,
                "Step must be a non-negative distance",
            ));
        }

        if self.interval_ms == 0 {
            return Err(invalid("simulation.interval_ms", 0, "Interval must be at least 1 ms"));
        }

        if !(0.0..=1.0).contains(&self.error_probability) {
            return Err(invalid(
                "simulation.error_probability",
                self.error_probability,
                "Probability must be between 0.0 and 1.0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert!(config.options.enable_high_accuracy);
        assert_eq!(config.options.timeout_ms, None);
        assert_eq!(config.options.maximum_age_ms, 0);
        assert_eq!(config.stream_capacity, DEFAULT_STREAM_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_stream_capacity() {
        let config = TrackerConfig {
            stream_capacity: 0,
            ..TrackerConfig::default()
        };
        let error = config.validate().unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidParameter { ref parameter, .. } if parameter == "stream_capacity"
        ));
    }

    #[test]
    fn test_oversized_buffers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.json");
        fs::write(&path, r#"{ "stream_capacity": 18446744073709551615 }"#).unwrap();
        assert!(matches!(
            TrackerConfig::from_file(&path),
            Err(ConfigError::InvalidParameter { ref parameter, .. })
                if parameter == "stream_capacity"
        ));

        let config = TrackerConfig {
            stream_capacity: MAX_STREAM_CAPACITY,
            history_limit: Some(usize::MAX),
            ..TrackerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { ref parameter, .. }) if parameter == "history_limit"
        ));

        let config = TrackerConfig {
            stream_capacity: MAX_STREAM_CAPACITY,
            history_limit: Some(MAX_HISTORY_LIMIT),
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_simulation() {
        let mut config = TrackerConfig::default();
        config.simulation.origin_latitude = 95.0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.simulation.error_probability = 1.5;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.simulation.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = TrackerConfig::default();
        config.options.timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");

        let mut config = TrackerConfig::default();
        config.history_limit = Some(25);
        config.simulation.permission = PermissionState::Prompt;
        config.save_to_file(&path).unwrap();

        let loaded = TrackerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "simulation": { "step_m": 2.5 } }"#).unwrap();

        let loaded = TrackerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.simulation.step_m, 2.5);
        assert_eq!(loaded.simulation.interval_ms, 1000);
        assert_eq!(loaded.stream_capacity, DEFAULT_STREAM_CAPACITY);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = TrackerConfig::from_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(TrackerConfig::from_file(&path), Err(ConfigError::Parse { .. })));
    }
}
