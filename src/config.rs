//! Configuration management for runtime parameter tuning
//!
//! This module provides configuration loading from JSON files so the
//! acceptance thresholds, calibration targets, and live send interval can be
//! tuned in the field without recompiling the watch build.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::CalibrationError;
use crate::location::ValidationThresholds;

/// Longest accepted calibration deadline (one hour)
pub const MAX_CALIBRATION_DURATION_MS: u64 = 3_600_000;

/// Longest accepted live send interval (one minute)
pub const MAX_SEND_INTERVAL_MS: u64 = 60_000;

/// Largest accepted sample target for a calibration run
pub const MAX_GOOD_SAMPLES: u32 = 10_000;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

/// What `start` does while another calibration run is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Refuse with `AlreadyRunning`
    #[default]
    Reject,
    /// Cancel the active run, then start the new one
    CancelActive,
}

/// Calibration averaging parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Acceptance gate for fixes that feed the average
    pub thresholds: ValidationThresholds,
    /// Accepted fixes needed to finish a run early (and to succeed at all)
    pub min_good_samples: u32,
    /// Deadline for a run, measured from `start`
    pub max_duration_ms: u64,
    /// Accuracy floor in meters used for weighting
    pub weight_floor_m: f64,
    /// Behaviour when a start request arrives mid-run
    #[serde(default)]
    pub start_policy: StartPolicy,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            thresholds: ValidationThresholds::calibration_default(),
            min_good_samples: 10,
            max_duration_ms: 20_000,
            // Keeps 1/acc^2 bounded for implausibly precise fixes
            weight_floor_m: 0.5,
            start_policy: StartPolicy::Reject,
        }
    }
}

impl CalibrationConfig {
    /// Deadline length, saturated at [`MAX_CALIBRATION_DURATION_MS`]
    pub fn max_duration(&self) -> chrono::Duration {
        bounded_millis(self.max_duration_ms, MAX_CALIBRATION_DURATION_MS)
    }
}

/// Live fix streaming parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Acceptance gate for streamed fixes
    pub thresholds: ValidationThresholds,
    /// Minimum spacing between two forwarded fixes; matches the rig's control loop
    pub min_send_interval_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            thresholds: ValidationThresholds::live_default(),
            min_send_interval_ms: 200,
        }
    }
}

impl LiveConfig {
    /// Send interval, saturated at [`MAX_SEND_INTERVAL_MS`]
    pub fn min_send_interval(&self) -> chrono::Duration {
        bounded_millis(self.min_send_interval_ms, MAX_SEND_INTERVAL_MS)
    }
}

fn bounded_millis(value_ms: u64, max_ms: u64) -> chrono::Duration {
    i64::try_from(value_ms.min(max_ms))
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .unwrap_or_else(chrono::Duration::zero)
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing, not
    /// valid JSON, or fails [`AppConfig::validate`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<AppConfig>(&contents) {
            Ok(config) => match config.validate() {
                Ok(()) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Rejected configuration from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/rig_config.json")
    }

    /// Check that every parameter is usable
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let invalid = |reason: &str| {
            Err(CalibrationError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.calibration.min_good_samples == 0 {
            return invalid("min_good_samples must be at least 1");
        }
        if self.calibration.min_good_samples > MAX_GOOD_SAMPLES {
            return invalid("min_good_samples exceeds 10000");
        }
        if self.calibration.max_duration_ms == 0 {
            return invalid("max_duration_ms must be positive");
        }
        if self.calibration.max_duration_ms > MAX_CALIBRATION_DURATION_MS {
            return invalid("max_duration_ms exceeds one hour");
        }
        if self.live.min_send_interval_ms > MAX_SEND_INTERVAL_MS {
            return invalid("min_send_interval_ms exceeds one minute");
        }
        if !(self.calibration.weight_floor_m > 0.0) {
            return invalid("weight_floor_m must be positive");
        }
        for (name, thresholds) in [
            ("calibration", &self.calibration.thresholds),
            ("live", &self.live.thresholds),
        ] {
            if !(thresholds.max_accuracy_m > 0.0) || !(thresholds.max_age_s > 0.0) {
                return Err(CalibrationError::InvalidConfig {
                    reason: format!("{} thresholds must be positive", name),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.calibration.min_good_samples, 10);
        assert_eq!(config.calibration.weight_floor_m, 0.5);
        assert_eq!(config.calibration.start_policy, StartPolicy::Reject);
        assert_eq!(config.live.min_send_interval_ms, 200);
        assert!(
            config.calibration.thresholds.max_accuracy_m < config.live.thresholds.max_accuracy_m
        );
        assert!(config.live.thresholds.max_age_s <= config.calibration.thresholds.max_age_s);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            parsed.calibration.min_good_samples,
            config.calibration.min_good_samples
        );
        assert_eq!(
            parsed.live.min_send_interval_ms,
            config.live.min_send_interval_ms
        );
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig = serde_json::from_str(
            r#"{"live":{"thresholds":{"max_accuracy_m":30.0,"max_age_s":1.0},"min_send_interval_ms":100}}"#,
        )
        .unwrap();
        assert_eq!(parsed.live.min_send_interval_ms, 100);
        assert_eq!(parsed.calibration.min_good_samples, 10);
    }

    #[test]
    fn test_start_policy_snake_case() {
        let json = serde_json::to_string(&StartPolicy::CancelActive).unwrap();
        assert_eq!(json, "\"cancel_active\"");
    }

    #[test]
    fn test_validate_rejects_zero_targets() {
        let mut config = AppConfig::default();
        config.calibration.min_good_samples = 0;
        assert!(matches!(
            config.validate(),
            Err(CalibrationError::InvalidConfig { .. })
        ));

        let mut config = AppConfig::default();
        config.calibration.weight_floor_m = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.live.thresholds.max_age_s = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = AppConfig::default();
        config.calibration.min_good_samples = u32::MAX;
        assert!(matches!(
            config.validate(),
            Err(CalibrationError::InvalidConfig { .. })
        ));

        let mut config = AppConfig::default();
        config.calibration.max_duration_ms = 9_000_000_000_000_000_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.live.min_send_interval_ms = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.calibration.min_good_samples = MAX_GOOD_SAMPLES;
        config.calibration.max_duration_ms = MAX_CALIBRATION_DURATION_MS;
        config.live.min_send_interval_ms = MAX_SEND_INTERVAL_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations_saturate_instead_of_wrapping() {
        let live = LiveConfig {
            min_send_interval_ms: u64::MAX,
            ..LiveConfig::default()
        };
        assert_eq!(
            live.min_send_interval(),
            chrono::Duration::milliseconds(MAX_SEND_INTERVAL_MS as i64)
        );

        let calibration = CalibrationConfig {
            max_duration_ms: 9_000_000_000_000_000_000,
            ..CalibrationConfig::default()
        };
        assert_eq!(
            calibration.max_duration(),
            chrono::Duration::milliseconds(MAX_CALIBRATION_DURATION_MS as i64)
        );
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/rig_config.json");
        assert_eq!(config.calibration.min_good_samples, 10);
    }

    #[test]
    fn test_load_from_file_reads_values() {
        let path = std::env::temp_dir().join(format!(
            "rig_config_test_{}.json",
            std::process::id()
        ));
        let mut config = AppConfig::default();
        config.calibration.min_good_samples = 4;
        config.calibration.start_policy = StartPolicy::CancelActive;
        {
            let mut file = fs::File::create(&path).unwrap();
            file.write_all(serde_json::to_string(&config).unwrap().as_bytes())
                .unwrap();
        }

        let loaded = AppConfig::load_from_file(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.calibration.min_good_samples, 4);
        assert_eq!(loaded.calibration.start_policy, StartPolicy::CancelActive);
    }
}
