//! Estimator configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::curve::{Checkpoint, CurveError, CurvePreset, ProgressCurve};

/// Default period between percentage updates.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Default pause at 100% before the host is notified.
pub const DEFAULT_GRACE_DELAY_MS: u64 = 1000;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid checkpoint table
    #[error("invalid checkpoint table: {0}")]
    Curve(#[from] CurveError),

    /// Malformed JSON
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A zero tick interval would spin
    #[error("tick interval must be greater than zero")]
    ZeroTickInterval,
}

/// What `start` does while a session is showing its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Drop the pending notification and start over immediately
    #[default]
    CancelAndRestart,
    /// Let the grace delay finish and notify, then start the new session
    QueueBehindCompletion,
}

/// Estimator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Period between percentage updates, in milliseconds
    pub tick_interval_ms: u64,

    /// Pause at 100% before notifying the host, in milliseconds
    pub grace_delay_ms: u64,

    /// Behaviour of `start` during the grace delay
    pub restart_policy: RestartPolicy,

    /// Checkpoint table
    pub checkpoints: ProgressCurve,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            grace_delay_ms: DEFAULT_GRACE_DELAY_MS,
            restart_policy: RestartPolicy::default(),
            checkpoints: ProgressCurve::default(),
        }
    }
}

impl EstimatorConfig {
    /// Default configuration driven by a built-in curve.
    pub fn from_preset(preset: CurvePreset) -> Self {
        Self {
            checkpoints: preset.curve(),
            ..Default::default()
        }
    }

    /// Default configuration driven by a custom checkpoint table.
    pub fn from_checkpoints(checkpoints: Vec<Checkpoint>) -> Result<Self, ConfigError> {
        Ok(Self {
            checkpoints: ProgressCurve::new(checkpoints)?,
            ..Default::default()
        })
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check the settings the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    /// Set the tick interval.
    ///
    /// Millisecond granularity: a partial millisecond rounds up.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = whole_millis(interval);
        self
    }

    /// Set the grace delay.
    ///
    /// Millisecond granularity: a partial millisecond rounds up.
    pub fn with_grace_delay(mut self, delay: Duration) -> Self {
        self.grace_delay_ms = whole_millis(delay);
        self
    }

    /// Set the restart policy.
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Replace the curve.
    pub fn with_curve(mut self, curve: ProgressCurve) -> Self {
        self.checkpoints = curve;
        self
    }

    /// Period between percentage updates.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Pause at 100% before notifying the host.
    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }
}

fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros().div_ceil(1000)).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EstimatorConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.grace_delay(), Duration::from_secs(1));
        assert_eq!(config.restart_policy, RestartPolicy::CancelAndRestart);
        assert_eq!(config.checkpoints, ProgressCurve::ten_minute());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = EstimatorConfig::from_json_str(r#"{ "grace_delay_ms": 250 }"#).unwrap();
        assert_eq!(config.grace_delay(), Duration::from_millis(250));
        assert_eq!(config.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert_eq!(config.checkpoints, ProgressCurve::ten_minute());
    }

    #[test]
    fn test_full_json() {
        let json = r#"{
            "tick_interval_ms": 50,
            "grace_delay_ms": 500,
            "restart_policy": "queue_behind_completion",
            "checkpoints": [
                {"offset_secs": 0, "percentage": 0},
                {"offset_secs": 60, "percentage": 50},
                {"offset_secs": 120, "percentage": 70},
                {"offset_secs": 180, "percentage": 85},
                {"offset_secs": 360, "percentage": 99}
            ]
        }"#;
        let config = EstimatorConfig::from_json_str(json).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
        assert_eq!(config.restart_policy, RestartPolicy::QueueBehindCompletion);
        assert_eq!(config.checkpoints, ProgressCurve::six_minute());
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(matches!(
            EstimatorConfig::from_json_str(r#"{ "tick_interval_ms": 0 }"#),
            Err(ConfigError::ZeroTickInterval)
        ));
        assert!(matches!(
            EstimatorConfig::from_json_str(r#"{ "checkpoints": [] }"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            EstimatorConfig::from_checkpoints(vec![Checkpoint::at_secs(0, 0.0), Checkpoint::at_secs(0, 50.0)]),
            Err(ConfigError::Curve(CurveError::NonIncreasingOffset { index: 1 }))
        ));
    }

    #[test]
    fn test_from_checkpoints_accepts_short_table() {
        let config =
            EstimatorConfig::from_checkpoints(vec![Checkpoint::at_secs(0, 0.0), Checkpoint::at_secs(10, 50.0)])
                .unwrap();
        assert_eq!(config.checkpoints.percentage_at(Duration::from_secs(10)), 50.0);
        assert_eq!(config.checkpoints.percentage_at(Duration::from_secs(11)), 99.0);
    }

    #[test]
    fn test_sub_millisecond_durations_round_up() {
        let config = EstimatorConfig::default()
            .with_tick_interval(Duration::from_micros(500))
            .with_grace_delay(Duration::from_micros(1500));
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
        assert_eq!(config.grace_delay(), Duration::from_millis(2));
        assert!(config.validate().is_ok());

        let zero = EstimatorConfig::default().with_tick_interval(Duration::ZERO);
        assert!(matches!(zero.validate(), Err(ConfigError::ZeroTickInterval)));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = EstimatorConfig::from_preset(CurvePreset::SixMinute)
            .with_grace_delay(Duration::from_millis(1500))
            .with_restart_policy(RestartPolicy::QueueBehindCompletion);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EstimatorConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            EstimatorConfig::from_file("/nonexistent/qaagent.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
