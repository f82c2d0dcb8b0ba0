//! Checkpoint tables and the piecewise-linear progress curve.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest percentage a running session may report.
///
/// 100 is reserved for completion confirmed by the host.
pub const CEILING: f64 = 99.0;

/// Errors raised when a checkpoint table is malformed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CurveError {
    /// No checkpoints at all
    #[error("checkpoint table is empty")]
    Empty,

    /// First checkpoint is not (0, 0)
    #[error("checkpoint table must start at (0s, 0%)")]
    InvalidOrigin,

    /// Offset could not be represented as a duration
    #[error("invalid checkpoint offset: {secs}s")]
    InvalidOffset {
        /// The rejected offset in seconds
        secs: f64,
    },

    /// Percentage is NaN, infinite or negative
    #[error("checkpoint {index} has a non-finite or negative percentage")]
    NotFinite {
        /// Position in the table
        index: usize,
    },

    /// Offset does not increase
    #[error("checkpoint {index} offset does not increase")]
    NonIncreasingOffset {
        /// Position in the table
        index: usize,
    },

    /// Percentage does not increase
    #[error("checkpoint {index} percentage does not increase")]
    NonIncreasingPercentage {
        /// Position in the table
        index: usize,
    },

    /// Percentage above the running ceiling
    #[error("checkpoint {index} exceeds 99%")]
    AboveCeiling {
        /// Position in the table
        index: usize,
    },
}

/// A single (elapsed time, target percentage) point on the curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCheckpoint", into = "RawCheckpoint")]
pub struct Checkpoint {
    /// Time since the session started
    pub offset: Duration,

    /// Percentage reached at `offset`
    pub percentage: f64,
}

impl Checkpoint {
    /// Create a checkpoint.
    pub fn new(offset: Duration, percentage: f64) -> Self {
        Self { offset, percentage }
    }

    /// Create a checkpoint at a whole number of seconds.
    pub fn at_secs(secs: u64, percentage: f64) -> Self {
        Self::new(Duration::from_secs(secs), percentage)
    }
}

/// Wire form of a checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawCheckpoint {
    offset_secs: f64,
    percentage: f64,
}

impl TryFrom<RawCheckpoint> for Checkpoint {
    type Error = CurveError;

    fn try_from(raw: RawCheckpoint) -> Result<Self, Self::Error> {
        let offset = Duration::try_from_secs_f64(raw.offset_secs).map_err(|_| {
            CurveError::InvalidOffset {
                secs: raw.offset_secs,
            }
        })?;
        Ok(Self::new(offset, raw.percentage))
    }
}

impl From<Checkpoint> for RawCheckpoint {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            offset_secs: checkpoint.offset.as_secs_f64(),
            percentage: checkpoint.percentage,
        }
    }
}

/// A validated, monotonic checkpoint table.
///
/// The percentage between two checkpoints is linearly interpolated.
/// Past the last checkpoint it holds at [`CEILING`]. A table holding only
/// the origin is accepted and pins the percentage at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Checkpoint>", into = "Vec<Checkpoint>")]
pub struct ProgressCurve {
    checkpoints: Vec<Checkpoint>,
}

impl ProgressCurve {
    /// Validate a checkpoint table and build a curve from it.
    pub fn new(checkpoints: Vec<Checkpoint>) -> Result<Self, CurveError> {
        let first = checkpoints.first().ok_or(CurveError::Empty)?;
        if !first.offset.is_zero() || first.percentage != 0.0 {
            return Err(CurveError::InvalidOrigin);
        }

        for (index, checkpoint) in checkpoints.iter().enumerate() {
            if !checkpoint.percentage.is_finite() || checkpoint.percentage < 0.0 {
                return Err(CurveError::NotFinite { index });
            }
            if checkpoint.percentage > CEILING {
                return Err(CurveError::AboveCeiling { index });
            }
        }

        for (i, pair) in checkpoints.windows(2).enumerate() {
            let index = i + 1;
            if pair[1].offset <= pair[0].offset {
                return Err(CurveError::NonIncreasingOffset { index });
            }
            if pair[1].percentage <= pair[0].percentage {
                return Err(CurveError::NonIncreasingPercentage { index });
            }
        }

        Ok(Self { checkpoints })
    }

    /// Ten-minute schedule for the slowest backend calls.
    pub fn ten_minute() -> Self {
        Self {
            checkpoints: vec![
                Checkpoint::at_secs(0, 0.0),
                Checkpoint::at_secs(60, 40.0),
                Checkpoint::at_secs(120, 60.0),
                Checkpoint::at_secs(180, 72.0),
                Checkpoint::at_secs(300, 82.0),
                Checkpoint::at_secs(600, 99.0),
            ],
        }
    }

    /// Six-minute schedule used for shorter backend calls.
    pub fn six_minute() -> Self {
        Self {
            checkpoints: vec![
                Checkpoint::at_secs(0, 0.0),
                Checkpoint::at_secs(60, 50.0),
                Checkpoint::at_secs(120, 70.0),
                Checkpoint::at_secs(180, 85.0),
                Checkpoint::at_secs(360, 99.0),
            ],
        }
    }

    /// Estimated percentage after `elapsed` time in a running session.
    pub fn percentage_at(&self, elapsed: Duration) -> f64 {
        if self.checkpoints.len() < 2 {
            return 0.0;
        }

        for pair in self.checkpoints.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if elapsed <= to.offset {
                let span = (to.offset - from.offset).as_secs_f64();
                let into = elapsed.saturating_sub(from.offset).as_secs_f64();
                let value = from.percentage + into / span * (to.percentage - from.percentage);
                return value.clamp(0.0, CEILING);
            }
        }

        CEILING
    }

    /// The checkpoints, in order.
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Offset of the last checkpoint.
    pub fn horizon(&self) -> Duration {
        self.checkpoints
            .last()
            .map(|c| c.offset)
            .unwrap_or_default()
    }
}

impl Default for ProgressCurve {
    fn default() -> Self {
        Self::ten_minute()
    }
}

impl TryFrom<Vec<Checkpoint>> for ProgressCurve {
    type Error = CurveError;

    fn try_from(checkpoints: Vec<Checkpoint>) -> Result<Self, Self::Error> {
        Self::new(checkpoints)
    }
}

impl From<ProgressCurve> for Vec<Checkpoint> {
    fn from(curve: ProgressCurve) -> Self {
        curve.checkpoints
    }
}

/// Built-in checkpoint tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurvePreset {
    /// Reaches 99% after ten minutes
    TenMinute,
    /// Reaches 99% after six minutes
    SixMinute,
}

impl CurvePreset {
    /// Every preset.
    pub const ALL: [CurvePreset; 2] = [CurvePreset::TenMinute, CurvePreset::SixMinute];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CurvePreset::TenMinute => "ten-minute",
            CurvePreset::SixMinute => "six-minute",
        }
    }

    /// Build the curve for this preset.
    pub fn curve(&self) -> ProgressCurve {
        match self {
            CurvePreset::TenMinute => ProgressCurve::ten_minute(),
            CurvePreset::SixMinute => ProgressCurve::six_minute(),
        }
    }
}

impl std::fmt::Display for CurvePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurvePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurvePreset::ALL
            .into_iter()
            .find(|preset| preset.as_str() == s)
            .ok_or_else(|| format!("unknown curve preset: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_presets_validate() {
        for preset in CurvePreset::ALL {
            let curve = preset.curve();
            assert_eq!(ProgressCurve::new(curve.checkpoints().to_vec()), Ok(curve));
        }
    }

    #[test]
    fn test_ten_minute_midpoint() {
        let curve = ProgressCurve::ten_minute();
        assert!((curve.percentage_at(secs(90.0)) - 50.0).abs() < EPSILON);
        assert_eq!(curve.percentage_at(secs(700.0)), 99.0);
    }

    #[test]
    fn test_six_minute_first_segment() {
        let curve = ProgressCurve::six_minute();
        assert!((curve.percentage_at(secs(30.0)) - 25.0).abs() < EPSILON);
    }

    #[test]
    fn test_exact_at_checkpoints() {
        for preset in CurvePreset::ALL {
            let curve = preset.curve();
            for checkpoint in curve.checkpoints() {
                let value = curve.percentage_at(checkpoint.offset);
                assert!(
                    (value - checkpoint.percentage).abs() < EPSILON,
                    "{} at {:?}: {} != {}",
                    preset,
                    checkpoint.offset,
                    value,
                    checkpoint.percentage
                );
            }
        }
    }

    #[test]
    fn test_bounded_and_monotonic() {
        for preset in CurvePreset::ALL {
            let curve = preset.curve();
            let mut previous = 0.0;
            // Every 100ms out to twelve minutes.
            for step in 0..=7200u64 {
                let value = curve.percentage_at(Duration::from_millis(step * 100));
                assert!((0.0..=CEILING).contains(&value));
                assert!(value >= previous, "{} decreased at step {}", preset, step);
                previous = value;
            }
        }
    }

    #[test]
    fn test_pinned_past_horizon() {
        let curve = ProgressCurve::six_minute();
        assert_eq!(curve.horizon(), secs(360.0));
        assert_eq!(curve.percentage_at(secs(361.0)), CEILING);
        assert_eq!(curve.percentage_at(secs(86_400.0)), CEILING);
    }

    #[test]
    fn test_origin_only_table_pins_zero() {
        let curve = ProgressCurve::new(vec![Checkpoint::at_secs(0, 0.0)]).unwrap();
        assert_eq!(curve.percentage_at(Duration::ZERO), 0.0);
        assert_eq!(curve.percentage_at(secs(3600.0)), 0.0);
    }

    #[test]
    fn test_rejects_malformed_tables() {
        assert_eq!(ProgressCurve::new(vec![]), Err(CurveError::Empty));
        assert_eq!(
            ProgressCurve::new(vec![Checkpoint::at_secs(5, 0.0), Checkpoint::at_secs(10, 99.0)]),
            Err(CurveError::InvalidOrigin)
        );
        assert_eq!(
            ProgressCurve::new(vec![
                Checkpoint::at_secs(0, 0.0),
                Checkpoint::at_secs(60, 40.0),
                Checkpoint::at_secs(60, 99.0),
            ]),
            Err(CurveError::NonIncreasingOffset { index: 2 })
        );
        assert_eq!(
            ProgressCurve::new(vec![
                Checkpoint::at_secs(0, 0.0),
                Checkpoint::at_secs(60, 50.0),
                Checkpoint::at_secs(120, 40.0),
                Checkpoint::at_secs(180, 99.0),
            ]),
            Err(CurveError::NonIncreasingPercentage { index: 2 })
        );
        assert_eq!(
            ProgressCurve::new(vec![Checkpoint::at_secs(0, 0.0), Checkpoint::at_secs(60, 100.0)]),
            Err(CurveError::AboveCeiling { index: 1 })
        );
        assert_eq!(
            ProgressCurve::new(vec![Checkpoint::at_secs(0, 0.0), Checkpoint::at_secs(60, f64::NAN)]),
            Err(CurveError::NotFinite { index: 1 })
        );
    }

    #[test]
    fn test_short_table_pins_to_ceiling_past_horizon() {
        let curve =
            ProgressCurve::new(vec![Checkpoint::at_secs(0, 0.0), Checkpoint::at_secs(60, 80.0)]).unwrap();
        assert!((curve.percentage_at(secs(30.0)) - 40.0).abs() < EPSILON);
        assert!((curve.percentage_at(secs(60.0)) - 80.0).abs() < EPSILON);
        assert_eq!(curve.percentage_at(secs(61.0)), CEILING);
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"[{"offset_secs": 0, "percentage": 0}, {"offset_secs": 30, "percentage": 99}]"#;
        let curve: ProgressCurve = serde_json::from_str(json).unwrap();
        assert!((curve.percentage_at(secs(15.0)) - 49.5).abs() < EPSILON);

        let bad = r#"[{"offset_secs": 0, "percentage": 0}, {"offset_secs": 30, "percentage": 10}, {"offset_secs": 20, "percentage": 99}]"#;
        assert!(serde_json::from_str::<ProgressCurve>(bad).is_err());

        let negative = r#"[{"offset_secs": -1, "percentage": 0}]"#;
        assert!(serde_json::from_str::<ProgressCurve>(negative).is_err());
    }

    #[test]
    fn test_preset_names() {
        assert_eq!("ten-minute".parse::<CurvePreset>(), Ok(CurvePreset::TenMinute));
        assert_eq!("six-minute".parse::<CurvePreset>(), Ok(CurvePreset::SixMinute));
        assert!("fortnight".parse::<CurvePreset>().is_err());
        assert_eq!(
            serde_json::to_string(&CurvePreset::SixMinute).unwrap(),
            "\"six-minute\""
        );
    }
}
