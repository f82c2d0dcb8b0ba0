//! QA Agent core data models.
//!
//! This crate defines the progress session model shown while the QA Agent
//! backend works on a story: checkpoint curves, the session state machine,
//! and estimator configuration. It has no runtime dependency; the timers
//! live in `qaagent-progress`.

#![warn(missing_docs)]

// Core identities
mod id;

// Curve and session
mod curve;
mod session;

// Configuration
mod config;

// Re-exports
pub use id::*;

pub use curve::{Checkpoint, CurveError, CurvePreset, ProgressCurve, CEILING};
pub use session::{Phase, ProgressSnapshot, SessionState, StopOutcome, COMPLETE};
pub use config::{
    ConfigError, EstimatorConfig, RestartPolicy, DEFAULT_GRACE_DELAY_MS, DEFAULT_TICK_INTERVAL_MS,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
