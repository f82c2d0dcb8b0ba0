//! Progress estimation (host layer)
//!
//! Timer-driven estimator that simulates progress for slow backend calls,
//! and the adapters a host uses to drive it.

#![warn(missing_docs)]

pub mod estimator;
pub mod tracker;

pub use estimator::{CompletionCallback, EstimatorError, ProgressEstimator, Result, StartOutcome};
pub use tracker::{track, ActivityTracker};
