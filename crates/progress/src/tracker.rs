//! Host-side adapters over the estimator.
//!
//! UI hosts usually hold an "operation in progress" flag rather than
//! calling `start`/`stop` themselves. [`ActivityTracker`] turns edges of
//! that flag into estimator calls, and [`track`] wraps a future so the
//! estimator shadows it from issue to settlement.

use std::future::Future;

use qaagent_core::ProgressSnapshot;
use tracing::debug;

use crate::estimator::{ProgressEstimator, Result, StartOutcome};

/// Edge-triggered `active` flag in front of a [`ProgressEstimator`].
pub struct ActivityTracker {
    estimator: ProgressEstimator,
    active: bool,
    label: Option<String>,
}

impl ActivityTracker {
    /// Create an inactive tracker.
    pub fn new(estimator: ProgressEstimator) -> Self {
        Self {
            estimator,
            active: false,
            label: None,
        }
    }

    /// Set the label passed to the next session.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.set_label(label);
        self
    }

    /// Set the label passed to the next session.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// Update the flag.
    ///
    /// false→true starts a session and true→false stops it. Setting the
    /// value it already has does nothing.
    pub fn set_active(&mut self, active: bool) -> Result<()> {
        if active == self.active {
            return Ok(());
        }

        if active {
            self.estimator.start_with_label(self.label.clone())?;
        } else {
            self.estimator.stop();
        }
        debug!("Activity flag set to {}", active);
        self.active = active;
        Ok(())
    }

    /// Current flag value.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current percentage estimate.
    pub fn percentage(&self) -> f64 {
        self.estimator.sample()
    }

    /// Whether a progress indicator should be rendered.
    pub fn is_visible(&self) -> bool {
        self.estimator.is_visible()
    }

    /// Capture the current state.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.estimator.snapshot()
    }

    /// The underlying estimator.
    pub fn estimator(&self) -> &ProgressEstimator {
        &self.estimator
    }
}

/// Shadow `operation` with a progress session.
///
/// Starts a session, awaits the operation, stops the session, and returns
/// the operation's output once the completion has been shown (or straight
/// away if it settled before any progress appeared). The output is not
/// inspected: a failed operation completes the bar like a successful one.
///
/// If the start is queued behind another session's completion, the
/// operation is not awaited until that queued session is running.
pub async fn track<F>(
    estimator: &ProgressEstimator,
    label: impl Into<String>,
    operation: F,
) -> Result<F::Output>
where
    F: Future,
{
    let session = match estimator.start_with_label(Some(label.into()))? {
        StartOutcome::Started(id) => Some(id),
        StartOutcome::Queued { behind } => estimator.wait_session_start(behind).await,
    };

    let output = operation.await;

    estimator.stop();
    if let Some(id) = session {
        estimator.wait_session_end(id).await;
    }
    Ok(output)
}
