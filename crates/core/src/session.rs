//! Progress session model - one activation-to-completion lifecycle.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::curve::ProgressCurve;
use crate::id::SessionId;
use crate::Time;

/// Percentage reported once the host confirms completion.
pub const COMPLETE: f64 = 100.0;

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No session
    Idle,
    /// Shadowed operation in flight, percentage follows the curve
    Running,
    /// Operation confirmed finished, showing 100% during the grace delay
    Completing,
    /// Grace delay over, host is being notified
    Done,
}

impl Phase {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Completing => "completing",
            Phase::Done => "done",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time view of the estimator, as published to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Current session, if any
    pub session: Option<SessionId>,

    /// Current phase
    pub phase: Phase,

    /// Estimated completion percentage
    pub percentage: f64,

    /// Time since the session started, as of the last tick
    pub elapsed: Duration,

    /// Opaque label supplied by the host
    pub label: Option<String>,

    /// Wall-clock start of the session
    pub started_at: Option<Time>,
}

impl ProgressSnapshot {
    /// Snapshot of an estimator with no session.
    pub fn idle() -> Self {
        Self {
            session: None,
            phase: Phase::Idle,
            percentage: 0.0,
            elapsed: Duration::ZERO,
            label: None,
            started_at: None,
        }
    }

    /// Whether a progress indicator should be rendered.
    pub fn is_visible(&self) -> bool {
        self.phase != Phase::Idle
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// What a call to [`SessionState::stop`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Session jumped to 100% and awaits its grace delay
    Completing(SessionId),
    /// Session ended before any progress was shown, no notification due
    Reset(SessionId),
    /// Nothing was running
    Ignored,
}

/// Clock-injected session state machine.
///
/// Every transition takes the current instant from the caller, so the
/// machine itself never reads a clock and never sleeps.
#[derive(Debug, Clone)]
pub struct SessionState {
    curve: ProgressCurve,
    phase: Phase,
    session: Option<SessionId>,
    started: Option<Instant>,
    started_at: Option<Time>,
    elapsed: Duration,
    percentage: f64,
    label: Option<String>,
}

impl SessionState {
    /// Create an idle state machine driven by `curve`.
    pub fn new(curve: ProgressCurve) -> Self {
        Self {
            curve,
            phase: Phase::Idle,
            session: None,
            started: None,
            started_at: None,
            elapsed: Duration::ZERO,
            percentage: 0.0,
            label: None,
        }
    }

    /// Begin a new session at `now`, discarding whatever was in progress.
    pub fn start(&mut self, now: Instant, label: Option<String>) -> SessionId {
        let id = SessionId::new();
        self.phase = Phase::Running;
        self.session = Some(id);
        self.started = Some(now);
        self.started_at = Some(chrono::Utc::now());
        self.elapsed = Duration::ZERO;
        self.percentage = 0.0;
        self.label = label;
        id
    }

    /// Recompute the percentage for session `id` at `now`.
    ///
    /// Returns `None` when `id` is not the running session.
    pub fn tick(&mut self, id: SessionId, now: Instant) -> Option<f64> {
        if self.phase != Phase::Running || self.session != Some(id) {
            return None;
        }
        let started = self.started?;

        self.elapsed = now.saturating_duration_since(started);
        let estimate = self.curve.percentage_at(self.elapsed);
        self.percentage = self.percentage.max(estimate);
        Some(self.percentage)
    }

    /// The host confirmed the shadowed operation ended.
    pub fn stop(&mut self) -> StopOutcome {
        let Some(id) = self.session else {
            return StopOutcome::Ignored;
        };
        if self.phase != Phase::Running {
            return StopOutcome::Ignored;
        }

        if self.percentage > 0.0 {
            self.phase = Phase::Completing;
            self.percentage = COMPLETE;
            StopOutcome::Completing(id)
        } else {
            self.reset();
            StopOutcome::Reset(id)
        }
    }

    /// End the grace delay of session `id`.
    ///
    /// Returns the `Done` snapshot to hand to the host and leaves the
    /// machine idle, or `None` if `id` is not completing.
    pub fn finish(&mut self, id: SessionId) -> Option<ProgressSnapshot> {
        if self.phase != Phase::Completing || self.session != Some(id) {
            return None;
        }

        self.phase = Phase::Done;
        let done = self.snapshot();
        self.reset();
        Some(done)
    }

    /// Discard the session without notification.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.session = None;
        self.started = None;
        self.started_at = None;
        self.elapsed = Duration::ZERO;
        self.percentage = 0.0;
        self.label = None;
    }

    /// Current percentage estimate.
    pub fn sample(&self) -> f64 {
        self.percentage
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current session id.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session
    }

    /// The curve driving running sessions.
    pub fn curve(&self) -> &ProgressCurve {
        &self.curve
    }

    /// Whether a progress indicator should be rendered.
    pub fn is_visible(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Capture the current state.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            session: self.session,
            phase: self.phase,
            percentage: self.percentage,
            elapsed: self.elapsed,
            label: self.label.clone(),
            started_at: self.started_at,
        }
    }
}
