//! Timer-driven progress estimator.
//!
//! Shadows a long-running operation whose real progress is unobservable.
//! While a session runs, a tick task republishes the curve estimate; on
//! `stop` the estimate jumps to 100% and a grace timer notifies the host
//! once the completion has been visible for a moment.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use qaagent_core::{
    ConfigError, CurvePreset, EstimatorConfig, Phase, ProgressSnapshot, RestartPolicy, SessionId,
    SessionState, StopOutcome,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Errors that can occur when driving the estimator.
#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    /// Timers need a Tokio runtime
    #[error("progress estimator must be started from within a Tokio runtime")]
    NoRuntime,

    /// Rejected configuration
    #[error("invalid estimator configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for estimator operations.
pub type Result<T> = std::result::Result<T, EstimatorError>;

/// What a call to [`ProgressEstimator::start_with_label`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session is running
    Started(SessionId),
    /// The start waits until the completing session has notified the host
    Queued {
        /// Session whose grace delay is still running
        behind: Option<SessionId>,
    },
}

/// Completion notification, called once per session with its `Done` snapshot.
pub type CompletionCallback = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Mutable estimator state, guarded by one lock.
struct Inner {
    state: SessionState,
    runtime: Option<Handle>,
    ticker: Option<JoinHandle<()>>,
    grace: Option<JoinHandle<()>>,
    /// Label of a start deferred until the current completion is shown
    queued: Option<Option<String>>,
    on_done: Option<CompletionCallback>,
}

impl Inner {
    fn cancel_timers(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(grace) = self.grace.take() {
            grace.abort();
        }
    }
}

struct Shared {
    config: EstimatorConfig,
    inner: Mutex<Inner>,
    updates: watch::Sender<ProgressSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, snapshot: ProgressSnapshot) {
        self.updates.send_replace(snapshot);
    }

    /// Start a fresh session. Caller holds the lock.
    fn begin_session(
        self: &Arc<Self>,
        inner: &mut Inner,
        runtime: Handle,
        label: Option<String>,
    ) -> SessionId {
        inner.cancel_timers();
        inner.queued = None;

        let now = Instant::now();
        let id = inner.state.start(now.into_std(), label);
        inner.ticker = Some(spawn_ticker(
            &runtime,
            Arc::downgrade(self),
            id,
            now,
            self.config.tick_interval(),
        ));
        inner.runtime = Some(runtime);

        info!("Progress session {} started", id);
        self.publish(inner.state.snapshot());
        id
    }

    /// Handle one sampling tick. Returns false once the session is gone.
    fn tick(&self, id: SessionId) -> bool {
        let mut inner = self.lock();
        match inner.state.tick(id, Instant::now().into_std()) {
            Some(_) => {
                self.publish(inner.state.snapshot());
                true
            }
            None => false,
        }
    }

    /// End the grace delay for session `id` and notify the host.
    fn finish(self: &Arc<Self>, id: SessionId) {
        let (done, callback) = {
            let mut inner = self.lock();
            let Some(done) = inner.state.finish(id) else {
                return;
            };
            inner.grace = None;
            self.publish(done.clone());
            self.publish(inner.state.snapshot());
            (done, inner.on_done.clone())
        };

        info!("Progress session {} done", id);
        if let Some(callback) = callback {
            callback(&done);
        }

        let mut inner = self.lock();
        if inner.state.phase() != Phase::Idle {
            return;
        }
        if let Some(label) = inner.queued.take() {
            if let Some(runtime) = inner.runtime.clone() {
                debug!("Starting queued progress session after {}", id);
                self.begin_session(&mut inner, runtime, label);
            }
        }
    }
}

fn spawn_ticker(
    runtime: &Handle,
    shared: Weak<Shared>,
    id: SessionId,
    started: Instant,
    period: Duration,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        let mut interval = tokio::time::interval_at(started + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(strong) = shared.upgrade() else {
                break;
            };
            if !strong.tick(id) {
                debug!("Ticker for progress session {} stopped", id);
                break;
            }
        }
    })
}

fn spawn_grace(runtime: &Handle, shared: Weak<Shared>, id: SessionId, delay: Duration) -> JoinHandle<()> {
    runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(strong) = shared.upgrade() {
            strong.finish(id);
        }
    })
}

/// Simulated progress for an operation whose real progress is unknown.
///
/// Never reports 100% until [`stop`](Self::stop) confirms the operation
/// ended. Dropping the estimator cancels both timers; no notification
/// fires afterwards.
pub struct ProgressEstimator {
    shared: Arc<Shared>,
}

impl ProgressEstimator {
    /// Create an idle estimator.
    pub fn new(config: EstimatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create an estimator with default timing and a built-in curve.
    pub fn from_preset(preset: CurvePreset) -> Self {
        Self::build(EstimatorConfig::from_preset(preset))
    }

    fn build(config: EstimatorConfig) -> Self {
        let state = SessionState::new(config.checkpoints.clone());
        let (updates, _) = watch::channel(ProgressSnapshot::idle());
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner {
                    state,
                    runtime: None,
                    ticker: None,
                    grace: None,
                    queued: None,
                    on_done: None,
                }),
                updates,
            }),
        }
    }

    /// Register the completion notification.
    pub fn with_on_done<F>(self, callback: F) -> Self
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        self.set_on_done(callback);
        self
    }

    /// Replace the completion notification.
    pub fn set_on_done<F>(&self, callback: F)
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        self.shared.lock().on_done = Some(Arc::new(callback));
    }

    /// Configuration in use.
    pub fn config(&self) -> &EstimatorConfig {
        &self.shared.config
    }

    /// Begin a session without a label.
    pub fn start(&self) -> Result<StartOutcome> {
        self.start_with_label(None)
    }

    /// Begin a session.
    ///
    /// A running session is discarded and its clock restarts from zero.
    /// During the grace delay the [`RestartPolicy`] decides whether the
    /// pending notification is cancelled or the start waits behind it.
    pub fn start_with_label(&self, label: Option<String>) -> Result<StartOutcome> {
        let runtime = Handle::try_current().map_err(|_| EstimatorError::NoRuntime)?;
        let mut inner = self.shared.lock();

        let outcome = match (inner.state.phase(), self.shared.config.restart_policy) {
            (Phase::Completing, RestartPolicy::QueueBehindCompletion) => {
                let behind = inner.state.session_id();
                debug!("Queueing progress session behind {:?}", behind);
                inner.queued = Some(label);
                StartOutcome::Queued { behind }
            }
            (Phase::Running, _) | (Phase::Completing, _) => {
                debug!("Restarting progress session {:?}", inner.state.session_id());
                StartOutcome::Started(self.shared.begin_session(&mut inner, runtime, label))
            }
            _ => StartOutcome::Started(self.shared.begin_session(&mut inner, runtime, label)),
        };
        Ok(outcome)
    }

    /// Signal that the shadowed operation ended, successfully or not.
    ///
    /// Jumps to 100% and arms the grace timer if any progress was shown,
    /// otherwise returns straight to idle without notification. A start
    /// still queued behind a completion is dropped.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();

        if inner.queued.take().is_some() {
            debug!("Dropping queued progress session");
        }

        match inner.state.stop() {
            StopOutcome::Completing(id) => {
                if let Some(ticker) = inner.ticker.take() {
                    ticker.abort();
                }
                if let Some(runtime) = inner.runtime.clone() {
                    inner.grace = Some(spawn_grace(
                        &runtime,
                        Arc::downgrade(&self.shared),
                        id,
                        self.shared.config.grace_delay(),
                    ));
                }
                debug!("Progress session {} completing", id);
                self.shared.publish(inner.state.snapshot());
            }
            StopOutcome::Reset(id) => {
                inner.cancel_timers();
                debug!("Progress session {} stopped before any progress", id);
                self.shared.publish(inner.state.snapshot());
            }
            StopOutcome::Ignored => {}
        }
    }

    /// Discard any session and cancel both timers without notification.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        inner.cancel_timers();
        inner.queued = None;
        inner.state.reset();
        self.shared.publish(inner.state.snapshot());
    }

    /// Current percentage estimate.
    pub fn sample(&self) -> f64 {
        self.shared.lock().state.sample()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.shared.lock().state.phase()
    }

    /// Whether a progress indicator should be rendered.
    pub fn is_visible(&self) -> bool {
        self.shared.lock().state.is_visible()
    }

    /// Capture the current state.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.shared.lock().state.snapshot()
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Wait until session `id` is no longer current.
    pub async fn wait_session_end(&self, id: SessionId) {
        let mut updates = self.subscribe();
        let _ = updates.wait_for(|snapshot| snapshot.session != Some(id)).await;
    }

    /// Wait for a session other than `behind` to start.
    ///
    /// Returns `None` if the estimator settles idle with nothing queued,
    /// which happens when a queued start is dropped by `stop` or `shutdown`.
    pub async fn wait_session_start(&self, behind: Option<SessionId>) -> Option<SessionId> {
        let mut updates = self.subscribe();
        loop {
            {
                let inner = self.shared.lock();
                let current = inner.state.session_id();
                match inner.state.phase() {
                    Phase::Running | Phase::Completing if current != behind => return current,
                    Phase::Idle if inner.queued.is_none() => return None,
                    _ => {}
                }
            }
            updates.changed().await.ok()?;
        }
    }

    /// Wait until no session is visible.
    pub async fn wait_idle(&self) {
        let mut updates = self.subscribe();
        let _ = updates.wait_for(|snapshot| !snapshot.is_visible()).await;
    }
}

impl Drop for ProgressEstimator {
    fn drop(&mut self) {
        self.shared.lock().cancel_timers();
    }
}
