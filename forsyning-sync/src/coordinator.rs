//! Refresh coordinator.
//!
//! Owns one entry's update cycle: runs the connector pipeline, updates the
//! cached dataset, decides whether to retry, and notifies listeners.
//!
//! ```text
//!   Idle ──trigger──▶ Fetching ──success──▶ Idle
//!                        │
//!                        └──failure / unexpected gap──▶ Retrying ──retry timer──▶ Fetching
//! ```
//!
//! Triggers that arrive while `Fetching` or `Retrying` are coalesced; only the
//! pending retry timer may leave `Retrying`.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use forsyning_fetch::{BackoffPolicy, ConnectorPipeline, FetchContext, RetryState};
use forsyning_store::{DatasetStore, UpdateSignal};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};

// ============================================================================
// Phase & Outcome
// ============================================================================

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a trigger.
    Idle,
    /// An update is in flight.
    Fetching,
    /// A retry timer is pending.
    Retrying,
}

/// What started an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTrigger {
    /// The daily fetch window.
    Scheduled,
    /// An explicit refresh request.
    Manual,
    /// The optional scan-interval poll.
    IntervalPoll,
    /// The pending retry timer.
    RetryTimer,
}

impl fmt::Display for UpdateTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
            Self::IntervalPoll => "interval_poll",
            Self::RetryTimer => "retry_timer",
        })
    }
}

/// Why a retry was scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// The pipeline failed.
    Failure {
        /// Error classification (`authentication_failure`, `no_meters`, ...).
        classification: &'static str,
        /// Error message.
        message: String,
    },
    /// Today's data arrived but next-day data is missing past its publish time.
    MissingTomorrow,
}

/// Result of one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The dataset was replaced.
    Updated {
        /// Whether next-day data arrived.
        tomorrow_valid: bool,
    },
    /// Today's data arrived; next-day data is not due yet.
    NotYetPublished,
    /// The update failed or next-day data is overdue; a retry is pending.
    RetryScheduled {
        /// Delay before the retry.
        delay: Duration,
        /// Consecutive failures including this one.
        retry_count: u32,
        /// Why.
        reason: RetryReason,
    },
    /// Another update is in flight or a retry is pending; nothing was done.
    Coalesced,
    /// The coordinator has been torn down.
    TornDown,
}

/// Per-connector data the coordinator needs after a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorProfile {
    /// Name recorded as the dataset source.
    pub display_name: String,
    /// Local time after which next-day data is expected.
    pub publish_time: Option<NaiveTime>,
}

// ============================================================================
// Coordinator
// ============================================================================

struct CycleState {
    phase: Phase,
    retry: RetryState,
}

struct Inner {
    entry_id: String,
    pipeline: ConnectorPipeline,
    ctx: FetchContext,
    profiles: HashMap<String, ConnectorProfile>,
    policy: BackoffPolicy,
    dataset: DatasetStore,
    signal: UpdateSignal,
    clock: Arc<dyn Clock>,
    state: Mutex<CycleState>,
    alive: AtomicBool,
    cancel: CancellationToken,
    retry_task: Mutex<Option<JoinHandle<()>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Refresh coordinator for one entry. Cloning shares the coordinator.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Puts a `Fetching` coordinator back to `Idle` when its update future is
/// dropped before the cycle finished.
struct CycleGuard<'a> {
    state: &'a Mutex<CycleState>,
    armed: bool,
}

impl<'a> CycleGuard<'a> {
    fn new(state: &'a Mutex<CycleState>) -> Self {
        Self { state, armed: true }
    }

    fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock(self.state);
        if state.phase == Phase::Fetching {
            state.phase = Phase::Idle;
            debug!("Update cancelled before completion, back to idle");
        }
    }
}

impl RefreshCoordinator {
    /// Creates a builder.
    pub fn builder(entry_id: impl Into<String>, pipeline: ConnectorPipeline) -> CoordinatorBuilder {
        CoordinatorBuilder::new(entry_id, pipeline)
    }

    /// Entry this coordinator serves.
    pub fn entry_id(&self) -> &str {
        &self.inner.entry_id
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        lock(&self.inner.state).phase
    }

    /// Current retry counter and delay.
    pub fn retry_state(&self) -> RetryState {
        lock(&self.inner.state).retry
    }

    /// The cached dataset.
    pub fn dataset(&self) -> &DatasetStore {
        &self.inner.dataset
    }

    /// The entry's update signal.
    pub fn signal(&self) -> &UpdateSignal {
        &self.inner.signal
    }

    /// Configured time zone.
    pub fn time_zone(&self) -> Tz {
        self.inner.ctx.time_zone()
    }

    /// Clock used for schedule decisions.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// False once [`teardown`](Self::teardown) has started.
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Token cancelled on teardown; scheduled tasks select on a child of it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.child_token()
    }

    /// Hands a scheduled task's handle to the coordinator for teardown.
    pub fn register_handle(&self, handle: JoinHandle<()>) {
        if self.is_alive() {
            lock(&self.inner.handles).push(handle);
        } else {
            handle.abort();
        }
    }

    /// Runs an update outside the schedule.
    pub async fn refresh(&self) -> UpdateOutcome {
        self.update(UpdateTrigger::Manual).await
    }

    /// Runs one update cycle.
    #[instrument(skip(self), fields(entry = %self.inner.entry_id))]
    pub async fn update(&self, trigger: UpdateTrigger) -> UpdateOutcome {
        if !self.is_alive() {
            return UpdateOutcome::TornDown;
        }

        {
            let mut state = lock(&self.inner.state);
            let allowed = match (trigger, state.phase) {
                (UpdateTrigger::RetryTimer, Phase::Retrying) => true,
                (UpdateTrigger::RetryTimer, _) => false,
                (_, phase) => phase == Phase::Idle,
            };
            if !allowed {
                debug!(phase = ?state.phase, "Update already pending, coalescing trigger");
                return UpdateOutcome::Coalesced;
            }
            state.phase = Phase::Fetching;
        }
        let guard = CycleGuard::new(&self.inner.state);

        debug!("Getting latest dataset");
        let outcome = self.inner.pipeline.execute(&self.inner.ctx).await;

        if !self.is_alive() {
            debug!("Coordinator torn down during update, discarding result");
            return UpdateOutcome::TornDown;
        }

        let now = self.inner.clock.now();
        let result = match outcome.result {
            Ok(payload) => {
                let profile = self.inner.profiles.get(&payload.connector_id);
                let source = profile.map_or(payload.connector_id.as_str(), |p| {
                    p.display_name.as_str()
                });
                debug!(source, attempts = outcome.attempts.len(), "Got values");
                let publish_time = profile.and_then(|p| p.publish_time);
                let source = source.to_string();

                if self.inner.dataset.apply(payload, &source, now).await {
                    self.succeed(UpdateOutcome::Updated {
                        tomorrow_valid: true,
                    })
                } else {
                    self.handle_missing_tomorrow(publish_time, now)
                }
            }
            Err(error) => {
                if error.is_transient() {
                    warn!(error = %error, "Server disconnected");
                }
                self.inner.dataset.invalidate_tomorrow().await;
                self.schedule_retry(RetryReason::Failure {
                    classification: error.classification(),
                    message: error.to_string(),
                })
            }
        };

        guard.complete();
        self.inner.signal.notify();
        result
    }

    fn handle_missing_tomorrow(
        &self,
        publish_time: Option<NaiveTime>,
        now: DateTime<Utc>,
    ) -> UpdateOutcome {
        let Some(publish_time) = publish_time else {
            return self.succeed(UpdateOutcome::Updated {
                tomorrow_valid: false,
            });
        };

        let local = now.with_timezone(&self.time_zone());
        debug!(now = %local.format("%H:%M:%S"), publish = %publish_time, "Next-day data missing");

        // Local time of day past the publish time is also before the coming
        // midnight, after which tomorrow's data no longer matters.
        if local.time() >= publish_time {
            self.schedule_retry(RetryReason::MissingTomorrow)
        } else {
            debug!("Not forcing refresh, next-day data is not due yet");
            self.succeed(UpdateOutcome::NotYetPublished)
        }
    }

    fn succeed(&self, outcome: UpdateOutcome) -> UpdateOutcome {
        let mut state = lock(&self.inner.state);
        state.retry.reset();
        state.phase = Phase::Idle;
        info!(outcome = ?outcome, "Update complete");
        outcome
    }

    fn schedule_retry(&self, reason: RetryReason) -> UpdateOutcome {
        let (delay, retry_count) = {
            let mut state = lock(&self.inner.state);
            let delay = state.retry.record_failure(&self.inner.policy);
            state.phase = Phase::Retrying;
            (delay, state.retry.retry_count)
        };

        let next_retry = self.inner.clock.now()
            + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        warn!(
            retry_count,
            delay_minutes = delay.as_secs() / 60,
            next_retry = %next_retry.with_timezone(&self.time_zone()).format("%H:%M:%S"),
            reason = ?reason,
            "Couldn't get data, retrying"
        );

        let this = self.clone();
        let token = self.inner.cancel.child_token();
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if this.is_alive() {
                        this.retry_boxed().await;
                    }
                }
            }
        });

        // Only one retry can be pending; a previous handle is this task's own
        // when the retry timer itself failed.
        *lock(&self.inner.retry_task) = Some(handle);

        UpdateOutcome::RetryScheduled {
            delay,
            retry_count,
            reason,
        }
    }

    /// Boxed so the retry task can re-enter `update` from inside it.
    fn retry_boxed(self) -> BoxFuture<'static, ()> {
        async move {
            self.update(UpdateTrigger::RetryTimer).await;
        }
        .boxed()
    }

    /// Shifts tomorrow into today and notifies listeners.
    pub async fn rollover(&self) {
        if !self.is_alive() {
            return;
        }
        debug!(entry = %self.inner.entry_id, "New day, rolling over dataset");
        self.inner.dataset.rollover().await;
        self.inner.signal.notify();
    }

    /// Notifies listeners without fetching.
    pub fn tick(&self) {
        if self.is_alive() {
            debug!(entry = %self.inner.entry_id, "New hour, updating state");
            self.inner.signal.notify();
        }
    }

    /// Cancels every scheduled task and any pending retry.
    ///
    /// Safe to call more than once.
    pub async fn teardown(&self) {
        if !self.inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();

        let mut handles: Vec<JoinHandle<()>> = lock(&self.inner.handles).drain(..).collect();
        handles.extend(lock(&self.inner.retry_task).take());

        let count = handles.len();
        futures::future::join_all(handles.into_iter().map(|h| async move {
            h.abort();
            let _ = h.await;
        }))
        .await;

        lock(&self.inner.state).phase = Phase::Idle;
        info!(entry = %self.inner.entry_id, tasks = count, "Coordinator torn down");
    }
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("entry_id", &self.inner.entry_id)
            .field("pipeline", &self.inner.pipeline)
            .field("phase", &self.phase())
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`RefreshCoordinator`].
pub struct CoordinatorBuilder {
    entry_id: String,
    pipeline: ConnectorPipeline,
    ctx: Option<FetchContext>,
    profiles: HashMap<String, ConnectorProfile>,
    policy: BackoffPolicy,
    dataset: Option<DatasetStore>,
    signal: Option<UpdateSignal>,
    clock: Arc<dyn Clock>,
}

impl CoordinatorBuilder {
    fn new(entry_id: impl Into<String>, pipeline: ConnectorPipeline) -> Self {
        Self {
            entry_id: entry_id.into(),
            pipeline,
            ctx: None,
            profiles: HashMap::new(),
            policy: BackoffPolicy::default(),
            dataset: None,
            signal: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Fetch context (shared HTTP client and time zone).
    pub fn context(mut self, ctx: FetchContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Registers display name and publish time for a connector id.
    pub fn profile(
        mut self,
        connector_id: impl Into<String>,
        display_name: impl Into<String>,
        publish_time: Option<NaiveTime>,
    ) -> Self {
        self.profiles.insert(
            connector_id.into(),
            ConnectorProfile {
                display_name: display_name.into(),
                publish_time,
            },
        );
        self
    }

    /// Retry backoff policy.
    pub fn policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Dataset store to write into.
    pub fn dataset(mut self, dataset: DatasetStore) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Update signal to notify.
    pub fn signal(mut self, signal: UpdateSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Clock for publish-time decisions.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the coordinator.
    ///
    /// # Errors
    ///
    /// Returns an error if no context was given and the default HTTP client
    /// cannot be created.
    pub fn build(self) -> Result<RefreshCoordinator, forsyning_fetch::HttpError> {
        let ctx = match self.ctx {
            Some(ctx) => ctx,
            None => FetchContext::new()?,
        };
        let signal = self
            .signal
            .unwrap_or_else(|| forsyning_store::SignalHub::new().signal(&self.entry_id));

        Ok(RefreshCoordinator {
            inner: Arc::new(Inner {
                entry_id: self.entry_id,
                pipeline: self.pipeline,
                ctx,
                profiles: self.profiles,
                policy: self.policy,
                dataset: self.dataset.unwrap_or_default(),
                signal,
                clock: self.clock,
                state: Mutex::new(CycleState {
                    phase: Phase::Idle,
                    retry: RetryState::default(),
                }),
                alive: AtomicBool::new(true),
                cancel: CancellationToken::new(),
                retry_task: Mutex::new(None),
                handles: Mutex::new(Vec::new()),
            }),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
