//! Schedule bindings for a refresh coordinator.
//!
//! Each entry gets up to four scheduled tasks:
//!
//! | Task      | Fires                                    | Action              |
//! |-----------|------------------------------------------|---------------------|
//! | daily     | `fetch_hour:MM:SS` local, MM:SS random    | scheduled update    |
//! | hourly    | every `xx:00:00` local                   | notify listeners    |
//! | midnight  | `00:00:00` local                         | dataset rollover    |
//! | interval  | every scan interval (opt-in)             | interval-poll update|
//!
//! The random minute and second are drawn once per process so that
//! installations do not all hit the provider at the same instant.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

use crate::coordinator::{RefreshCoordinator, UpdateTrigger};
use crate::trigger::TimeTrigger;

// ============================================================================
// Schedule Config
// ============================================================================

/// When the scheduled tasks of one entry fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Local hour of the daily fetch.
    pub fetch_hour: u32,
    /// Minute past `fetch_hour`.
    pub minute: u32,
    /// Second past `minute`.
    pub second: u32,
    /// Interval of the optional extra poll.
    pub interval: Option<Duration>,
}

impl ScheduleConfig {
    /// Daily fetch at `fetch_hour` with a random minute and second.
    pub fn randomized(fetch_hour: u32) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            fetch_hour,
            minute: rng.gen_range(0..60),
            second: rng.gen_range(0..60),
            interval: None,
        }
    }

    /// Daily fetch at a fixed time.
    pub fn fixed(fetch_hour: u32, minute: u32, second: u32) -> Self {
        Self {
            fetch_hour,
            minute,
            second,
            interval: None,
        }
    }

    /// Also polls every `interval`.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// The daily fetch trigger. Falls back to `fetch_hour:00:00` on an
    /// out-of-range minute or second, and to midnight on a bad hour.
    pub fn daily_trigger(&self) -> TimeTrigger {
        TimeTrigger::daily(self.fetch_hour, self.minute, self.second)
            .or_else(|| TimeTrigger::daily(self.fetch_hour, 0, 0))
            .unwrap_or_else(TimeTrigger::midnight)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// What a scheduled task does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Run an update.
    Update(UpdateTrigger),
    /// Shift tomorrow into today.
    Rollover,
    /// Notify listeners without fetching.
    Tick,
}

/// Binds triggers to a coordinator.
#[derive(Debug, Clone)]
pub struct Scheduler {
    coordinator: RefreshCoordinator,
    config: ScheduleConfig,
}

impl Scheduler {
    /// Creates a scheduler; nothing runs until [`start`](Self::start).
    pub fn new(coordinator: RefreshCoordinator, config: ScheduleConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Schedule in use.
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Every trigger with its action.
    pub fn tasks(&self) -> Vec<(TimeTrigger, ScheduledAction)> {
        let mut tasks = vec![
            (
                self.config.daily_trigger(),
                ScheduledAction::Update(UpdateTrigger::Scheduled),
            ),
            (TimeTrigger::top_of_hour(), ScheduledAction::Tick),
            (TimeTrigger::midnight(), ScheduledAction::Rollover),
        ];
        if let Some(interval) = self.config.interval {
            tasks.push((
                TimeTrigger::Every(interval),
                ScheduledAction::Update(UpdateTrigger::IntervalPoll),
            ));
        }
        tasks
    }

    /// Next daily fetch in local time.
    pub fn next_data_refresh(&self) -> DateTime<Tz> {
        let tz = self.coordinator.time_zone();
        let now = self.coordinator.clock().now();
        self.config.daily_trigger().next_after(now, tz).with_timezone(&tz)
    }

    /// Spawns one task per trigger and hands the handles to the coordinator.
    ///
    /// Tasks stop when the coordinator is torn down.
    pub fn start(&self) {
        let tasks = self.tasks();
        info!(
            entry = %self.coordinator.entry_id(),
            next_refresh = %self.next_data_refresh().format("%Y-%m-%d %H:%M:%S %Z"),
            tasks = tasks.len(),
            "Scheduling updates"
        );

        for (trigger, action) in tasks {
            let handle = tokio::spawn(run_task(self.coordinator.clone(), trigger, action));
            self.coordinator.register_handle(handle);
        }
    }
}

async fn run_task(coordinator: RefreshCoordinator, trigger: TimeTrigger, action: ScheduledAction) {
    let token = coordinator.cancellation_token();
    let clock = coordinator.clock();
    let tz = coordinator.time_zone();
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = clock.now();
        // An early wakeup must not fire the same instant twice.
        let from = last_fire.map_or(now, |last| last.max(now));
        let next = trigger.next_after(from, tz);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        debug!(%trigger, next = %next.with_timezone(&tz), "Waiting for trigger");

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }
        last_fire = Some(next);

        match action {
            ScheduledAction::Update(kind) => {
                coordinator.update(kind).await;
            }
            ScheduledAction::Rollover => coordinator.rollover().await,
            ScheduledAction::Tick => coordinator.tick(),
        }
    }
    debug!(%trigger, "Scheduled task stopped");
}
