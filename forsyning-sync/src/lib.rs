// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Forsyning Sync
//!
//! Keeps each entry's dataset current.
//!
//! - [`RefreshCoordinator`] - Update state machine with retry backoff
//! - [`Scheduler`] - Daily fetch, hourly tick, midnight rollover, optional poll
//! - [`TimeTrigger`] - DST-aware next-fire computation
//! - [`Entry`] - Setup and unload of one configured account
//!
//! ## Example
//!
//! ```ignore
//! use forsyning_sync::{Entry, SystemClock};
//!
//! let hub = SignalHub::new();
//! let entry = Entry::setup(config, &hub, None, Arc::new(SystemClock))?;
//! entry.refresh().await;
//! // ...
//! entry.unload(&hub).await;
//! ```

pub mod clock;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod scheduler;
pub mod trigger;

pub use clock::{Clock, SystemClock, TokioClock};
pub use coordinator::{
    ConnectorProfile, CoordinatorBuilder, Phase, RefreshCoordinator, RetryReason,
    UpdateOutcome, UpdateTrigger,
};
pub use entry::Entry;
pub use error::SyncError;
pub use scheduler::{ScheduleConfig, ScheduledAction, Scheduler};
pub use trigger::TimeTrigger;
