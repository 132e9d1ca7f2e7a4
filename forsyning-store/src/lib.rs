// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Forsyning Store
//!
//! State management for Forsyning entries.
//!
//! This crate provides:
//!
//! - **ConfigStore**: Validated entry configuration with persistence
//! - **DatasetStore**: Shared today/tomorrow cache per entry
//! - **SignalHub**: Payload-less `forsyning_update_{entry_id}` notifications
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use forsyning_store::{ConfigStore, SignalHub};
//!
//! let config = ConfigStore::load_default().await?;
//! let hub = SignalHub::new();
//!
//! let mut rx = hub.subscribe("home");
//! while rx.changed().await.is_ok() {
//!     println!("New data for home");
//! }
//! ```

pub mod config;
pub mod dataset_store;
pub mod error;
pub mod persistence;
pub mod signal;

pub use config::{ConfigStore, EntryConfig, ForsyningConfig};
pub use dataset_store::DatasetStore;
pub use error::{ConfigError, StoreError};
pub use persistence::{
    default_config_dir, default_config_path, ensure_dir, load_json, load_json_or_default,
    save_json,
};
pub use signal::{SignalHub, UpdateSignal, signal_name};
