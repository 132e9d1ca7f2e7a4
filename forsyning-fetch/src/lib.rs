// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Forsyning Fetch
//!
//! Network plumbing shared by all provider connectors.
//!
//! ## Host APIs
//!
//! - [`host::http`] - HTTP client with tracing, bearer/form helpers and domain allowlist
//!
//! ## Connectors
//!
//! - [`connector::Connector`] - Trait every provider implements
//! - [`pipeline::ConnectorPipeline`] - Tries the connectors for a selector in order
//! - [`context::FetchContext`] - Shared HTTP client, timeout and time zone
//!
//! ## Retry
//!
//! - [`backoff::BackoffPolicy`] - Linear retry delay capped at a ceiling
//! - [`backoff::RetryState`] - Consecutive-failure counter
//!
//! ## Example
//!
//! ```ignore
//! use forsyning_fetch::{ConnectorPipeline, FetchContext};
//!
//! let ctx = FetchContext::builder().build()?;
//! let pipeline = ConnectorPipeline::with_connectors(vec![Box::new(connector)]);
//! let outcome = pipeline.execute(&ctx).await;
//! ```

pub mod backoff;
pub mod connector;
pub mod context;
pub mod error;
pub mod host;
pub mod pipeline;

// Errors
pub use error::{FetchError, HttpError};

// Host APIs
pub use host::http::HttpClient;

// Connectors & pipeline
pub use connector::{AccessToken, Connector};
pub use context::{FetchContext, FetchContextBuilder, FetchSettings};
pub use pipeline::{ConnectorAttempt, ConnectorPipeline, PipelineOutcome};

// Retry
pub use backoff::{BackoffPolicy, RetryState};
