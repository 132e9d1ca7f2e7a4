//! Host APIs for Forsyning connectors.
//!
//! - [`http`] - HTTP client with tracing and domain allowlist

pub mod http;

pub use http::{HttpClient, ResponseExt};
