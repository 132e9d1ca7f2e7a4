//! CLI command implementations.

pub mod config;
pub mod connectors;
pub mod fetch;
pub mod run;
