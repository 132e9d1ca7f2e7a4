//! Output formatting for CLI.

mod json;
mod text;

pub use json::{DatasetOutput, JsonFormatter};
pub use text::TextFormatter;
