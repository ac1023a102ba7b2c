//! Input sanitization for tool requests and adapter responses.

pub mod sanitize;

pub use sanitize::{sanitize_json_value, sanitize_optional_json};
