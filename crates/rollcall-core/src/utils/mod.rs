//! Utility functions for string formatting and lenient parsing.

pub mod format;
pub mod lenient;

pub use format::{camel_to_snake, contains_ignore_case, digits_only, format_phone};
