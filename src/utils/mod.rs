pub mod format;
pub mod keys;

pub use format::{format_bytes, format_percent};
pub use keys::{destination_key, sanitize_name};
