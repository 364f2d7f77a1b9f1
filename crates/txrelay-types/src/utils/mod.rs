//! Display helpers shared by log lines and reports.

pub mod formatting;

pub use formatting::{truncate_id, without_0x_prefix};
