//! Shared building blocks for the searchlight configuration tools
//!
//! - logging initialisation (console + optional file)
//! - hex helpers for raw frame dumps

pub mod hex;
pub mod logging;

pub use logging::{init_with_config, LogConfig};
