//! CLI command implementations.
//!
//! - [`config`] - Configuration management (get, set, list, path)
//! - [`position`] - Single location fetch
//! - [`watch`] - Continuous location watch

pub mod common;
pub mod config;
pub mod position;
pub mod watch;
