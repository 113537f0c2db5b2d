//! User configuration from `~/.geoloc/config.ini`.
//!
//! The file supplies default [`LocationOptions`](crate::LocationOptions)
//! and the logging destination.
//!
//! ```ini
//! [location]
//! timeout_ms = 60000
//! maximum_age_ms = 30000
//! high_accuracy = true
//! fallback_to_native = false
//! min_update_interval_ms =
//!
//! [logging]
//! directory = logs
//! file = geoloc.log
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, LocationSettings, LoggingSettings};
