//! Settings structs, one per `[section]` of the config file.

use std::time::Duration;

use crate::logging::{default_log_dir, default_log_file};
use crate::options::{LocationOptions, DEFAULT_MAXIMUM_AGE, DEFAULT_TIMEOUT};

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigFile {
    pub location: LocationSettings,
    pub logging: LoggingSettings,
}

/// `[location]`: defaults for requests issued without explicit options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSettings {
    pub timeout: Duration,
    pub maximum_age: Duration,
    pub high_accuracy: bool,
    pub fallback_to_native: bool,
    pub min_update_interval: Option<Duration>,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            maximum_age: DEFAULT_MAXIMUM_AGE,
            high_accuracy: true,
            fallback_to_native: false,
            min_update_interval: None,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: String,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_dir().to_string(),
            file: default_log_file().to_string(),
        }
    }
}

impl ConfigFile {
    /// Request options built from the `[location]` section.
    pub fn location_options(&self) -> LocationOptions {
        let location = &self.location;
        let options = LocationOptions::default()
            .with_timeout(location.timeout)
            .with_maximum_age(location.maximum_age)
            .with_high_accuracy(location.high_accuracy)
            .with_fallback_to_native(location.fallback_to_native);

        match location.min_update_interval {
            Some(interval) => options.with_min_update_interval(interval),
            None => options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_match_library_defaults() {
        assert_eq!(
            ConfigFile::default().location_options(),
            LocationOptions::default()
        );
    }

    #[test]
    fn test_location_options_carry_settings() {
        let config = ConfigFile {
            location: LocationSettings {
                timeout: Duration::from_secs(5),
                maximum_age: Duration::ZERO,
                high_accuracy: false,
                fallback_to_native: true,
                min_update_interval: Some(Duration::from_millis(250)),
            },
            logging: LoggingSettings::default(),
        };

        let options = config.location_options();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.maximum_age, Duration::ZERO);
        assert!(!options.enable_high_accuracy);
        assert!(options.enable_fallback_to_native);
        assert_eq!(options.min_update_interval, Some(Duration::from_millis(250)));
    }
}
