//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

use geoloc::config::ConfigFileError;
use geoloc::GeolocationError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Scenario file could not be read or has invalid values
    Scenario(String),
    /// Failed to build the async runtime
    Runtime(std::io::Error),
    /// The location request failed
    Location(GeolocationError),
}

impl CliError {
    /// Exit the process with an error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Location(GeolocationError::RequestDenied) => {
                eprintln!();
                eprintln!("The scenario declined the location settings prompt.");
                eprintln!("Set resolution = approve in the [services] section to accept it.");
            }
            CliError::Location(GeolocationError::GoogleServicesUnavailable { .. })
            | CliError::Location(GeolocationError::Settings { .. }) => {
                eprintln!();
                eprintln!("Retry with --fallback to use the native location manager.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Scenario(msg) => write!(f, "Scenario error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Location(e) => write!(f, "Location request failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Location(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<GeolocationError> for CliError {
    fn from(e: GeolocationError) -> Self {
        CliError::Location(e)
    }
}
