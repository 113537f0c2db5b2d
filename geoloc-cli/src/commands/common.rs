//! Types and helpers shared across CLI commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use geoloc::config::ConfigFile;
use geoloc::simulator::SimulatedDevice;
use geoloc::{GeolocationController, LocationOptions, LocationSample};

use crate::error::CliError;
use crate::scenario::Scenario;

/// Request options; each overrides the `[location]` config value.
#[derive(Debug, Clone, Default, Args)]
pub struct LocationArgs {
    /// Timeout in milliseconds (fetch deadline, or watch update interval)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Maximum age of an acceptable cached fix in milliseconds
    #[arg(long)]
    pub maximum_age_ms: Option<u64>,

    /// Request balanced power accuracy instead of high accuracy
    #[arg(long)]
    pub low_accuracy: bool,

    /// Fall back to the native location manager when cloud services fail
    #[arg(long)]
    pub fallback: bool,

    /// Minimum interval between watch updates in milliseconds
    #[arg(long)]
    pub min_update_interval_ms: Option<u64>,
}

impl LocationArgs {
    /// Resolve request options: CLI takes precedence, then config.
    pub fn resolve(&self, config: &ConfigFile) -> LocationOptions {
        let mut options = config.location_options();

        if let Some(ms) = self.timeout_ms {
            options = options.with_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.maximum_age_ms {
            options = options.with_maximum_age(Duration::from_millis(ms));
        }
        if self.low_accuracy {
            options = options.with_high_accuracy(false);
        }
        if self.fallback {
            options = options.with_fallback_to_native(true);
        }
        if let Some(ms) = self.min_update_interval_ms {
            options = options.with_min_update_interval(Duration::from_millis(ms));
        }
        options
    }
}

/// A controller wired to a simulated device set up from a scenario.
pub struct Session {
    pub device: Arc<SimulatedDevice>,
    pub controller: GeolocationController,
    pub scenario: Scenario,
}

impl Session {
    pub fn open(scenario_path: Option<&PathBuf>) -> Result<Self, CliError> {
        let scenario = Scenario::load(scenario_path.map(PathBuf::as_path))?;
        let device = SimulatedDevice::shared();
        let controller = GeolocationController::new(device.services());
        scenario.apply(&device, &controller);

        Ok(Self {
            device,
            controller,
            scenario,
        })
    }
}

/// Build the multi-threaded runtime commands run on.
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

/// Print a sample as one line of JSON.
pub fn print_sample(sample: &LocationSample) {
    match serde_json::to_string(sample) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to format sample: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let config = ConfigFile::default();
        let args = LocationArgs {
            timeout_ms: Some(1500),
            maximum_age_ms: Some(0),
            low_accuracy: true,
            fallback: true,
            min_update_interval_ms: Some(100),
        };

        let options = args.resolve(&config);
        assert_eq!(options.timeout, Duration::from_millis(1500));
        assert_eq!(options.maximum_age, Duration::ZERO);
        assert!(!options.enable_high_accuracy);
        assert!(options.enable_fallback_to_native);
        assert_eq!(options.min_update_interval, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_config_used_without_overrides() {
        let mut config = ConfigFile::default();
        config.location.fallback_to_native = true;
        config.location.timeout = Duration::from_secs(9);

        let options = LocationArgs::default().resolve(&config);
        assert!(options.enable_fallback_to_native);
        assert_eq!(options.timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_zero_timeout_passes_through_for_library_validation() {
        let options = LocationArgs {
            timeout_ms: Some(0),
            ..Default::default()
        }
        .resolve(&ConfigFile::default());
        assert!(options.validate().is_err());
    }
}
