//! Scenario files describing the simulated device.
//!
//! ```ini
//! [device]
//! api_level = 34
//! location_enabled = true
//! network_provider = true
//! transports = wifi, cellular
//!
//! [services]
//! ; available | resolvable | unavailable
//! availability = available
//! ; ok | resolvable | change_unavailable | any other text (an opaque failure)
//! settings = ok
//! ; approve | deny | ignore
//! resolution = approve
//!
//! [fixes]
//! ; lat,lon[,accuracy]
//! primary = 52.5200,13.4050,5
//! native = 52.5201,13.4049,12
//! ; lat,lon,age_ms
//! cached_gps = 52.5199,13.4051,120000
//! cached_network =
//!
//! [motion]
//! interval_ms = 1000
//! step_degrees = 0.0001
//! ```
//!
//! Every key is optional; missing keys keep the healthy defaults of
//! [`Scenario::default`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use geoloc::error::SettingsFailure;
use geoloc::platform::{ApiLevel, NetworkTransport};
use geoloc::provider::{NativeProvider, ServicesAvailability};
use geoloc::simulator::SimulatedDevice;
use geoloc::{GeolocationController, RawLocation, ResolutionId, ResolutionResult, ResolutionToken};
use ini::Ini;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CliError;

/// How the scripted user answers a location settings prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    Approve,
    Deny,
    /// Never answer; the request waits until interrupted.
    Ignore,
}

/// A cached native fix, `age` old when the scenario starts.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFix {
    pub latitude: f64,
    pub longitude: f64,
    pub age: Duration,
}

/// Simulated movement for watches.
#[derive(Debug, Clone, PartialEq)]
pub struct Motion {
    pub interval: Duration,
    pub step_degrees: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub api_level: ApiLevel,
    pub location_enabled: bool,
    pub network_provider: bool,
    pub transports: Vec<NetworkTransport>,
    pub availability: ServicesAvailability,
    pub settings: Result<(), SettingsFailure>,
    pub resolution: ResolutionPolicy,
    pub primary_fix: Option<RawLocation>,
    pub native_fix: Option<RawLocation>,
    pub cached_gps: Option<CachedFix>,
    pub cached_network: Option<CachedFix>,
    pub motion: Motion,
}

impl Default for Scenario {
    fn default() -> Self {
        let mut fix = RawLocation::at(52.52, 13.405, 0);
        fix.accuracy = 5.0;

        Self {
            api_level: 34,
            location_enabled: true,
            network_provider: true,
            transports: vec![NetworkTransport::Wifi],
            availability: ServicesAvailability::Available,
            settings: Ok(()),
            resolution: ResolutionPolicy::Approve,
            primary_fix: Some(fix.clone()),
            native_fix: Some(fix),
            cached_gps: None,
            cached_network: None,
            motion: Motion {
                interval: Duration::from_secs(1),
                step_degrees: 0.0001,
            },
        }
    }
}

impl Scenario {
    /// Load a scenario file, or the default scenario without one.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        match path {
            Some(path) => {
                let ini = Ini::load_from_file(path).map_err(|e| {
                    CliError::Scenario(format!("cannot read '{}': {}", path.display(), e))
                })?;
                Self::from_ini(&ini)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_ini(ini: &Ini) -> Result<Self, CliError> {
        let mut scenario = Self::default();

        if let Some(section) = ini.section(Some("device")) {
            if let Some(v) = section.get("api_level") {
                scenario.api_level = v
                    .trim()
                    .parse()
                    .map_err(|_| invalid("device", "api_level", v))?;
            }
            if let Some(v) = section.get("location_enabled") {
                scenario.location_enabled = parse_bool("device", "location_enabled", v)?;
            }
            if let Some(v) = section.get("network_provider") {
                scenario.network_provider = parse_bool("device", "network_provider", v)?;
            }
            if let Some(v) = section.get("transports") {
                scenario.transports = v
                    .split(',')
                    .filter(|name| !name.trim().is_empty())
                    .map(|name| {
                        NetworkTransport::from_name(name)
                            .ok_or_else(|| invalid("device", "transports", name))
                    })
                    .collect::<Result<_, _>>()?;
            }
        }

        if let Some(section) = ini.section(Some("services")) {
            if let Some(v) = section.get("availability") {
                scenario.availability = match v.trim() {
                    "available" => ServicesAvailability::Available,
                    "resolvable" => ServicesAvailability::UserResolvable { status: 2 },
                    "unavailable" => ServicesAvailability::Unavailable { status: 9 },
                    _ => return Err(invalid("services", "availability", v)),
                };
            }
            if let Some(v) = section.get("settings") {
                scenario.settings = match v.trim() {
                    "ok" => Ok(()),
                    "resolvable" => Err(SettingsFailure::Resolvable {
                        resolution: ResolutionToken("scenario".to_string()),
                    }),
                    "change_unavailable" => Err(SettingsFailure::ChangeUnavailable),
                    other => Err(SettingsFailure::Other(other.to_string())),
                };
            }
            if let Some(v) = section.get("resolution") {
                scenario.resolution = match v.trim() {
                    "approve" => ResolutionPolicy::Approve,
                    "deny" => ResolutionPolicy::Deny,
                    "ignore" => ResolutionPolicy::Ignore,
                    _ => return Err(invalid("services", "resolution", v)),
                };
            }
        }

        if let Some(section) = ini.section(Some("fixes")) {
            if let Some(v) = section.get("primary") {
                scenario.primary_fix = parse_fix("fixes", "primary", v)?;
            }
            if let Some(v) = section.get("native") {
                scenario.native_fix = parse_fix("fixes", "native", v)?;
            }
            if let Some(v) = section.get("cached_gps") {
                scenario.cached_gps = parse_cached("fixes", "cached_gps", v)?;
            }
            if let Some(v) = section.get("cached_network") {
                scenario.cached_network = parse_cached("fixes", "cached_network", v)?;
            }
        }

        if let Some(section) = ini.section(Some("motion")) {
            if let Some(v) = section.get("interval_ms") {
                let millis: u64 = v
                    .trim()
                    .parse()
                    .map_err(|_| invalid("motion", "interval_ms", v))?;
                if millis == 0 {
                    return Err(invalid("motion", "interval_ms", v));
                }
                scenario.motion.interval = Duration::from_millis(millis);
            }
            if let Some(v) = section.get("step_degrees") {
                scenario.motion.step_degrees = v
                    .trim()
                    .parse()
                    .map_err(|_| invalid("motion", "step_degrees", v))?;
            }
        }

        Ok(scenario)
    }

    /// Configures `device` and answers resolution prompts for `controller`.
    pub fn apply(&self, device: &SimulatedDevice, controller: &GeolocationController) {
        device.set_api_level(self.api_level);
        device.set_location_enabled(self.location_enabled);
        device.set_network_provider(self.network_provider);
        device.set_transports(self.transports.clone());
        device.set_availability(self.availability);
        device.set_settings_result(self.settings.clone());

        let now = now_ms();
        device.set_primary_fix(self.primary_fix.clone().map(|fix| stamped(fix, now)));
        device.set_native_fix_on_request(self.native_fix.clone().map(|fix| stamped(fix, now)));
        for (provider, cached) in [
            (NativeProvider::Gps, &self.cached_gps),
            (NativeProvider::Network, &self.cached_network),
        ] {
            if let Some(cached) = cached {
                let age_ms = i64::try_from(cached.age.as_millis()).unwrap_or(i64::MAX);
                let time_ms = now.saturating_sub(age_ms);
                let fix = RawLocation::at(cached.latitude, cached.longitude, time_ms);
                device.set_last_known(provider, fix);
            }
        }

        let answer = match self.resolution {
            ResolutionPolicy::Approve => Some(ResolutionResult::Approved),
            ResolutionPolicy::Deny => Some(ResolutionResult::Denied),
            ResolutionPolicy::Ignore => None,
        };
        if let Some(answer) = answer {
            let broker = Arc::downgrade(&controller.resolutions());
            device.set_launch_hook(Some(Arc::new(
                move |id: ResolutionId, token: &ResolutionToken| {
                    info!(
                        resolution_id = id,
                        token = %token.0,
                        ?answer,
                        "Answering settings prompt"
                    );
                    if let Some(broker) = broker.upgrade() {
                        broker.resolve(id, answer);
                    }
                },
            )));
        }
    }

    /// Moves the device: pushes a new fix to every subscription each
    /// `motion.interval` until `cancel` fires.
    pub fn drive(&self, device: Arc<SimulatedDevice>, cancel: CancellationToken) -> JoinHandle<()> {
        let origin = self
            .primary_fix
            .clone()
            .or_else(|| self.native_fix.clone())
            .unwrap_or_else(|| RawLocation::at(0.0, 0.0, 0));
        let motion = self.motion.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(motion.interval);
            ticker.tick().await;
            let mut step = 0u32;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        step += 1;
                        let offset = motion.step_degrees * f64::from(step);
                        let mut fix = origin.clone();
                        fix.latitude += offset;
                        fix.longitude += offset;
                        fix.time_ms = now_ms();

                        debug!(step, latitude = fix.latitude, "Simulated movement");
                        device.push_primary(vec![fix.clone()]);
                        device.push_native(vec![fix]);
                    }
                }
            }
        })
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn stamped(mut fix: RawLocation, time_ms: i64) -> RawLocation {
    fix.time_ms = time_ms;
    fix
}

fn invalid(section: &str, key: &str, value: &str) -> CliError {
    CliError::Scenario(format!("invalid value {}.{} = '{}'", section, key, value.trim()))
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, CliError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(section, key, value)),
    }
}

fn parse_numbers(section: &str, key: &str, value: &str) -> Result<Vec<f64>, CliError> {
    value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|_| invalid(section, key, value)))
        .collect()
}

fn parse_fix(section: &str, key: &str, value: &str) -> Result<Option<RawLocation>, CliError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    match parse_numbers(section, key, value)?.as_slice() {
        [lat, lon] => Ok(Some(RawLocation::at(*lat, *lon, 0))),
        [lat, lon, accuracy] => {
            let mut fix = RawLocation::at(*lat, *lon, 0);
            fix.accuracy = *accuracy as f32;
            Ok(Some(fix))
        }
        _ => Err(invalid(section, key, value)),
    }
}

fn parse_cached(section: &str, key: &str, value: &str) -> Result<Option<CachedFix>, CliError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    match parse_numbers(section, key, value)?.as_slice() {
        [lat, lon, age_ms] if *age_ms >= 0.0 => Ok(Some(CachedFix {
            latitude: *lat,
            longitude: *lon,
            age: Duration::from_millis(*age_ms as u64),
        })),
        _ => Err(invalid(section, key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Scenario, CliError> {
        Scenario::from_ini(&Ini::load_from_str(content).unwrap())
    }

    #[test]
    fn test_empty_scenario_is_default() {
        assert_eq!(parse("").unwrap(), Scenario::default());
    }

    #[test]
    fn test_full_scenario() {
        let scenario = parse(
            "[device]\n\
             api_level = 30\n\
             location_enabled = false\n\
             transports = cellular, vpn\n\
             [services]\n\
             availability = resolvable\n\
             settings = change_unavailable\n\
             resolution = deny\n\
             [fixes]\n\
             primary =\n\
             native = 1.5,2.5,8\n\
             cached_gps = 1.0,2.0,5000\n\
             [motion]\n\
             interval_ms = 250\n",
        )
        .unwrap();

        assert_eq!(scenario.api_level, 30);
        assert!(!scenario.location_enabled);
        assert_eq!(
            scenario.transports,
            vec![NetworkTransport::Cellular, NetworkTransport::Vpn]
        );
        assert_eq!(
            scenario.availability,
            ServicesAvailability::UserResolvable { status: 2 }
        );
        assert_eq!(scenario.settings, Err(SettingsFailure::ChangeUnavailable));
        assert_eq!(scenario.resolution, ResolutionPolicy::Deny);
        assert_eq!(scenario.primary_fix, None);
        assert_eq!(scenario.native_fix.as_ref().map(|f| f.accuracy), Some(8.0));
        assert_eq!(
            scenario.cached_gps.as_ref().map(|c| c.age),
            Some(Duration::from_secs(5))
        );
        assert_eq!(scenario.motion.interval, Duration::from_millis(250));
    }

    #[test]
    fn test_custom_settings_failure_text() {
        let scenario = parse("[services]\nsettings = developer error\n").unwrap();
        assert_eq!(
            scenario.settings,
            Err(SettingsFailure::Other("developer error".to_string()))
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse("[device]\ntransports = wifi, smoke-signals\n").is_err());
        assert!(parse("[services]\navailability = sometimes\n").is_err());
        assert!(parse("[fixes]\nprimary = 1.0\n").is_err());
        assert!(parse("[fixes]\ncached_gps = 1.0,2.0,-5\n").is_err());
        assert!(parse("[motion]\ninterval_ms = 0\n").is_err());
    }

    #[tokio::test]
    async fn test_apply_configures_device() {
        let device = SimulatedDevice::shared();
        let controller = GeolocationController::new(device.services());
        let scenario = parse(
            "[services]\nsettings = resolvable\nresolution = approve\n\
             [fixes]\ncached_network = 3.0,4.0,1000\n",
        )
        .unwrap();

        scenario.apply(&device, &controller);

        let sample = controller
            .get_current_position(&geoloc::LocationOptions::default())
            .await
            .unwrap();
        assert_eq!(sample.latitude, 52.52);
        assert_eq!(device.launched_resolutions().len(), 1);
        assert_eq!(controller.resolutions().pending_count(), 0);
    }
}
