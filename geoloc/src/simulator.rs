//! In-memory device implementing every external location capability.
//!
//! [`SimulatedDevice`] stands in for the cloud location services, the native
//! location manager, the connectivity inspector, the platform probe and the
//! resolution launcher at once. Knobs configure what each capability reports;
//! counters and recorders expose what the library asked for.
//!
//! Listeners are never invoked while the device state is locked, so a
//! listener may call back into the device.
//!
//! # Example
//!
//! ```
//! use geoloc::simulator::SimulatedDevice;
//! use geoloc::{GeolocationController, LocationOptions, RawLocation};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let device = SimulatedDevice::shared();
//! device.set_primary_fix(Some(RawLocation::at(48.1, 11.5, 1)));
//!
//! let controller = GeolocationController::new(device.services());
//! let sample = controller
//!     .get_current_position(&LocationOptions::default())
//!     .await
//!     .unwrap();
//! assert_eq!(sample.latitude, 48.1);
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::PlatformServices;
use crate::error::{ProviderError, SettingsFailure};
use crate::platform::{ApiLevel, ConnectivityInspector, NetworkTransport, PlatformProbe};
use crate::provider::{
    BoxFuture, CurrentLocationRequest, LocationListener, NativeLocationManager, NativeProvider,
    NativeUpdateRequest, PrimaryLocationService, ServicesAvailability, SettingsRequest,
    SubscriptionId, UpdatesRequest,
};
use crate::resolution::{ResolutionId, ResolutionLauncher, ResolutionToken};
use crate::sample::RawLocation;

/// Callback run after a resolution flow is launched.
pub type LaunchHook = Arc<dyn Fn(ResolutionId, &ResolutionToken) + Send + Sync>;

/// Number of calls the library made into each capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub availability_checks: usize,
    pub availability_dialogs: usize,
    pub settings_checks: usize,
    pub primary_current_location: usize,
    pub primary_update_requests: usize,
    pub primary_removals: usize,
    pub native_last_known: usize,
    pub native_update_requests: usize,
    pub native_removals: usize,
}

impl CallCounts {
    /// Calls that reach a location provider (not the precondition checks).
    pub fn provider_calls(&self) -> usize {
        self.primary_current_location
            + self.primary_update_requests
            + self.native_last_known
            + self.native_update_requests
    }

    /// Calls of any kind.
    pub fn total(&self) -> usize {
        self.availability_checks + self.settings_checks + self.provider_calls()
    }

    /// Calls into the native location manager's fix APIs.
    pub fn native_calls(&self) -> usize {
        self.native_last_known + self.native_update_requests
    }
}

struct DeviceState {
    api_level: ApiLevel,
    availability: ServicesAvailability,
    settings_result: Result<(), SettingsFailure>,
    location_enabled: bool,
    network_provider: bool,
    transports: Vec<NetworkTransport>,
    last_known: HashMap<NativeProvider, RawLocation>,
    primary_fix: Option<RawLocation>,
    native_fix_on_request: Option<RawLocation>,
    request_failure: Option<ProviderError>,
    launch_hook: Option<LaunchHook>,
    next_subscription: u64,
    primary_listeners: BTreeMap<SubscriptionId, LocationListener>,
    native_listeners: BTreeMap<SubscriptionId, LocationListener>,
    launched: Vec<(ResolutionId, ResolutionToken)>,
    calls: CallCounts,
    last_settings_request: Option<SettingsRequest>,
    last_current_location_request: Option<CurrentLocationRequest>,
    last_updates_request: Option<UpdatesRequest>,
    last_native_request: Option<(NativeProvider, NativeUpdateRequest)>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            api_level: 34,
            availability: ServicesAvailability::Available,
            settings_result: Ok(()),
            location_enabled: true,
            network_provider: true,
            transports: vec![NetworkTransport::Wifi],
            last_known: HashMap::new(),
            primary_fix: None,
            native_fix_on_request: None,
            request_failure: None,
            launch_hook: None,
            next_subscription: 0,
            primary_listeners: BTreeMap::new(),
            native_listeners: BTreeMap::new(),
            launched: Vec::new(),
            calls: CallCounts::default(),
            last_settings_request: None,
            last_current_location_request: None,
            last_updates_request: None,
            last_native_request: None,
        }
    }
}

impl DeviceState {
    fn next_subscription_id(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        SubscriptionId(self.next_subscription)
    }
}

/// A scriptable, in-memory device.
///
/// Defaults: API level 34, cloud services available, settings satisfied,
/// location enabled, a network provider and an active Wi-Fi connection, no
/// cached or pending fixes.
#[derive(Default)]
pub struct SimulatedDevice {
    state: Mutex<DeviceState>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Bundles this device as every capability the controller consumes.
    pub fn services(self: &Arc<Self>) -> PlatformServices {
        PlatformServices {
            primary: self.clone(),
            native: self.clone(),
            connectivity: self.clone(),
            platform: self.clone(),
            launcher: self.clone(),
        }
    }

    // Knobs

    pub fn set_api_level(&self, level: ApiLevel) {
        self.state.lock().api_level = level;
    }

    pub fn set_availability(&self, availability: ServicesAvailability) {
        self.state.lock().availability = availability;
    }

    pub fn set_settings_result(&self, result: Result<(), SettingsFailure>) {
        self.state.lock().settings_result = result;
    }

    pub fn set_location_enabled(&self, enabled: bool) {
        self.state.lock().location_enabled = enabled;
    }

    pub fn set_network_provider(&self, present: bool) {
        self.state.lock().network_provider = present;
    }

    pub fn set_transports(&self, transports: Vec<NetworkTransport>) {
        self.state.lock().transports = transports;
    }

    pub fn set_last_known(&self, provider: NativeProvider, location: RawLocation) {
        self.state.lock().last_known.insert(provider, location);
    }

    /// Fix the cloud service answers current-location requests with, and
    /// delivers to each new cloud subscription. `None` makes single requests
    /// give up after their duration.
    pub fn set_primary_fix(&self, location: Option<RawLocation>) {
        self.state.lock().primary_fix = location;
    }

    /// Fix delivered to each new native subscription as soon as it starts.
    pub fn set_native_fix_on_request(&self, location: Option<RawLocation>) {
        self.state.lock().native_fix_on_request = location;
    }

    /// Makes every provider request fail with `error`.
    pub fn set_request_failure(&self, error: Option<ProviderError>) {
        self.state.lock().request_failure = error;
    }

    /// Runs `hook` whenever a resolution flow is launched.
    pub fn set_launch_hook(&self, hook: Option<LaunchHook>) {
        self.state.lock().launch_hook = hook;
    }

    // Delivery

    /// Delivers `batch` to every active cloud subscription.
    pub fn push_primary(&self, batch: Vec<RawLocation>) {
        let listeners: Vec<_> = self.state.lock().primary_listeners.values().cloned().collect();
        for listener in listeners {
            listener(batch.clone());
        }
    }

    /// Delivers `batch` to every active native subscription.
    pub fn push_native(&self, batch: Vec<RawLocation>) {
        let listeners: Vec<_> = self.state.lock().native_listeners.values().cloned().collect();
        for listener in listeners {
            listener(batch.clone());
        }
    }

    // Inspection

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    pub fn active_primary_listeners(&self) -> usize {
        self.state.lock().primary_listeners.len()
    }

    pub fn active_native_listeners(&self) -> usize {
        self.state.lock().native_listeners.len()
    }

    pub fn launched_resolutions(&self) -> Vec<(ResolutionId, ResolutionToken)> {
        self.state.lock().launched.clone()
    }

    pub fn last_settings_request(&self) -> Option<SettingsRequest> {
        self.state.lock().last_settings_request.clone()
    }

    pub fn last_current_location_request(&self) -> Option<CurrentLocationRequest> {
        self.state.lock().last_current_location_request.clone()
    }

    pub fn last_updates_request(&self) -> Option<UpdatesRequest> {
        self.state.lock().last_updates_request.clone()
    }

    pub fn last_native_request(&self) -> Option<(NativeProvider, NativeUpdateRequest)> {
        self.state.lock().last_native_request.clone()
    }
}

impl PlatformProbe for SimulatedDevice {
    fn api_level(&self) -> ApiLevel {
        self.state.lock().api_level
    }
}

impl ConnectivityInspector for SimulatedDevice {
    fn active_network_transports(&self) -> Vec<NetworkTransport> {
        self.state.lock().transports.clone()
    }
}

impl ResolutionLauncher for SimulatedDevice {
    fn launch(&self, id: ResolutionId, token: &ResolutionToken) {
        let hook = {
            let mut state = self.state.lock();
            state.launched.push((id, token.clone()));
            state.launch_hook.clone()
        };
        if let Some(hook) = hook {
            hook(id, token);
        }
    }
}

impl PrimaryLocationService for SimulatedDevice {
    fn availability(&self) -> ServicesAvailability {
        let mut state = self.state.lock();
        state.calls.availability_checks += 1;
        state.availability
    }

    fn show_availability_dialog(&self, _status: i32) {
        self.state.lock().calls.availability_dialogs += 1;
    }

    fn check_settings<'a>(
        &'a self,
        request: &'a SettingsRequest,
    ) -> BoxFuture<'a, Result<(), SettingsFailure>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.settings_checks += 1;
            state.last_settings_request = Some(request.clone());
            state.settings_result.clone()
        })
    }

    fn current_location<'a>(
        &'a self,
        request: &'a CurrentLocationRequest,
    ) -> BoxFuture<'a, Result<Option<RawLocation>, ProviderError>> {
        Box::pin(async move {
            let (fix, failure) = {
                let mut state = self.state.lock();
                state.calls.primary_current_location += 1;
                state.last_current_location_request = Some(request.clone());
                (state.primary_fix.clone(), state.request_failure.clone())
            };

            if let Some(error) = failure {
                return Err(error);
            }
            if fix.is_none() {
                tokio::time::sleep(request.duration).await;
            }
            Ok(fix)
        })
    }

    fn request_updates(
        &self,
        request: &UpdatesRequest,
        listener: LocationListener,
    ) -> Result<SubscriptionId, ProviderError> {
        let (id, initial) = {
            let mut state = self.state.lock();
            state.calls.primary_update_requests += 1;
            state.last_updates_request = Some(request.clone());
            if let Some(error) = state.request_failure.clone() {
                return Err(error);
            }
            let id = state.next_subscription_id();
            state.primary_listeners.insert(id, listener.clone());
            (id, state.primary_fix.clone())
        };

        if let Some(fix) = initial {
            listener(vec![fix]);
        }
        Ok(id)
    }

    fn remove_updates(&self, id: SubscriptionId) {
        let mut state = self.state.lock();
        state.calls.primary_removals += 1;
        state.primary_listeners.remove(&id);
    }
}

impl NativeLocationManager for SimulatedDevice {
    fn last_known_location(&self, provider: NativeProvider) -> Option<RawLocation> {
        let mut state = self.state.lock();
        state.calls.native_last_known += 1;
        state.last_known.get(&provider).cloned()
    }

    fn request_updates(
        &self,
        provider: NativeProvider,
        request: &NativeUpdateRequest,
        listener: LocationListener,
    ) -> Result<SubscriptionId, ProviderError> {
        let (id, initial) = {
            let mut state = self.state.lock();
            state.calls.native_update_requests += 1;
            state.last_native_request = Some((provider, request.clone()));
            if let Some(error) = state.request_failure.clone() {
                return Err(error);
            }
            let id = state.next_subscription_id();
            state.native_listeners.insert(id, listener.clone());
            (id, state.native_fix_on_request.clone())
        };

        if let Some(fix) = initial {
            listener(vec![fix]);
        }
        Ok(id)
    }

    fn remove_updates(&self, id: SubscriptionId) {
        let mut state = self.state.lock();
        state.calls.native_removals += 1;
        state.native_listeners.remove(&id);
    }

    fn is_location_enabled(&self) -> bool {
        self.state.lock().location_enabled
    }

    fn has_provider(&self, provider: NativeProvider) -> bool {
        match provider {
            NativeProvider::Network => self.state.lock().network_provider,
            NativeProvider::Gps | NativeProvider::Fused => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let device = SimulatedDevice::new();
        assert_eq!(device.api_level(), 34);
        assert_eq!(device.availability(), ServicesAvailability::Available);
        assert!(device.is_location_enabled());
        assert!(device.has_provider(NativeProvider::Network));
        assert_eq!(device.active_network_transports(), vec![NetworkTransport::Wifi]);
        assert_eq!(device.calls().availability_checks, 1);
    }

    #[test]
    fn test_push_reaches_only_active_listeners() {
        let device = SimulatedDevice::new();
        let hits = Arc::new(Mutex::new(0usize));

        let sink = hits.clone();
        let listener: LocationListener = Arc::new(move |batch: Vec<RawLocation>| {
            *sink.lock() += batch.len();
        });
        let request = NativeUpdateRequest {
            interval: std::time::Duration::ZERO,
            quality: crate::provider::Quality::LowPower,
            min_update_interval: None,
        };
        let id =
            NativeLocationManager::request_updates(&device, NativeProvider::Gps, &request, listener)
                .unwrap();

        device.push_native(vec![RawLocation::at(1.0, 1.0, 1)]);
        device.push_primary(vec![RawLocation::at(1.0, 1.0, 1)]);
        assert_eq!(*hits.lock(), 1);

        NativeLocationManager::remove_updates(&device, id);
        device.push_native(vec![RawLocation::at(1.0, 1.0, 2)]);
        assert_eq!(*hits.lock(), 1);
        assert_eq!(device.calls().native_removals, 1);
    }

    #[test]
    fn test_request_failure_registers_nothing() {
        let device = SimulatedDevice::new();
        device.set_request_failure(Some(ProviderError::Request("offline".to_string())));

        let listener: LocationListener = Arc::new(|_batch: Vec<RawLocation>| {});
        let request = UpdatesRequest {
            priority: crate::provider::Priority::HighAccuracy,
            interval: std::time::Duration::from_secs(1),
            max_update_age: std::time::Duration::ZERO,
            min_update_interval: None,
        };

        assert!(PrimaryLocationService::request_updates(&device, &request, listener).is_err());
        assert_eq!(device.active_primary_listeners(), 0);
    }

    #[test]
    fn test_launch_records_and_runs_hook() {
        let device = SimulatedDevice::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        device.set_launch_hook(Some(Arc::new(move |id: ResolutionId, _token: &ResolutionToken| {
            sink.lock().push(id);
        })));

        device.launch(7, &ResolutionToken("t".to_string()));

        assert_eq!(*seen.lock(), vec![7]);
        assert_eq!(device.launched_resolutions().len(), 1);
    }
}
