//! Primary adapter over the cloud-services location APIs.
//!
//! Besides fetching and subscribing, this adapter owns the two precondition
//! checks run before any cloud request:
//!
//! - [`PrimaryProvider::check_availability`] - are the cloud services usable?
//! - [`PrimaryProvider::check_settings`] - do the device settings allow the
//!   requested accuracy? May launch a user-facing resolution flow.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::native::NativeLocationManager;
use super::{
    BoxFuture, LocationListener, LocationSource, ProviderKind, SubscriptionId, UpdateHandle,
};
use crate::error::{GeolocationError, ProviderError, SettingsFailure};
use crate::options::LocationOptions;
use crate::platform::{network_available_for_location, ConnectivityInspector, PlatformProbe};
use crate::resolution::{PendingResolution, ResolutionBroker, ResolutionLauncher};
use crate::sample::RawLocation;

/// Cloud request priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    HighAccuracy,
    BalancedPowerAccuracy,
}

impl Priority {
    pub fn for_options(options: &LocationOptions) -> Self {
        if options.enable_high_accuracy {
            Self::HighAccuracy
        } else {
            Self::BalancedPowerAccuracy
        }
    }
}

/// Availability of the cloud location services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicesAvailability {
    Available,
    /// Unavailable, but the user can fix it (e.g. by updating).
    UserResolvable { status: i32 },
    Unavailable { status: i32 },
}

/// Location settings check request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsRequest {
    pub priority: Priority,
    pub interval: Duration,
}

/// Single current-location request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentLocationRequest {
    pub priority: Priority,
    /// Maximum acceptable age of a cached fix.
    pub max_update_age: Duration,
    /// How long the service may look for a fix.
    pub duration: Duration,
}

/// Continuous updates request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatesRequest {
    pub priority: Priority,
    pub interval: Duration,
    pub max_update_age: Duration,
    pub min_update_interval: Option<Duration>,
}

/// The cloud-services location, settings and availability clients.
pub trait PrimaryLocationService: Send + Sync {
    fn availability(&self) -> ServicesAvailability;

    /// Shows the platform dialog that lets the user fix `status`.
    fn show_availability_dialog(&self, status: i32);

    fn check_settings<'a>(
        &'a self,
        request: &'a SettingsRequest,
    ) -> BoxFuture<'a, Result<(), SettingsFailure>>;

    /// Resolves to `None` when the service gave up without a fix.
    fn current_location<'a>(
        &'a self,
        request: &'a CurrentLocationRequest,
    ) -> BoxFuture<'a, Result<Option<RawLocation>, ProviderError>>;

    fn request_updates(
        &self,
        request: &UpdatesRequest,
        listener: LocationListener,
    ) -> Result<SubscriptionId, ProviderError>;

    fn remove_updates(&self, id: SubscriptionId);
}

/// Result of a location settings check.
#[derive(Debug)]
pub enum SettingsCheckOutcome {
    /// The primary provider can be used.
    Satisfied,
    /// A resolution flow was launched; wait on the handle for the decision.
    AwaitingUserResolution(PendingResolution),
    /// A resolvable problem exists but prompting was not wanted.
    ResolutionSkippedWithError(GeolocationError),
    UnresolvableError(GeolocationError),
}

/// Primary adapter over [`PrimaryLocationService`].
pub struct PrimaryProvider {
    service: Arc<dyn PrimaryLocationService>,
    manager: Arc<dyn NativeLocationManager>,
    connectivity: Arc<dyn ConnectivityInspector>,
    platform: Arc<dyn PlatformProbe>,
    launcher: Arc<dyn ResolutionLauncher>,
    resolutions: Arc<ResolutionBroker>,
}

impl PrimaryProvider {
    pub fn new(
        service: Arc<dyn PrimaryLocationService>,
        manager: Arc<dyn NativeLocationManager>,
        connectivity: Arc<dyn ConnectivityInspector>,
        platform: Arc<dyn PlatformProbe>,
        launcher: Arc<dyn ResolutionLauncher>,
        resolutions: Arc<ResolutionBroker>,
    ) -> Self {
        Self {
            service,
            manager,
            connectivity,
            platform,
            launcher,
            resolutions,
        }
    }

    /// Checks that the cloud services are usable.
    ///
    /// A user-resolvable problem shows the platform dialog when
    /// `should_prompt` is set; it fails as resolvable either way.
    pub fn check_availability(&self, should_prompt: bool) -> Result<(), GeolocationError> {
        match self.service.availability() {
            ServicesAvailability::Available => Ok(()),
            ServicesAvailability::UserResolvable { status } => {
                if should_prompt {
                    debug!(status, "Showing cloud services availability dialog");
                    self.service.show_availability_dialog(status);
                }
                Err(GeolocationError::services_unavailable(true))
            }
            ServicesAvailability::Unavailable { status } => {
                debug!(status, "Cloud location services unavailable");
                Err(GeolocationError::services_unavailable(false))
            }
        }
    }

    /// Checks the device location settings for the requested accuracy.
    ///
    /// A resolvable problem is always offered to the user while location is
    /// off; otherwise only when `should_try_resolve` is set.
    pub async fn check_settings(
        &self,
        options: &LocationOptions,
        should_try_resolve: bool,
    ) -> SettingsCheckOutcome {
        let request = SettingsRequest {
            priority: Priority::for_options(options),
            interval: options.timeout,
        };

        match self.service.check_settings(&request).await {
            Ok(()) => SettingsCheckOutcome::Satisfied,
            Err(SettingsFailure::Resolvable { resolution }) => {
                let location_on = self.manager.is_location_enabled();
                if !location_on || should_try_resolve {
                    let pending = self.resolutions.register();
                    info!(
                        resolution_id = pending.id(),
                        location_on, "Launching location settings resolution"
                    );
                    self.launcher.launch(pending.id(), &resolution);
                    SettingsCheckOutcome::AwaitingUserResolution(pending)
                } else {
                    debug!("Location settings resolution skipped");
                    SettingsCheckOutcome::ResolutionSkippedWithError(GeolocationError::Settings {
                        cause: SettingsFailure::Resolvable { resolution },
                    })
                }
            }
            Err(failure) => {
                SettingsCheckOutcome::UnresolvableError(self.classify_settings_failure(failure))
            }
        }
    }

    /// Fetches one fix bounded by `options.timeout`.
    pub async fn current_location(
        &self,
        options: &LocationOptions,
    ) -> Result<RawLocation, GeolocationError> {
        let request = CurrentLocationRequest {
            priority: Priority::for_options(options),
            max_update_age: options.maximum_age,
            duration: options.timeout,
        };

        self.service
            .current_location(&request)
            .await?
            .ok_or(GeolocationError::LocationTimeout)
    }

    pub fn request_updates(
        &self,
        options: &LocationOptions,
        listener: LocationListener,
    ) -> Result<UpdateHandle, GeolocationError> {
        let request = UpdatesRequest {
            priority: Priority::for_options(options),
            interval: options.timeout,
            max_update_age: options.maximum_age,
            min_update_interval: options.min_update_interval,
        };

        let id = self.service.request_updates(&request, listener)?;
        Ok(UpdateHandle {
            kind: ProviderKind::Primary,
            id,
        })
    }

    pub fn remove_updates(&self, id: SubscriptionId) {
        self.service.remove_updates(id);
    }

    fn classify_settings_failure(&self, failure: SettingsFailure) -> GeolocationError {
        let both_off = failure == SettingsFailure::ChangeUnavailable
            && !self.manager.is_location_enabled()
            && !network_available_for_location(
                self.manager.as_ref(),
                self.connectivity.as_ref(),
                self.platform.api_level(),
            );

        if both_off {
            GeolocationError::LocationAndNetworkDisabled { cause: failure }
        } else {
            GeolocationError::Settings { cause: failure }
        }
    }
}

impl LocationSource for PrimaryProvider {
    fn current_location<'a>(
        &'a self,
        options: &'a LocationOptions,
    ) -> BoxFuture<'a, Result<RawLocation, GeolocationError>> {
        Box::pin(PrimaryProvider::current_location(self, options))
    }

    fn request_updates(
        &self,
        options: &LocationOptions,
        listener: LocationListener,
    ) -> Result<UpdateHandle, GeolocationError> {
        PrimaryProvider::request_updates(self, options, listener)
    }

    fn remove_updates(&self, handle: UpdateHandle) {
        PrimaryProvider::remove_updates(self, handle.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NetworkTransport;
    use crate::resolution::{ResolutionResult, ResolutionToken};
    use crate::simulator::SimulatedDevice;

    fn primary_for(device: &Arc<SimulatedDevice>) -> (PrimaryProvider, Arc<ResolutionBroker>) {
        let broker = Arc::new(ResolutionBroker::new());
        let provider = PrimaryProvider::new(
            device.clone(),
            device.clone(),
            device.clone(),
            device.clone(),
            device.clone(),
            broker.clone(),
        );
        (provider, broker)
    }

    fn token() -> ResolutionToken {
        ResolutionToken("enable-location".to_string())
    }

    #[test]
    fn test_availability_outcomes() {
        let device = SimulatedDevice::shared();
        let (primary, _) = primary_for(&device);

        assert!(primary.check_availability(true).is_ok());

        device.set_availability(ServicesAvailability::UserResolvable { status: 2 });
        assert_eq!(
            primary.check_availability(false),
            Err(GeolocationError::services_unavailable(true))
        );
        assert_eq!(device.calls().availability_dialogs, 0);

        assert!(primary.check_availability(true).is_err());
        assert_eq!(device.calls().availability_dialogs, 1);

        device.set_availability(ServicesAvailability::Unavailable { status: 9 });
        assert_eq!(
            primary.check_availability(true),
            Err(GeolocationError::services_unavailable(false))
        );
        assert_eq!(device.calls().availability_dialogs, 1);
    }

    #[tokio::test]
    async fn test_settings_satisfied() {
        let device = SimulatedDevice::shared();
        let (primary, _) = primary_for(&device);

        let options = LocationOptions::default().with_high_accuracy(false);
        let outcome = primary.check_settings(&options, true).await;

        assert!(matches!(outcome, SettingsCheckOutcome::Satisfied));
        let request = device.last_settings_request().unwrap();
        assert_eq!(request.priority, Priority::BalancedPowerAccuracy);
        assert_eq!(request.interval, options.timeout);
    }

    #[tokio::test]
    async fn test_resolvable_launches_when_asked() {
        let device = SimulatedDevice::shared();
        device.set_settings_result(Err(SettingsFailure::Resolvable { resolution: token() }));
        let (primary, broker) = primary_for(&device);

        let outcome = primary.check_settings(&LocationOptions::default(), true).await;

        let SettingsCheckOutcome::AwaitingUserResolution(pending) = outcome else {
            panic!("expected resolution, got {:?}", outcome);
        };
        assert_eq!(device.launched_resolutions(), vec![(pending.id(), token())]);

        broker.resolve(pending.id(), ResolutionResult::Approved);
        assert_eq!(pending.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_resolvable_launches_when_location_off() {
        let device = SimulatedDevice::shared();
        device.set_settings_result(Err(SettingsFailure::Resolvable { resolution: token() }));
        device.set_location_enabled(false);
        let (primary, _) = primary_for(&device);

        let outcome = primary.check_settings(&LocationOptions::default(), false).await;

        assert!(matches!(outcome, SettingsCheckOutcome::AwaitingUserResolution(_)));
        assert_eq!(device.launched_resolutions().len(), 1);
    }

    #[tokio::test]
    async fn test_resolvable_skipped() {
        let device = SimulatedDevice::shared();
        device.set_settings_result(Err(SettingsFailure::Resolvable { resolution: token() }));
        let (primary, broker) = primary_for(&device);

        let outcome = primary.check_settings(&LocationOptions::default(), false).await;

        let SettingsCheckOutcome::ResolutionSkippedWithError(error) = outcome else {
            panic!("expected skipped resolution, got {:?}", outcome);
        };
        assert_eq!(
            error,
            GeolocationError::Settings {
                cause: SettingsFailure::Resolvable { resolution: token() }
            }
        );
        assert!(device.launched_resolutions().is_empty());
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_change_unavailable_with_everything_off() {
        let device = SimulatedDevice::shared();
        device.set_settings_result(Err(SettingsFailure::ChangeUnavailable));
        device.set_location_enabled(false);
        device.set_transports(Vec::new());
        let (primary, _) = primary_for(&device);

        let outcome = primary.check_settings(&LocationOptions::default(), false).await;

        let SettingsCheckOutcome::UnresolvableError(error) = outcome else {
            panic!("expected unresolvable error, got {:?}", outcome);
        };
        assert!(error.disqualifies_fallback());
    }

    #[tokio::test]
    async fn test_change_unavailable_with_network_is_settings_error() {
        let device = SimulatedDevice::shared();
        device.set_settings_result(Err(SettingsFailure::ChangeUnavailable));
        device.set_location_enabled(false);
        device.set_transports(vec![NetworkTransport::Wifi]);
        let (primary, _) = primary_for(&device);

        let outcome = primary.check_settings(&LocationOptions::default(), false).await;

        let SettingsCheckOutcome::UnresolvableError(error) = outcome else {
            panic!("expected unresolvable error, got {:?}", outcome);
        };
        assert_eq!(
            error,
            GeolocationError::Settings {
                cause: SettingsFailure::ChangeUnavailable
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_location_request_and_null_result() {
        let device = SimulatedDevice::shared();
        let (primary, _) = primary_for(&device);
        let options = LocationOptions::default()
            .with_timeout(Duration::from_secs(5))
            .with_maximum_age(Duration::from_secs(2));

        assert_eq!(
            primary.current_location(&options).await,
            Err(GeolocationError::LocationTimeout)
        );
        assert_eq!(
            device.last_current_location_request(),
            Some(CurrentLocationRequest {
                priority: Priority::HighAccuracy,
                max_update_age: Duration::from_secs(2),
                duration: Duration::from_secs(5),
            })
        );

        device.set_primary_fix(Some(RawLocation::at(5.0, 6.0, 7)));
        let location = primary.current_location(&options).await.unwrap();
        assert_eq!(location.longitude, 6.0);
    }

    #[test]
    fn test_updates_request_passthrough() {
        let device = SimulatedDevice::shared();
        let (primary, _) = primary_for(&device);
        let options = LocationOptions::default()
            .with_timeout(Duration::from_secs(3))
            .with_maximum_age(Duration::from_secs(1))
            .with_min_update_interval(Duration::from_millis(500));

        let listener: LocationListener = Arc::new(|_batch: Vec<RawLocation>| {});
        let handle = primary.request_updates(&options, listener).unwrap();

        assert_eq!(handle.kind, ProviderKind::Primary);
        assert_eq!(
            device.last_updates_request(),
            Some(UpdatesRequest {
                priority: Priority::HighAccuracy,
                interval: Duration::from_secs(3),
                max_update_age: Duration::from_secs(1),
                min_update_interval: Some(Duration::from_millis(500)),
            })
        );
        assert_eq!(device.active_primary_listeners(), 1);

        primary.remove_updates(handle.id);
        assert_eq!(device.active_primary_listeners(), 0);
    }
}
