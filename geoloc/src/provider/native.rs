//! Fallback adapter over the platform-native location manager.
//!
//! Used when the cloud location services cannot serve a request and the
//! caller allowed falling back. The native manager has no max-update-age
//! option, so cached fixes are checked here before any request is made.
//!
//! # Quality
//!
//! Without a usable network connection the request drops one quality level,
//! so satellite-only devices are not asked for accuracy they cannot deliver
//! within the timeout:
//!
//! | high accuracy | network | quality       |
//! |---------------|---------|---------------|
//! | yes           | yes     | high accuracy |
//! | yes           | no      | balanced      |
//! | no            | yes     | balanced      |
//! | no            | no      | low power     |

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use super::{
    BoxFuture, LocationListener, LocationSource, ProviderKind, SubscriptionId, UpdateHandle,
};
use crate::error::{GeolocationError, ProviderError};
use crate::options::LocationOptions;
use crate::platform::{
    network_available_for_location, ConnectivityInspector, PlatformProbe,
    FUSED_NATIVE_PROVIDER_MIN_API,
};
use crate::sample::RawLocation;

/// Native location provider names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeProvider {
    /// Satellite positioning.
    Gps,
    /// Cell and Wi-Fi positioning.
    Network,
    /// On-device fusion of the other providers.
    Fused,
}

impl NativeProvider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gps => "gps",
            Self::Network => "network",
            Self::Fused => "fused",
        }
    }
}

/// Native request quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    HighAccuracy,
    Balanced,
    LowPower,
}

impl Quality {
    pub fn derive(enable_high_accuracy: bool, network_available: bool) -> Self {
        match (enable_high_accuracy, network_available) {
            (true, true) => Self::HighAccuracy,
            (true, false) | (false, true) => Self::Balanced,
            (false, false) => Self::LowPower,
        }
    }
}

/// Parameters of a native update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeUpdateRequest {
    pub interval: Duration,
    pub quality: Quality,
    pub min_update_interval: Option<Duration>,
}

/// The platform-native location manager.
pub trait NativeLocationManager: Send + Sync {
    /// Most recent fix cached by `provider`, if any.
    fn last_known_location(&self, provider: NativeProvider) -> Option<RawLocation>;

    fn request_updates(
        &self,
        provider: NativeProvider,
        request: &NativeUpdateRequest,
        listener: LocationListener,
    ) -> Result<SubscriptionId, ProviderError>;

    fn remove_updates(&self, id: SubscriptionId);

    fn is_location_enabled(&self) -> bool;

    fn has_provider(&self, provider: NativeProvider) -> bool;
}

/// Removes a native subscription when dropped.
struct ListenerGuard<'a> {
    manager: &'a dyn NativeLocationManager,
    id: SubscriptionId,
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        self.manager.remove_updates(self.id);
    }
}

/// Fallback adapter over [`NativeLocationManager`].
pub struct FallbackProvider {
    manager: Arc<dyn NativeLocationManager>,
    connectivity: Arc<dyn ConnectivityInspector>,
    platform: Arc<dyn PlatformProbe>,
}

impl FallbackProvider {
    pub fn new(
        manager: Arc<dyn NativeLocationManager>,
        connectivity: Arc<dyn ConnectivityInspector>,
        platform: Arc<dyn PlatformProbe>,
    ) -> Self {
        Self {
            manager,
            connectivity,
            platform,
        }
    }

    /// Obtains a fix: a fresh enough cached one, or the first fix of a new
    /// request bounded by `options.timeout`.
    ///
    /// The native subscription is removed on every exit path, including
    /// the returned future being dropped.
    pub async fn current_location(
        &self,
        options: &LocationOptions,
    ) -> Result<RawLocation, GeolocationError> {
        if let Some(cached) = self.valid_cached_location(options) {
            debug!(time_ms = cached.time_ms, "Using cached native location");
            return Ok(cached);
        }

        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let listener: LocationListener = Arc::new(move |batch: Vec<RawLocation>| {
            if let Some(location) = batch.into_iter().next() {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(location);
                }
            }
        });

        let request = NativeUpdateRequest {
            interval: Duration::ZERO,
            quality: self.quality_for(options),
            min_update_interval: None,
        };
        let provider = self.provider_to_use();
        debug!(
            provider = provider.name(),
            quality = ?request.quality,
            "Requesting fresh native location"
        );

        let id = self.manager.request_updates(provider, &request, listener)?;
        let _subscription = ListenerGuard {
            manager: self.manager.as_ref(),
            id,
        };

        match tokio::time::timeout(options.timeout, rx).await {
            Ok(Ok(location)) => Ok(location),
            Ok(Err(_)) => Err(ProviderError::Closed.into()),
            Err(_) => {
                debug!(
                    timeout_ms = options.timeout.as_millis() as u64,
                    "Native location request timed out"
                );
                Err(GeolocationError::LocationTimeout)
            }
        }
    }

    /// Emits a fresh enough cached fix, then subscribes to updates.
    ///
    /// `maximum_age` only applies to that first cached fix; the native
    /// manager cannot filter later updates by age.
    pub fn request_updates(
        &self,
        options: &LocationOptions,
        listener: LocationListener,
    ) -> Result<UpdateHandle, GeolocationError> {
        if let Some(cached) = self.valid_cached_location(options) {
            listener(vec![cached]);
        }

        let request = NativeUpdateRequest {
            interval: options.timeout,
            quality: self.quality_for(options),
            min_update_interval: options.min_update_interval,
        };
        let non_empty: LocationListener = Arc::new(move |batch: Vec<RawLocation>| {
            if !batch.is_empty() {
                listener(batch);
            }
        });

        let id = self
            .manager
            .request_updates(self.provider_to_use(), &request, non_empty)?;

        Ok(UpdateHandle {
            kind: ProviderKind::Fallback,
            id,
        })
    }

    pub fn remove_updates(&self, id: SubscriptionId) {
        self.manager.remove_updates(id);
    }

    /// The newest cached fix across providers, if younger than `maximum_age`.
    fn valid_cached_location(&self, options: &LocationOptions) -> Option<RawLocation> {
        let now_ms = chrono::Utc::now().timestamp_millis();

        [NativeProvider::Gps, NativeProvider::Network]
            .into_iter()
            .filter_map(|provider| self.manager.last_known_location(provider))
            .max_by_key(|location| location.time_ms)
            .filter(|location| {
                u128::from(location.age_ms(now_ms)) < options.maximum_age.as_millis()
            })
    }

    fn network_available(&self) -> bool {
        network_available_for_location(
            self.manager.as_ref(),
            self.connectivity.as_ref(),
            self.platform.api_level(),
        )
    }

    fn quality_for(&self, options: &LocationOptions) -> Quality {
        Quality::derive(options.enable_high_accuracy, self.network_available())
    }

    /// Provider name for fix requests; independent of quality.
    fn provider_to_use(&self) -> NativeProvider {
        if self.network_available() && self.platform.api_level() >= FUSED_NATIVE_PROVIDER_MIN_API {
            NativeProvider::Fused
        } else {
            NativeProvider::Gps
        }
    }
}

impl LocationSource for FallbackProvider {
    fn current_location<'a>(
        &'a self,
        options: &'a LocationOptions,
    ) -> BoxFuture<'a, Result<RawLocation, GeolocationError>> {
        Box::pin(FallbackProvider::current_location(self, options))
    }

    fn request_updates(
        &self,
        options: &LocationOptions,
        listener: LocationListener,
    ) -> Result<UpdateHandle, GeolocationError> {
        FallbackProvider::request_updates(self, options, listener)
    }

    fn remove_updates(&self, handle: UpdateHandle) {
        FallbackProvider::remove_updates(self, handle.id);
    }
}
