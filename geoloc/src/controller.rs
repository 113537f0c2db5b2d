//! Provider selection and request orchestration.
//!
//! [`GeolocationController`] runs the precondition pipeline for every
//! request and routes it to the primary or the fallback adapter:
//!
//! ```text
//! validate options ──► availability ──► settings ──► Primary
//!                            │              │
//!                            │        awaiting resolution ──approved──► Primary
//!                            │              │                 denied ──► failure
//!                            ▼              ▼
//!                    fallback enabled and not LocationAndNetworkDisabled?
//!                        yes ──► Fallback        no ──► failure
//! ```
//!
//! With fallback enabled the user is never prompted: a failed availability
//! check goes straight to the fallback, and resolvable settings problems are
//! only offered for resolution while location is switched off.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::GeolocationError;
use crate::options::LocationOptions;
use crate::platform::{ConnectivityInspector, PlatformProbe};
use crate::provider::{
    FallbackProvider, LocationListener, LocationSource, NativeLocationManager,
    PrimaryLocationService, PrimaryProvider, ProviderKind, SettingsCheckOutcome,
};
use crate::resolution::{ResolutionBroker, ResolutionId, ResolutionLauncher, ResolutionResult};
use crate::sample::{LocationSample, RawLocation};
use crate::watch::{
    RegisterOutcome, WatchMessage, WatchRegistration, WatchRegistry, WatchStream, WatchToken,
};

/// External capabilities consumed by the controller.
#[derive(Clone)]
pub struct PlatformServices {
    pub primary: Arc<dyn PrimaryLocationService>,
    pub native: Arc<dyn NativeLocationManager>,
    pub connectivity: Arc<dyn ConnectivityInspector>,
    pub platform: Arc<dyn PlatformProbe>,
    pub launcher: Arc<dyn ResolutionLauncher>,
}

/// Kind of request running through the precondition pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Single,
    Watch,
}

struct Shared {
    primary: PrimaryProvider,
    fallback: FallbackProvider,
    native: Arc<dyn NativeLocationManager>,
    platform: Arc<dyn PlatformProbe>,
    watches: WatchRegistry,
    resolutions: Arc<ResolutionBroker>,
}

/// Entry point for single fetches and watches.
///
/// Cheap to clone; clones share the watch registry and pending resolutions.
#[derive(Clone)]
pub struct GeolocationController {
    shared: Arc<Shared>,
}

impl GeolocationController {
    pub fn new(services: PlatformServices) -> Self {
        let resolutions = Arc::new(ResolutionBroker::new());
        let primary = PrimaryProvider::new(
            services.primary,
            services.native.clone(),
            services.connectivity.clone(),
            services.platform.clone(),
            services.launcher,
            resolutions.clone(),
        );
        let fallback = FallbackProvider::new(
            services.native.clone(),
            services.connectivity,
            services.platform.clone(),
        );

        Self {
            shared: Arc::new(Shared {
                primary,
                fallback,
                native: services.native,
                platform: services.platform,
                watches: WatchRegistry::new(),
                resolutions,
            }),
        }
    }

    /// Obtains a single location sample.
    pub async fn get_current_position(
        &self,
        options: &LocationOptions,
    ) -> Result<LocationSample, GeolocationError> {
        let shared = &self.shared;
        let route = shared.check_preconditions(options, RequestKind::Single).await?;

        let location = shared.source(route).current_location(options).await?;
        debug!(%route, time_ms = location.time_ms, "Current position obtained");
        Ok(location.to_sample(shared.platform.api_level()))
    }

    /// Starts a watch identified by `watch_id`.
    ///
    /// Nothing happens until the returned stream is first polled. Failures,
    /// including invalid options, are yielded as the single final item.
    pub fn add_watch(&self, options: LocationOptions, watch_id: impl Into<String>) -> WatchStream {
        let watch_id = watch_id.into();
        let token = self.shared.watches.next_token();
        let (tx, rx) = mpsc::unbounded_channel();
        let timeout = options.timeout;

        let setup = Box::pin(Shared::start_watch(
            self.shared.clone(),
            options,
            watch_id.clone(),
            token,
            tx,
        ));

        let weak = Arc::downgrade(&self.shared);
        let close_id = watch_id.clone();
        let on_close = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.release_watch(&close_id, token);
            }
        });

        WatchStream::new(watch_id, timeout, setup, rx, on_close)
    }

    /// Stops the watch `watch_id`.
    ///
    /// Returns false if no watch was registered under that id; the id is
    /// then remembered so a registration still in flight gets cancelled.
    pub fn clear_watch(&self, watch_id: &str) -> bool {
        match self.shared.watches.clear(watch_id) {
            Some(registration) => {
                info!(watch_id, route = %registration.handle.kind, "Watch cleared");
                self.shared.teardown(registration);
                true
            }
            None => {
                debug!(watch_id, "No active watch to clear, deferring cancellation");
                false
            }
        }
    }

    pub fn are_location_services_enabled(&self) -> bool {
        self.shared.native.is_location_enabled()
    }

    /// Reports the user's decision for the oldest pending resolution flow.
    ///
    /// Returns false if no request was waiting.
    pub fn on_settings_resolution_result(&self, result: ResolutionResult) -> bool {
        self.shared.resolutions.resolve_next(result)
    }

    /// Reports the user's decision for the resolution flow launched as `id`.
    pub fn on_settings_resolution_result_for(
        &self,
        id: ResolutionId,
        result: ResolutionResult,
    ) -> bool {
        self.shared.resolutions.resolve(id, result)
    }

    /// Reports a host activity result code for the oldest pending resolution.
    pub fn on_settings_resolution_result_code(&self, result_code: i32) -> bool {
        self.on_settings_resolution_result(ResolutionResult::from_result_code(result_code))
    }

    pub fn resolutions(&self) -> Arc<ResolutionBroker> {
        self.shared.resolutions.clone()
    }

    pub fn active_watch_count(&self) -> usize {
        self.shared.watches.active_count()
    }
}

impl Shared {
    fn source(&self, kind: ProviderKind) -> &dyn LocationSource {
        match kind {
            ProviderKind::Primary => &self.primary,
            ProviderKind::Fallback => &self.fallback,
        }
    }

    /// Decides which adapter serves a request.
    async fn check_preconditions(
        &self,
        options: &LocationOptions,
        kind: RequestKind,
    ) -> Result<ProviderKind, GeolocationError> {
        options.validate()?;

        match self.check_primary(options, kind).await {
            Ok(()) => Ok(ProviderKind::Primary),
            Err(error) if !options.enable_fallback_to_native || error.disqualifies_fallback() => {
                warn!(%error, ?kind, "Location preconditions failed");
                Err(error)
            }
            Err(error) => {
                info!(%error, ?kind, "Primary provider unusable, falling back to native");
                Ok(ProviderKind::Fallback)
            }
        }
    }

    async fn check_primary(
        &self,
        options: &LocationOptions,
        kind: RequestKind,
    ) -> Result<(), GeolocationError> {
        let prompt = options.should_prompt_user();
        self.primary.check_availability(prompt)?;

        let settings_options = match kind {
            RequestKind::Single => options.clone().with_timeout(Duration::ZERO),
            RequestKind::Watch => options.clone(),
        };

        match self.primary.check_settings(&settings_options, prompt).await {
            SettingsCheckOutcome::Satisfied => Ok(()),
            SettingsCheckOutcome::AwaitingUserResolution(pending) => {
                let id = pending.id();
                let decision = pending.wait().await;
                info!(
                    resolution_id = id,
                    approved = decision.is_ok(),
                    "Settings resolution finished"
                );
                decision
            }
            SettingsCheckOutcome::ResolutionSkippedWithError(error)
            | SettingsCheckOutcome::UnresolvableError(error) => Err(error),
        }
    }

    /// Body of a watch stream: preconditions, subscription, registration.
    async fn start_watch(
        shared: Arc<Shared>,
        options: LocationOptions,
        watch_id: String,
        token: WatchToken,
        tx: mpsc::UnboundedSender<WatchMessage>,
    ) {
        let route = match shared.check_preconditions(&options, RequestKind::Watch).await {
            Ok(route) => route,
            Err(error) => {
                let _ = tx.send(WatchMessage::Failure(error));
                return;
            }
        };

        let listener =
            Self::watch_listener(Arc::downgrade(&shared), watch_id.clone(), token, tx.clone());
        let handle = match shared.source(route).request_updates(&options, listener) {
            Ok(handle) => handle,
            Err(error) => {
                warn!(watch_id, %route, %error, "Failed to start location updates");
                let _ = tx.send(WatchMessage::Failure(error));
                return;
            }
        };

        let registration = WatchRegistration {
            handle,
            token,
            closer: tx,
        };
        match shared.watches.register(&watch_id, registration) {
            RegisterOutcome::Registered { displaced } => {
                info!(watch_id, %route, "Watch registered");
                if let Some(old) = displaced {
                    warn!(watch_id, "Watch id reused, replacing earlier watch");
                    shared.teardown(old);
                }
            }
            RegisterOutcome::Cancelled(registration) => {
                info!(watch_id, "Watch cleared during setup, cancelling");
                shared.teardown(registration);
            }
        }
    }

    /// Listener mapping provider batches onto watch messages.
    ///
    /// Holds the controller weakly; providers own their listeners.
    fn watch_listener(
        shared: Weak<Shared>,
        watch_id: String,
        token: WatchToken,
        tx: mpsc::UnboundedSender<WatchMessage>,
    ) -> LocationListener {
        Arc::new(move |batch: Vec<RawLocation>| {
            let Some(shared) = shared.upgrade() else {
                return;
            };

            if let Some(own) = shared.watches.take_deferred(&watch_id, token) {
                debug!(watch_id, "Deferred cancellation observed, dropping update");
                match own {
                    Some(registration) => shared.teardown(registration),
                    None => {
                        let _ = tx.send(WatchMessage::Closed);
                    }
                }
                return;
            }

            // Empty native batches are dropped by the fallback adapter;
            // primary batches pass through as delivered.
            let api_level = shared.platform.api_level();
            let samples = batch.iter().map(|location| location.to_sample(api_level)).collect();
            let _ = tx.send(WatchMessage::Locations(samples));
        })
    }

    /// Stops the provider subscription and ends the owning stream.
    fn teardown(&self, registration: WatchRegistration) {
        self.source(registration.handle.kind)
            .remove_updates(registration.handle);
        let _ = registration.closer.send(WatchMessage::Closed);
    }

    /// Called when a stream closes: removes its own registration, if any.
    fn release_watch(&self, watch_id: &str, token: WatchToken) {
        if let Some(registration) = self.watches.release(watch_id, token) {
            debug!(watch_id, "Watch stream closed, removing updates");
            self.source(registration.handle.kind)
                .remove_updates(registration.handle);
        }
    }
}
