//! Location provider adapters.
//!
//! Two adapters sit between the controller and the external location
//! services:
//!
//! - [`PrimaryProvider`] - the cloud-services fused provider, with settings
//!   and availability checks
//! - [`FallbackProvider`] - the platform-native location manager
//!
//! Both implement [`LocationSource`], so the controller fetches and subscribes
//! without caring which one a request was routed to.
//!
//! # Subscriptions
//!
//! External services deliver fixes through a [`LocationListener`] and hand
//! back a [`SubscriptionId`]. Adapters wrap that id in an [`UpdateHandle`]
//! tagged with the provider it belongs to, which is all the controller needs
//! to tear the subscription down later.

pub mod native;
pub mod primary;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::GeolocationError;
use crate::options::LocationOptions;
use crate::sample::RawLocation;

pub use native::{
    FallbackProvider, NativeLocationManager, NativeProvider, NativeUpdateRequest, Quality,
};
pub use primary::{
    CurrentLocationRequest, PrimaryLocationService, PrimaryProvider, Priority,
    ServicesAvailability, SettingsCheckOutcome, SettingsRequest, UpdatesRequest,
};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback receiving batches of fixes from a provider subscription.
///
/// May be invoked from any thread, in provider callback order.
pub type LocationListener = Arc<dyn Fn(Vec<RawLocation>) + Send + Sync>;

/// Identifier of a subscription inside an external location service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Which adapter serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Primary,
    Fallback,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Handle to a running continuous subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateHandle {
    pub kind: ProviderKind,
    pub id: SubscriptionId,
}

/// Capabilities shared by both adapters.
pub trait LocationSource: Send + Sync {
    /// Obtains a single fix, failing with
    /// [`GeolocationError::LocationTimeout`] if none arrives in time.
    fn current_location<'a>(
        &'a self,
        options: &'a LocationOptions,
    ) -> BoxFuture<'a, Result<RawLocation, GeolocationError>>;

    /// Starts a continuous subscription delivering to `listener`.
    fn request_updates(
        &self,
        options: &LocationOptions,
        listener: LocationListener,
    ) -> Result<UpdateHandle, GeolocationError>;

    /// Stops a subscription. Fire-and-forget: removal is not confirmed.
    fn remove_updates(&self, handle: UpdateHandle);
}
