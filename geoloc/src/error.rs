//! Error types for location requests.
//!
//! Every failure a request can end in is a [`GeolocationError`]. Failures
//! reported by the external location services are carried as
//! [`ProviderError`] (unexpected faults) or [`SettingsFailure`] (the typed
//! outcome of a settings check).

use thiserror::Error;

use crate::resolution::ResolutionToken;

/// Errors returned by the public location operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeolocationError {
    /// The request timeout was zero.
    #[error("Timeout needs to be a positive value.")]
    InvalidTimeout,

    /// The cloud location services are not usable on this device.
    #[error("{message}")]
    GoogleServicesUnavailable {
        /// Whether the user could fix the problem (e.g. by updating services).
        resolvable: bool,
        message: String,
    },

    /// The location settings check failed for a reason the user cannot fix.
    #[error("There is an error with the location settings: {cause}")]
    Settings { cause: SettingsFailure },

    /// Both location and network are off, so no provider can produce a fix.
    #[error("Unable to retrieve location because device has both Network and Location turned off.")]
    LocationAndNetworkDisabled { cause: SettingsFailure },

    /// The user declined to enable location when prompted.
    #[error("Request to enable location denied.")]
    RequestDenied,

    /// No fix arrived within the request timeout.
    #[error("Location request timed out")]
    LocationTimeout,

    /// Unexpected failure from an underlying location service.
    #[error("Location provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl GeolocationError {
    pub(crate) fn services_unavailable(resolvable: bool) -> Self {
        let message = if resolvable {
            "Google Play Services error user resolvable."
        } else {
            "Google Play Services error."
        };
        Self::GoogleServicesUnavailable {
            resolvable,
            message: message.to_string(),
        }
    }

    /// Returns true if the native fallback can never help with this error.
    pub fn disqualifies_fallback(&self) -> bool {
        matches!(self, Self::LocationAndNetworkDisabled { .. })
    }
}

/// Unexpected failure reported by an external location service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The service refused or failed the call.
    #[error("request failed: {0}")]
    Request(String),

    /// The service went away before answering.
    #[error("provider closed before delivering a location")]
    Closed,
}

/// Typed failure of a location settings check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsFailure {
    /// The settings can be fixed by showing the user a resolution flow.
    #[error("location settings are not satisfied (resolvable)")]
    Resolvable { resolution: ResolutionToken },

    /// The settings cannot be changed on this device.
    #[error("SETTINGS_CHANGE_UNAVAILABLE")]
    ChangeUnavailable,

    /// Any other settings failure.
    #[error("{0}")]
    Other(String),
}
