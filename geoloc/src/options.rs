//! Request options shared by single fetches and watches.

use std::time::Duration;

use crate::error::GeolocationError;

/// Default timeout when none is configured (60s).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default maximum age of a cached fix (30s).
pub const DEFAULT_MAXIMUM_AGE: Duration = Duration::from_secs(30);

/// Options for a location request.
///
/// # Timeout
///
/// - For [`get_current_position`](crate::GeolocationController::get_current_position)
///   it is the maximum time to wait for a fresh fix.
/// - For [`add_watch`](crate::GeolocationController::add_watch) it is the
///   interval at which updates are requested, and the time the stream may stay
///   silent before failing with [`GeolocationError::LocationTimeout`].
///
/// # Fallback
///
/// With `enable_fallback_to_native` set, failures of the cloud location
/// preconditions route the request to the native location manager instead of
/// failing it. The native manager may need a higher timeout: in airplane mode
/// only the satellite provider is used, which may only produce a fix while
/// moving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationOptions {
    pub timeout: Duration,

    /// Maximum acceptable age of a cached fix.
    pub maximum_age: Duration,

    pub enable_high_accuracy: bool,

    pub enable_fallback_to_native: bool,

    /// Minimum interval between consecutive watch updates.
    pub min_update_interval: Option<Duration>,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            maximum_age: DEFAULT_MAXIMUM_AGE,
            enable_high_accuracy: true,
            enable_fallback_to_native: false,
            min_update_interval: None,
        }
    }
}

impl LocationOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_maximum_age(mut self, maximum_age: Duration) -> Self {
        self.maximum_age = maximum_age;
        self
    }

    pub fn with_high_accuracy(mut self, enabled: bool) -> Self {
        self.enable_high_accuracy = enabled;
        self
    }

    pub fn with_fallback_to_native(mut self, enabled: bool) -> Self {
        self.enable_fallback_to_native = enabled;
        self
    }

    pub fn with_min_update_interval(mut self, interval: Duration) -> Self {
        self.min_update_interval = Some(interval);
        self
    }

    /// Rejects options that must never reach a provider.
    pub fn validate(&self) -> Result<(), GeolocationError> {
        if self.timeout.is_zero() {
            return Err(GeolocationError::InvalidTimeout);
        }
        Ok(())
    }

    /// Cloud prompts are only worth showing when there is nothing to fall back to.
    pub(crate) fn should_prompt_user(&self) -> bool {
        !self.enable_fallback_to_native
    }
}
