//! Registry of active watches and the deferred-cancellation set.
//!
//! Both maps sit behind one mutex, so a clear racing a registration or a
//! provider callback on the same id always sees a consistent pair.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::GeolocationError;
use crate::provider::UpdateHandle;
use crate::sample::LocationSample;

/// Identifies one [`WatchStream`](super::WatchStream) among streams that
/// share a watch id.
pub type WatchToken = u64;

/// Message delivered to a watch stream.
#[derive(Debug)]
pub enum WatchMessage {
    Locations(Vec<LocationSample>),
    /// Terminal failure; the stream ends after yielding it.
    Failure(GeolocationError),
    /// The watch was torn down; the stream ends without another item.
    Closed,
}

/// An active provider subscription serving a watch.
#[derive(Debug)]
pub struct WatchRegistration {
    pub handle: UpdateHandle,
    pub token: WatchToken,
    /// Ends the owning stream.
    pub closer: mpsc::UnboundedSender<WatchMessage>,
}

/// Result of [`WatchRegistry::register`].
#[derive(Debug)]
pub enum RegisterOutcome {
    /// Now active. Carries the registration previously active under the
    /// same id, which the caller must tear down.
    Registered { displaced: Option<WatchRegistration> },
    /// The id was cleared before registration; the caller must tear the
    /// returned registration down.
    Cancelled(WatchRegistration),
}

#[derive(Debug, Default)]
struct RegistryState {
    active: HashMap<String, WatchRegistration>,
    deferred: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct WatchRegistry {
    state: Mutex<RegistryState>,
    next_token: AtomicU64,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token(&self) -> WatchToken {
        self.next_token.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Registers a started subscription, unless the id was cleared first.
    pub fn register(&self, watch_id: &str, registration: WatchRegistration) -> RegisterOutcome {
        let mut state = self.state.lock();
        if state.deferred.remove(watch_id) {
            return RegisterOutcome::Cancelled(registration);
        }
        let displaced = state.active.insert(watch_id.to_string(), registration);
        RegisterOutcome::Registered { displaced }
    }

    /// Removes the active registration for `watch_id`.
    ///
    /// With none active the id is deferred, so a registration still being
    /// set up is cancelled when it arrives.
    pub fn clear(&self, watch_id: &str) -> Option<WatchRegistration> {
        let mut state = self.state.lock();
        let removed = state.active.remove(watch_id);
        if removed.is_none() {
            state.deferred.insert(watch_id.to_string());
        }
        removed
    }

    /// Removes the registration for `watch_id` only if it belongs to the
    /// stream holding `token`.
    pub fn release(&self, watch_id: &str, token: WatchToken) -> Option<WatchRegistration> {
        let mut state = self.state.lock();
        match state.active.get(watch_id) {
            Some(registration) if registration.token == token => state.active.remove(watch_id),
            _ => None,
        }
    }

    /// Consumes a deferred cancellation observed from a provider callback.
    ///
    /// Returns `None` if `watch_id` is not deferred. Otherwise returns the
    /// stream's own registration, if it is the active one, removed from the
    /// registry.
    pub fn take_deferred(
        &self,
        watch_id: &str,
        token: WatchToken,
    ) -> Option<Option<WatchRegistration>> {
        let mut state = self.state.lock();
        if !state.deferred.remove(watch_id) {
            return None;
        }
        let own = match state.active.get(watch_id) {
            Some(registration) if registration.token == token => state.active.remove(watch_id),
            _ => None,
        };
        Some(own)
    }

    pub fn is_deferred(&self, watch_id: &str) -> bool {
        self.state.lock().deferred.contains(watch_id)
    }

    pub fn is_active(&self, watch_id: &str) -> bool {
        self.state.lock().active.contains_key(watch_id)
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderKind, SubscriptionId};

    fn registration(
        registry: &WatchRegistry,
    ) -> (WatchRegistration, mpsc::UnboundedReceiver<WatchMessage>) {
        let (closer, rx) = mpsc::unbounded_channel();
        let registration = WatchRegistration {
            handle: UpdateHandle {
                kind: ProviderKind::Primary,
                id: SubscriptionId(1),
            },
            token: registry.next_token(),
            closer,
        };
        (registration, rx)
    }

    #[test]
    fn test_register_then_clear() {
        let registry = WatchRegistry::new();
        let (reg, _rx) = registration(&registry);

        assert!(matches!(
            registry.register("w", reg),
            RegisterOutcome::Registered { displaced: None }
        ));
        assert!(registry.is_active("w"));

        assert!(registry.clear("w").is_some());
        assert_eq!(registry.active_count(), 0);
        assert!(!registry.is_deferred("w"));
    }

    #[test]
    fn test_clear_before_register_defers() {
        let registry = WatchRegistry::new();
        assert!(registry.clear("w").is_none());
        assert!(registry.is_deferred("w"));

        let (reg, _rx) = registration(&registry);
        assert!(matches!(registry.register("w", reg), RegisterOutcome::Cancelled(_)));
        assert!(!registry.is_deferred("w"), "deferred entry is consumed");
        assert!(!registry.is_active("w"));
    }

    #[test]
    fn test_duplicate_id_displaces() {
        let registry = WatchRegistry::new();
        let (first, _rx1) = registration(&registry);
        let first_token = first.token;
        let (second, _rx2) = registration(&registry);

        registry.register("w", first);
        match registry.register("w", second) {
            RegisterOutcome::Registered {
                displaced: Some(old),
            } => assert_eq!(old.token, first_token),
            other => panic!("expected displacement, got {:?}", other),
        }
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_release_is_token_guarded() {
        let registry = WatchRegistry::new();
        let (reg, _rx) = registration(&registry);
        let token = reg.token;
        registry.register("w", reg);

        assert!(registry.release("w", token + 100).is_none());
        assert!(registry.is_active("w"));

        assert!(registry.release("w", token).is_some());
        assert!(!registry.is_active("w"));
        assert!(!registry.is_deferred("w"), "release never defers");
    }

    #[test]
    fn test_take_deferred() {
        let registry = WatchRegistry::new();
        let (reg, _rx) = registration(&registry);
        let token = reg.token;

        assert!(registry.take_deferred("w", token).is_none());

        registry.clear("w");
        registry.state.lock().active.insert("w".to_string(), reg);

        let taken = registry.take_deferred("w", token).unwrap();
        assert!(taken.is_some());
        assert!(!registry.is_deferred("w"));
        assert_eq!(registry.active_count(), 0);

        assert!(registry.take_deferred("w", token).is_none());
    }
}
