//! Settings resolution: suspending a request until the user decides.
//!
//! When the location settings check fails with a resolvable problem, a user
//! facing flow is launched and the request suspends. The host later reports
//! the user's decision, which resumes the request.
//!
//! Each suspended request owns its own [`PendingResolution`], registered in
//! the [`ResolutionBroker`] under a [`ResolutionId`]. Concurrent requests can
//! therefore wait for resolution independently.
//!
//! ```text
//! check_settings ──► register() ──► launcher.launch(id, token)
//!                        │
//!                        ▼
//!              PendingResolution::wait()  ◄── resolve(id, result)
//!                                         ◄── resolve_next(result)
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::GeolocationError;

/// Opaque token identifying the user flow that fixes a settings problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionToken(pub String);

/// Identifier of one suspended request.
pub type ResolutionId = u64;

/// The user's decision in a resolution flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionResult {
    Approved,
    Denied,
}

impl ResolutionResult {
    /// Host result code meaning the flow completed successfully.
    pub const RESULT_OK: i32 = -1;

    /// Maps a host activity result code to a decision.
    pub fn from_result_code(code: i32) -> Self {
        if code == Self::RESULT_OK {
            Self::Approved
        } else {
            Self::Denied
        }
    }
}

/// Launches the user-facing flow for a resolvable settings problem.
///
/// The host must eventually report the outcome through
/// [`GeolocationController::on_settings_resolution_result`](crate::GeolocationController::on_settings_resolution_result)
/// (or the id-addressed variant), exactly once per launch.
pub trait ResolutionLauncher: Send + Sync {
    fn launch(&self, id: ResolutionId, token: &ResolutionToken);
}

/// Registry of requests suspended on a resolution flow.
#[derive(Debug, Default)]
pub struct ResolutionBroker {
    next_id: AtomicU64,
    pending: Mutex<BTreeMap<ResolutionId, oneshot::Sender<ResolutionResult>>>,
}

impl ResolutionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new suspended request.
    pub fn register(self: &Arc<Self>) -> PendingResolution {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        debug!(resolution_id = id, "Awaiting settings resolution");

        PendingResolution {
            id,
            rx,
            broker: Arc::downgrade(self),
        }
    }

    /// Delivers a decision to the request registered under `id`.
    ///
    /// Returns false if no such request is waiting.
    pub fn resolve(&self, id: ResolutionId, result: ResolutionResult) -> bool {
        let sender = self.pending.lock().remove(&id);
        Self::deliver(id, sender, result)
    }

    /// Delivers a decision to the oldest waiting request.
    ///
    /// Returns false if nothing is waiting.
    pub fn resolve_next(&self, result: ResolutionResult) -> bool {
        let next = self.pending.lock().pop_first();
        match next {
            Some((id, sender)) => Self::deliver(id, Some(sender), result),
            None => {
                warn!(?result, "Settings resolution result with no request waiting");
                false
            }
        }
    }

    /// Number of requests currently waiting.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn deliver(
        id: ResolutionId,
        sender: Option<oneshot::Sender<ResolutionResult>>,
        result: ResolutionResult,
    ) -> bool {
        match sender {
            Some(sender) => {
                debug!(resolution_id = id, ?result, "Settings resolution delivered");
                sender.send(result).is_ok()
            }
            None => false,
        }
    }

    fn withdraw(&self, id: ResolutionId) {
        if self.pending.lock().remove(&id).is_some() {
            debug!(resolution_id = id, "Settings resolution wait abandoned");
        }
    }
}

/// A request suspended until the user finishes the resolution flow.
///
/// Dropping it withdraws the request from the broker.
#[derive(Debug)]
pub struct PendingResolution {
    id: ResolutionId,
    rx: oneshot::Receiver<ResolutionResult>,
    broker: Weak<ResolutionBroker>,
}

impl PendingResolution {
    pub fn id(&self) -> ResolutionId {
        self.id
    }

    /// Waits for the user's decision.
    ///
    /// Denial, or the broker going away, fails with
    /// [`GeolocationError::RequestDenied`].
    pub async fn wait(mut self) -> Result<(), GeolocationError> {
        match (&mut self.rx).await {
            Ok(ResolutionResult::Approved) => Ok(()),
            Ok(ResolutionResult::Denied) | Err(_) => Err(GeolocationError::RequestDenied),
        }
    }
}

impl Drop for PendingResolution {
    fn drop(&mut self) {
        if let Some(broker) = self.broker.upgrade() {
            broker.withdraw(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes() {
        assert_eq!(
            ResolutionResult::from_result_code(-1),
            ResolutionResult::Approved
        );
        assert_eq!(
            ResolutionResult::from_result_code(0),
            ResolutionResult::Denied
        );
        assert_eq!(
            ResolutionResult::from_result_code(1),
            ResolutionResult::Denied
        );
    }

    #[tokio::test]
    async fn test_approved_resumes() {
        let broker = Arc::new(ResolutionBroker::new());
        let pending = broker.register();

        assert!(broker.resolve(pending.id(), ResolutionResult::Approved));
        assert_eq!(pending.wait().await, Ok(()));
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_denied_fails() {
        let broker = Arc::new(ResolutionBroker::new());
        let pending = broker.register();

        assert!(broker.resolve_next(ResolutionResult::Denied));
        assert_eq!(pending.wait().await, Err(GeolocationError::RequestDenied));
    }

    #[tokio::test]
    async fn test_each_request_gets_its_own_decision() {
        let broker = Arc::new(ResolutionBroker::new());
        let first = broker.register();
        let second = broker.register();

        assert!(broker.resolve(second.id(), ResolutionResult::Approved));
        assert!(broker.resolve(first.id(), ResolutionResult::Denied));

        assert_eq!(first.wait().await, Err(GeolocationError::RequestDenied));
        assert_eq!(second.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_resolve_next_is_fifo() {
        let broker = Arc::new(ResolutionBroker::new());
        let first = broker.register();
        let second = broker.register();

        broker.resolve_next(ResolutionResult::Denied);
        broker.resolve_next(ResolutionResult::Approved);

        assert_eq!(first.wait().await, Err(GeolocationError::RequestDenied));
        assert_eq!(second.wait().await, Ok(()));
    }

    #[test]
    fn test_resolve_without_waiters() {
        let broker = Arc::new(ResolutionBroker::new());
        assert!(!broker.resolve_next(ResolutionResult::Approved));
        assert!(!broker.resolve(42, ResolutionResult::Approved));
    }

    #[test]
    fn test_drop_withdraws() {
        let broker = Arc::new(ResolutionBroker::new());
        let pending = broker.register();
        assert_eq!(broker.pending_count(), 1);

        drop(pending);
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_broker_gone_means_denied() {
        let broker = Arc::new(ResolutionBroker::new());
        let pending = broker.register();
        drop(broker);

        assert_eq!(pending.wait().await, Err(GeolocationError::RequestDenied));
    }
}
