//! Watch subscriptions.
//!
//! A watch is a caller-identified continuous subscription. Its lifecycle:
//!
//! ```text
//! add_watch ──► WatchStream (lazy)
//!                  │ first poll
//!                  ▼
//!            preconditions ──fail──► Failure item, end
//!                  │
//!                  ▼
//!        provider subscription ──► register ──deferred──► tear down, end
//!                  │
//!                  ▼
//!               Active ──clear_watch / drop / timeout──► tear down
//! ```
//!
//! `clear_watch` on an id with no active registration records the id in the
//! deferred-cancellation set. A registration arriving later, or a provider
//! callback observing the entry, consumes it and tears the subscription down
//! without emitting.

mod registry;
mod stream;

pub use registry::{RegisterOutcome, WatchMessage, WatchRegistration, WatchRegistry, WatchToken};
pub use stream::{WatchItem, WatchStream};
