//! The caller-facing stream of a watch.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::debug;

use super::registry::WatchMessage;
use crate::error::GeolocationError;
use crate::provider::BoxFuture;
use crate::sample::LocationSample;

/// Item yielded by a [`WatchStream`].
pub type WatchItem = Result<Vec<LocationSample>, GeolocationError>;

/// A continuous location subscription.
///
/// Lazy: the precondition checks and the provider subscription only start
/// on the first poll, and run inside the polling task.
///
/// The stream yields batches of samples until the watch is cleared. It ends
/// after yielding a failure, including [`GeolocationError::LocationTimeout`]
/// when nothing was yielded within the request timeout. Dropping the stream
/// clears the watch.
pub struct WatchStream {
    watch_id: String,
    timeout: Duration,
    setup: Option<BoxFuture<'static, ()>>,
    rx: mpsc::UnboundedReceiver<WatchMessage>,
    deadline: Option<Pin<Box<Sleep>>>,
    received_any: bool,
    finished: bool,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchStream {
    pub(crate) fn new(
        watch_id: String,
        timeout: Duration,
        setup: BoxFuture<'static, ()>,
        rx: mpsc::UnboundedReceiver<WatchMessage>,
        on_close: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            watch_id,
            timeout,
            setup: Some(setup),
            rx,
            deadline: None,
            received_any: false,
            finished: false,
            on_close: Some(on_close),
        }
    }

    pub fn watch_id(&self) -> &str {
        &self.watch_id
    }

    fn finish(&mut self) {
        self.finished = true;
        self.setup = None;
        self.deadline = None;
        self.rx.close();
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl Stream for WatchStream {
    type Item = WatchItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if !this.received_any && this.deadline.is_none() {
            this.deadline = Some(Box::pin(tokio::time::sleep(this.timeout)));
        }

        if let Some(setup) = this.setup.as_mut() {
            if setup.as_mut().poll(cx).is_ready() {
                this.setup = None;
            }
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(WatchMessage::Locations(batch))) => {
                this.received_any = true;
                this.deadline = None;
                return Poll::Ready(Some(Ok(batch)));
            }
            Poll::Ready(Some(WatchMessage::Failure(error))) => {
                this.finish();
                return Poll::Ready(Some(Err(error)));
            }
            Poll::Ready(Some(WatchMessage::Closed)) | Poll::Ready(None) => {
                this.finish();
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        if let Some(deadline) = this.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                debug!(watch_id = %this.watch_id, "Watch timed out before first update");
                this.finish();
                return Poll::Ready(Some(Err(GeolocationError::LocationTimeout)));
            }
        }

        Poll::Pending
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl std::fmt::Debug for WatchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStream")
            .field("watch_id", &self.watch_id)
            .field("timeout", &self.timeout)
            .field("received_any", &self.received_any)
            .field("finished", &self.finished)
            .finish()
    }
}
