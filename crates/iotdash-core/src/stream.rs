// ── Reactive collection streams ──
//
// Subscription types for consuming collection state changes from the
// SyncStore.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::{CollectionState, Slot};

/// A subscription to one collection's lifecycle state.
///
/// Provides both point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting to a `Stream`.
pub struct CollectionStream<T: Send + Sync + 'static> {
    current: CollectionState<T>,
    receiver: watch::Receiver<Slot<T>>,
}

impl<T: Send + Sync + 'static> CollectionStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Slot<T>>) -> Self {
        let current = receiver.borrow().state.clone();
        Self { current, receiver }
    }

    /// The state captured at creation time or by the last `changed()`.
    pub fn current(&self) -> &CollectionState<T> {
        &self.current
    }

    /// The latest state (may have changed since creation).
    pub fn latest(&self) -> CollectionState<T> {
        self.receiver.borrow().state.clone()
    }

    /// Wait for the next change, returning the new state.
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<CollectionState<T>> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().state.clone();
        self.current = state.clone();
        Some(state)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    /// The first item is the state at conversion time.
    pub fn into_stream(self) -> CollectionWatchStream<T> {
        CollectionWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by the collection's `watch::Receiver`.
pub struct CollectionWatchStream<T: Send + Sync + 'static> {
    inner: WatchStream<Slot<T>>,
}

impl<T: Send + Sync + 'static> Stream for CollectionWatchStream<T> {
    type Item = CollectionState<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|slot| slot.map(|s| s.state))
    }
}
