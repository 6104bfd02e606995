// ── Sequenced collection state ──
//
// One backend collection, its lifecycle state and the bookkeeping that
// keeps late responses from overwriting newer data. Everything lives in a
// single `watch` value so the sequence check and the install happen in one
// `send_if_modified` call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::CollectionKind;
use crate::error::CoreError;
use crate::stream::CollectionStream;

// ── Snapshot ─────────────────────────────────────────────────────────

/// Where an installed snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SnapshotSource {
    Fetch,
    Push,
}

/// An immutable copy of a collection as last received.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub value: Arc<T>,
    pub fetched_at: DateTime<Utc>,
    /// Local sequence number of the request or push event that produced it.
    pub seq: u64,
    pub source: SnapshotSource,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
            seq: self.seq,
            source: self.source,
        }
    }
}

// ── CollectionState ──────────────────────────────────────────────────

/// Lifecycle of one collection as a consumer sees it.
#[derive(Debug)]
pub enum CollectionState<T> {
    /// Nothing requested yet.
    Uninitialized,
    /// A request is outstanding. `previous` is the last good snapshot.
    Loading { previous: Option<Snapshot<T>> },
    Ready(Snapshot<T>),
    /// The most recent request failed. The last good snapshot is kept.
    Error {
        last_good: Option<Snapshot<T>>,
        reason: Arc<CoreError>,
        failed_at: DateTime<Utc>,
    },
}

impl<T> Clone for CollectionState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Uninitialized => Self::Uninitialized,
            Self::Loading { previous } => Self::Loading {
                previous: previous.clone(),
            },
            Self::Ready(snapshot) => Self::Ready(snapshot.clone()),
            Self::Error {
                last_good,
                reason,
                failed_at,
            } => Self::Error {
                last_good: last_good.clone(),
                reason: Arc::clone(reason),
                failed_at: *failed_at,
            },
        }
    }
}

/// The state's variant without its data, for status lines and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CollectionPhase {
    Uninitialized,
    Loading,
    Ready,
    Error,
}

impl<T> CollectionState<T> {
    pub fn phase(&self) -> CollectionPhase {
        match self {
            Self::Uninitialized => CollectionPhase::Uninitialized,
            Self::Loading { .. } => CollectionPhase::Loading,
            Self::Ready(_) => CollectionPhase::Ready,
            Self::Error { .. } => CollectionPhase::Error,
        }
    }

    /// The most recent successfully received snapshot, in any state.
    pub fn last_good(&self) -> Option<&Snapshot<T>> {
        match self {
            Self::Uninitialized => None,
            Self::Loading { previous } => previous.as_ref(),
            Self::Ready(snapshot) => Some(snapshot),
            Self::Error { last_good, .. } => last_good.as_ref(),
        }
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        self.last_good().map(|s| &s.value)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn error(&self) -> Option<&CoreError> {
        match self {
            Self::Error { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Showing data that the latest request failed to refresh.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Error { last_good: Some(_), .. })
    }
}

// ── Slot ─────────────────────────────────────────────────────────────

/// What the watch channel actually carries.
#[derive(Debug)]
pub(crate) struct Slot<T> {
    pub(crate) state: CollectionState<T>,
    /// Sequence number of the result currently installed.
    applied_seq: u64,
    /// Highest sequence number handed out.
    issued_seq: u64,
    /// Tickets issued but not yet settled.
    outstanding: usize,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            applied_seq: self.applied_seq,
            issued_seq: self.issued_seq,
            outstanding: self.outstanding,
        }
    }
}

impl<T> Slot<T> {
    fn next_seq(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    fn install(&mut self, seq: u64, result: Result<T, CoreError>, source: SnapshotSource) {
        self.applied_seq = seq;
        self.state = match result {
            Ok(value) => CollectionState::Ready(Snapshot {
                value: Arc::new(value),
                fetched_at: Utc::now(),
                seq,
                source,
            }),
            Err(reason) => CollectionState::Error {
                last_good: self.state.last_good().cloned(),
                reason: Arc::new(reason),
                failed_at: Utc::now(),
            },
        };
    }

    /// Leave `Loading` once nothing is outstanding. Returns whether the
    /// visible state changed.
    fn settle_idle(&mut self) -> bool {
        if self.outstanding > 0 {
            return false;
        }
        let CollectionState::Loading { previous } = &self.state else {
            return false;
        };
        self.state = match previous {
            Some(snapshot) => CollectionState::Ready(snapshot.clone()),
            None => CollectionState::Uninitialized,
        };
        true
    }
}

// ── Ticket ───────────────────────────────────────────────────────────

/// Result of settling a ticket or a push event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A newer result was already installed.
    Discarded,
}

/// An outstanding request against a collection.
///
/// Obtained from [`SyncedCollection::begin`] and settled with
/// [`SyncedCollection::complete`]. Dropping an unsettled ticket (for
/// example when a refresh is cancelled) releases it without installing
/// anything.
#[must_use = "a ticket must be completed, or dropped to abandon the request"]
pub struct Ticket<'a, T: Send + Sync + 'static> {
    collection: &'a SyncedCollection<T>,
    seq: u64,
    settled: bool,
}

impl<T: Send + Sync + 'static> Ticket<'_, T> {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<T: Send + Sync + 'static> Drop for Ticket<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            self.collection.abandon();
        }
    }
}

// ── SyncedCollection ─────────────────────────────────────────────────

/// Client-side mirror of one backend collection.
pub struct SyncedCollection<T: Send + Sync + 'static> {
    kind: CollectionKind,
    slot: watch::Sender<Slot<T>>,
}

impl<T: Send + Sync + 'static> SyncedCollection<T> {
    pub(crate) fn new(kind: CollectionKind) -> Self {
        let (slot, _) = watch::channel(Slot {
            state: CollectionState::Uninitialized,
            applied_seq: 0,
            issued_seq: 0,
            outstanding: 0,
        });
        Self { kind, slot }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CollectionState<T> {
        self.slot.borrow().state.clone()
    }

    /// Last good value, whatever the current state.
    pub fn snapshot(&self) -> Option<Arc<T>> {
        self.slot.borrow().state.value().cloned()
    }

    /// When the last good value was received.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.slot.borrow().state.last_good().map(|s| s.fetched_at)
    }

    /// Sequence number of the installed result (0 before the first).
    pub fn applied_seq(&self) -> u64 {
        self.slot.borrow().applied_seq
    }

    /// Whether any request against this collection is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.slot.borrow().outstanding > 0
    }

    pub fn subscribe(&self) -> CollectionStream<T> {
        CollectionStream::new(self.slot.subscribe())
    }

    // ── Sequencing ───────────────────────────────────────────────────

    /// Register an outgoing request and move to `Loading`.
    pub fn begin(&self) -> Ticket<'_, T> {
        let mut seq = 0;
        self.slot.send_if_modified(|slot| {
            seq = slot.next_seq();
            slot.outstanding += 1;
            let previous = match &slot.state {
                CollectionState::Loading { .. } => return false,
                other => other.last_good().cloned(),
            };
            slot.state = CollectionState::Loading { previous };
            true
        });
        Ticket {
            collection: self,
            seq,
            settled: false,
        }
    }

    /// Settle a request. The result is installed only if nothing newer
    /// has been installed since the ticket was issued.
    pub fn complete(&self, mut ticket: Ticket<'_, T>, result: Result<T, CoreError>) -> ApplyOutcome {
        ticket.settled = true;
        let seq = ticket.seq;
        let mut outcome = ApplyOutcome::Discarded;

        self.slot.send_if_modified(|slot| {
            slot.outstanding = slot.outstanding.saturating_sub(1);
            if seq <= slot.applied_seq {
                return slot.settle_idle();
            }
            slot.install(seq, result, SnapshotSource::Fetch);
            outcome = ApplyOutcome::Applied;
            true
        });

        if outcome == ApplyOutcome::Discarded {
            tracing::debug!(collection = %self.kind, seq, "discarding stale result");
        }
        outcome
    }

    /// Install a pushed value (or a server-reported failure). Push events
    /// are newer than every request issued before them.
    pub fn apply_push(&self, result: Result<T, CoreError>) -> u64 {
        let mut seq = 0;
        self.slot.send_modify(|slot| {
            seq = slot.next_seq();
            slot.install(seq, result, SnapshotSource::Push);
        });
        seq
    }

    fn abandon(&self) {
        self.slot.send_if_modified(|slot| {
            slot.outstanding = slot.outstanding.saturating_sub(1);
            slot.settle_idle()
        });
    }
}
