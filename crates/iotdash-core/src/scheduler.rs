// ── Poll scheduler ──
//
// One background task per collection, each on its own interval. A tick is
// skipped while a refresh for that collection is still outstanding, and
// polling can be suspended per collection while the push channel carries it.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::PollIntervals;
use crate::store::CollectionKind;

/// What the scheduler drives.
pub trait RefreshTarget: Send + Sync + 'static {
    /// Fetch `kind` and install the result. Failures are recorded in the
    /// store, not returned.
    fn refresh(&self, kind: CollectionKind) -> BoxFuture<'static, ()>;

    /// Whether a request for `kind` is currently outstanding.
    fn is_in_flight(&self, kind: CollectionKind) -> bool;
}

struct Lane {
    kind: CollectionKind,
    period: Option<Duration>,
    suspended: watch::Sender<bool>,
    kick: Arc<Notify>,
}

/// Periodic refresh for every collection.
///
/// Created stopped. [`start`](Self::start) spawns one task per collection;
/// [`stop`](Self::stop) cancels and joins them.
pub struct PollScheduler {
    target: Arc<dyn RefreshTarget>,
    lanes: Vec<Lane>,
    cancel: Mutex<Option<CancellationToken>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(intervals: &PollIntervals, target: Arc<dyn RefreshTarget>) -> Self {
        let lanes = CollectionKind::ALL
            .into_iter()
            .map(|kind| {
                let (suspended, _) = watch::channel(false);
                Lane {
                    kind,
                    period: intervals.period(kind),
                    suspended,
                    kick: Arc::new(Notify::new()),
                }
            })
            .collect();

        Self {
            target,
            lanes,
            cancel: Mutex::new(None),
            task_handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the per-collection tasks under a child of `parent`.
    /// Does nothing if already running.
    pub async fn start(&self, parent: &CancellationToken) {
        let mut cancel_slot = self.cancel.lock().await;
        if cancel_slot.is_some() {
            return;
        }
        let cancel = parent.child_token();

        let mut handles = self.task_handles.lock().await;
        for lane in &self.lanes {
            let task = lane_task(
                lane.kind,
                lane.period,
                Arc::clone(&self.target),
                lane.suspended.subscribe(),
                Arc::clone(&lane.kick),
                cancel.clone(),
            );
            handles.push(tokio::spawn(task));
        }

        debug!(lanes = handles.len(), "poll scheduler started");
        *cancel_slot = Some(cancel);
    }

    /// Cancel every task and wait for them to exit.
    pub async fn stop(&self) {
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }
        let mut handles = self.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.cancel.lock().await.is_some()
    }

    /// Stop periodic fetching of `kind` until [`resume`](Self::resume).
    pub fn suspend(&self, kind: CollectionKind) {
        if let Some(lane) = self.lane(kind) {
            lane.suspended.send_if_modified(|s| !std::mem::replace(s, true));
        }
    }

    /// Restart periodic fetching of `kind`. The lane refreshes at once and
    /// then every period.
    pub fn resume(&self, kind: CollectionKind) {
        if let Some(lane) = self.lane(kind) {
            lane.suspended.send_if_modified(|s| std::mem::replace(s, false));
        }
    }

    pub fn is_suspended(&self, kind: CollectionKind) -> bool {
        self.lane(kind).is_some_and(|l| *l.suspended.borrow())
    }

    /// Refresh `kind` now and restart its interval. Works while suspended
    /// and for collections with polling disabled.
    pub fn refresh_now(&self, kind: CollectionKind) {
        if let Some(lane) = self.lane(kind) {
            lane.kick.notify_one();
        }
    }

    fn lane(&self, kind: CollectionKind) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.kind == kind)
    }
}

// ── Lane task ────────────────────────────────────────────────────────

async fn lane_task(
    kind: CollectionKind,
    period: Option<Duration>,
    target: Arc<dyn RefreshTarget>,
    mut suspended: watch::Receiver<bool>,
    kick: Arc<Notify>,
    cancel: CancellationToken,
) {
    // A disabled lane still answers refresh_now
    let mut interval = tokio::time::interval(period.unwrap_or(Duration::from_secs(3600)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = kick.notified() => {
                interval.reset();
                run_refresh(kind, &*target, &cancel).await;
            }
            changed = suspended.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_suspended = *suspended.borrow_and_update();
                debug!(collection = %kind, suspended = now_suspended, "polling toggled");
                if !now_suspended && period.is_some() {
                    interval.reset();
                    if target.is_in_flight(kind) {
                        trace!(collection = %kind, "refresh already in flight");
                    } else {
                        run_refresh(kind, &*target, &cancel).await;
                    }
                }
            }
            _ = interval.tick(), if period.is_some() => {
                if *suspended.borrow() {
                    continue;
                }
                if target.is_in_flight(kind) {
                    trace!(collection = %kind, "skipping tick, refresh in flight");
                    continue;
                }
                run_refresh(kind, &*target, &cancel).await;
            }
        }
    }

    trace!(collection = %kind, "poll lane exiting");
}

async fn run_refresh(kind: CollectionKind, target: &dyn RefreshTarget, cancel: &CancellationToken) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        () = target.refresh(kind) => {}
    }
}
