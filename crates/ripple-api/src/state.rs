use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ripple_core::{RippleLedger, StatsAggregator};
use ripple_store::FailoverStore;

/// Wait between the first write that asks for a stats snapshot and the
/// snapshot itself. Writes arriving in between share it.
const SNAPSHOT_DELAY: Duration = Duration::from_secs(2);

pub type AppState = Arc<AppStateInner>;

/// Everything the handlers need, built once at startup around a single store.
pub struct AppStateInner {
    pub store: Arc<FailoverStore>,
    pub ledger: RippleLedger<FailoverStore>,
    pub stats: StatsAggregator<FailoverStore>,
    pub snapshots: SnapshotSchedule,
}

impl AppStateInner {
    pub fn new(store: Arc<FailoverStore>) -> AppState {
        Self::with_snapshot_delay(store, SNAPSHOT_DELAY)
    }

    pub fn with_snapshot_delay(store: Arc<FailoverStore>, delay: Duration) -> AppState {
        Arc::new(Self {
            ledger: RippleLedger::new(store.clone()),
            stats: StatsAggregator::new(store.clone()),
            snapshots: SnapshotSchedule::new(delay),
            store,
        })
    }
}

/// At most one stats snapshot is scheduled at a time.
pub struct SnapshotSchedule {
    pending: AtomicBool,
    delay: Duration,
}

impl SnapshotSchedule {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: AtomicBool::new(false),
            delay,
        }
    }

    /// True if the caller should schedule the snapshot; false if one is
    /// already waiting.
    pub fn claim(&self) -> bool {
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// Called right before the snapshot reads its counts, so later writes
    /// schedule a new one.
    pub fn release(&self) {
        self.pending.store(false, Ordering::Release);
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
