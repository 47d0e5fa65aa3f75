use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use ripple_types::api::{ConnectionStatus, StoreStatus};
use ripple_types::models::{CountUpdate, Message, MessageCounts, NewMessage, RippleFields};
use ripple_types::stats::StatsSnapshot;

use crate::error::{StoreError, StoreResult};
use crate::local::LocalStore;
use crate::remote::RemoteStore;
use crate::store::MessageStore;

/// The configured primary store, chosen once at startup.
#[derive(Clone)]
pub enum StoreBackend {
    Remote(RemoteStore),
    Local(LocalStore),
}

impl StoreBackend {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    pub async fn ping(&self) -> StoreResult<()> {
        match self {
            Self::Remote(store) => store.ping().await,
            Self::Local(_) => Ok(()),
        }
    }
}

impl MessageStore for StoreBackend {
    async fn insert(&self, new: NewMessage) -> StoreResult<Message> {
        match self {
            Self::Remote(store) => store.insert(new).await,
            Self::Local(store) => store.insert(new).await,
        }
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Message>> {
        match self {
            Self::Remote(store) => store.get_by_id(id).await,
            Self::Local(store) => store.get_by_id(id).await,
        }
    }

    async fn update_ripple_count(
        &self,
        id: Uuid,
        expected: u64,
        new: u64,
    ) -> StoreResult<CountUpdate> {
        match self {
            Self::Remote(store) => store.update_ripple_count(id, expected, new).await,
            Self::Local(store) => store.update_ripple_count(id, expected, new).await,
        }
    }

    async fn query_by_parent(&self, parent_id: Uuid) -> StoreResult<Vec<Message>> {
        match self {
            Self::Remote(store) => store.query_by_parent(parent_id).await,
            Self::Local(store) => store.query_by_parent(parent_id).await,
        }
    }

    async fn query_random(&self) -> StoreResult<Option<Message>> {
        match self {
            Self::Remote(store) => store.query_random().await,
            Self::Local(store) => store.query_random().await,
        }
    }

    async fn query_top_by_ripple_count(&self, limit: usize) -> StoreResult<Vec<Message>> {
        match self {
            Self::Remote(store) => store.query_top_by_ripple_count(limit).await,
            Self::Local(store) => store.query_top_by_ripple_count(limit).await,
        }
    }

    async fn aggregate_counts(&self, since: DateTime<Utc>) -> StoreResult<MessageCounts> {
        match self {
            Self::Remote(store) => store.aggregate_counts(since).await,
            Self::Local(store) => store.aggregate_counts(since).await,
        }
    }

    async fn scan_ripple_fields(&self) -> StoreResult<Vec<RippleFields>> {
        match self {
            Self::Remote(store) => store.scan_ripple_fields().await,
            Self::Local(store) => store.scan_ripple_fields().await,
        }
    }

    async fn save_stats_snapshot(&self, snapshot: StatsSnapshot) -> StoreResult<()> {
        match self {
            Self::Remote(store) => store.save_stats_snapshot(snapshot).await,
            Self::Local(store) => store.save_stats_snapshot(snapshot).await,
        }
    }
}

/// Primary store with a local fallback.
///
/// An `Unavailable` error from the primary flips the store into degraded
/// mode and the same call is re-issued against the fallback, so callers never
/// see the outage. While degraded, calls skip the primary entirely until
/// `probe` finds it reachable again. Writes made while degraded stay in the
/// fallback.
///
/// Messages the primary returns are copied into the fallback, so what was
/// already seen keeps being served during an outage.
pub struct FailoverStore {
    primary: StoreBackend,
    fallback: LocalStore,
    degraded: AtomicBool,
    copy_to_fallback: bool,
}

/// Try the primary unless degraded; on `Unavailable` degrade and use the
/// fallback. With `copy`, a successful primary result is first handed to the
/// given copy step.
macro_rules! with_failover {
    ($self:ident, $op:literal, |$store:ident| $call:expr $(, copy |$found:ident| $copy:expr)?) => {{
        if !$self.is_degraded() {
            let result = {
                let $store = &$self.primary;
                $call.await
            };
            match result {
                Err(StoreError::Unavailable(reason)) => $self.degrade($op, &reason),
                other => {
                    $(
                        if let Ok($found) = &other {
                            $copy.await;
                        }
                    )?
                    return other;
                }
            }
        }
        let $store = &$self.fallback;
        $call.await
    }};
}

impl FailoverStore {
    pub fn new(primary: StoreBackend, fallback: LocalStore) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
            copy_to_fallback: true,
        }
    }

    /// No remote configured: the local store is both primary and fallback.
    pub fn local_only(store: LocalStore) -> Self {
        Self {
            copy_to_fallback: false,
            ..Self::new(StoreBackend::Local(store.clone()), store)
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Route everything to the fallback until the next successful probe.
    pub fn mark_unavailable(&self) {
        self.degrade("manual", "marked unavailable");
    }

    fn degrade(&self, op: &str, reason: &str) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!(
                "Primary store unavailable during {} ({}), switching to local fallback",
                op, reason
            );
        }
    }

    async fn copy_messages(&self, messages: &[Message]) {
        if !self.copy_to_fallback || messages.is_empty() {
            return;
        }
        if let Err(e) = self.fallback.store_copies(messages.to_vec()).await {
            warn!("Could not copy {} messages to local fallback: {}", messages.len(), e);
        }
    }

    async fn copy_count(&self, id: Uuid, count: u64, outcome: CountUpdate) {
        if !self.copy_to_fallback || outcome == CountUpdate::Stale {
            return;
        }
        if let Err(e) = self.fallback.copy_ripple_count(id, count).await {
            warn!("Could not copy ripple count of {} to local fallback: {}", id, e);
        }
    }

    /// Ping the primary; clears degraded mode when it answers.
    pub async fn probe(&self) -> bool {
        match self.primary.ping().await {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::AcqRel) {
                    info!("Primary store reachable again, leaving fallback mode");
                }
                true
            }
            Err(e) => {
                self.degrade("probe", &e.to_string());
                false
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        if !self.primary.is_remote() {
            return ConnectionStatus {
                status: StoreStatus::Local,
                message: "Using local storage".into(),
            };
        }
        if self.is_degraded() {
            ConnectionStatus {
                status: StoreStatus::Fallback,
                message: "Remote database unreachable, using local storage".into(),
            }
        } else {
            ConnectionStatus {
                status: StoreStatus::Connected,
                message: "Connected to remote database".into(),
            }
        }
    }
}

impl MessageStore for FailoverStore {
    async fn insert(&self, new: NewMessage) -> StoreResult<Message> {
        with_failover!(self, "insert", |store| store.insert(new.clone()),
            copy |msg| self.copy_messages(std::slice::from_ref(msg)))
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Message>> {
        with_failover!(self, "get_by_id", |store| store.get_by_id(id),
            copy |found| self.copy_messages(found.as_slice()))
    }

    async fn update_ripple_count(
        &self,
        id: Uuid,
        expected: u64,
        new: u64,
    ) -> StoreResult<CountUpdate> {
        with_failover!(self, "update_ripple_count", |store| store
            .update_ripple_count(id, expected, new),
            copy |outcome| self.copy_count(id, new, *outcome))
    }

    async fn query_by_parent(&self, parent_id: Uuid) -> StoreResult<Vec<Message>> {
        with_failover!(self, "query_by_parent", |store| store.query_by_parent(parent_id),
            copy |children| self.copy_messages(children))
    }

    async fn query_random(&self) -> StoreResult<Option<Message>> {
        with_failover!(self, "query_random", |store| store.query_random(),
            copy |found| self.copy_messages(found.as_slice()))
    }

    async fn query_top_by_ripple_count(&self, limit: usize) -> StoreResult<Vec<Message>> {
        with_failover!(self, "query_top_by_ripple_count", |store| store
            .query_top_by_ripple_count(limit),
            copy |top| self.copy_messages(top))
    }

    async fn aggregate_counts(&self, since: DateTime<Utc>) -> StoreResult<MessageCounts> {
        with_failover!(self, "aggregate_counts", |store| store.aggregate_counts(since))
    }

    async fn scan_ripple_fields(&self) -> StoreResult<Vec<RippleFields>> {
        with_failover!(self, "scan_ripple_fields", |store| store.scan_ripple_fields())
    }

    async fn save_stats_snapshot(&self, snapshot: StatsSnapshot) -> StoreResult<()> {
        with_failover!(self, "save_stats_snapshot", |store| store
            .save_stats_snapshot(snapshot.clone()))
    }
}
