use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use ripple_types::models::{CountUpdate, Message, MessageCounts, NewMessage, RippleFields};
use ripple_types::stats::StatsSnapshot;

use crate::error::StoreResult;

/// Durable keyed message storage. Every backend returns identical
/// `Message` records for identical inputs.
pub trait MessageStore: Send + Sync {
    /// Persist a new message, assigning its id and creation time.
    fn insert(&self, new: NewMessage) -> impl Future<Output = StoreResult<Message>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = StoreResult<Option<Message>>> + Send;

    /// Atomically set `ripple_count` to `new` if it still equals `expected`.
    fn update_ripple_count(
        &self,
        id: Uuid,
        expected: u64,
        new: u64,
    ) -> impl Future<Output = StoreResult<CountUpdate>> + Send;

    /// Direct children, oldest first.
    fn query_by_parent(
        &self,
        parent_id: Uuid,
    ) -> impl Future<Output = StoreResult<Vec<Message>>> + Send;

    /// Uniformly random message, `None` when the store is empty.
    fn query_random(&self) -> impl Future<Output = StoreResult<Option<Message>>> + Send;

    /// Highest `ripple_count` first, ties broken by earlier `created_at`.
    fn query_top_by_ripple_count(
        &self,
        limit: usize,
    ) -> impl Future<Output = StoreResult<Vec<Message>>> + Send;

    /// Totals, per-category totals, and how many were created at or after `since`.
    fn aggregate_counts(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<MessageCounts>> + Send;

    /// Id, count and depth of every message.
    fn scan_ripple_fields(&self) -> impl Future<Output = StoreResult<Vec<RippleFields>>> + Send;

    fn save_stats_snapshot(
        &self,
        snapshot: StatsSnapshot,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}
