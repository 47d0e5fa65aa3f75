use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::error;
use uuid::Uuid;

use ripple_db::Database;
use ripple_types::models::{
    CountUpdate, Message, MessageCounts, NewMessage, RippleFields, now_micros,
};
use ripple_types::stats::StatsSnapshot;

use crate::error::{StoreError, StoreResult};
use crate::store::MessageStore;

/// Message store backed by the on-device SQLite database.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Database>,
}

impl LocalStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self::new(Arc::new(Database::open(path)?)))
    }

    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self::new(Arc::new(Database::open_in_memory()?)))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Keep copies of messages read from or written to another store.
    pub async fn store_copies(&self, messages: Vec<Message>) -> StoreResult<()> {
        self.blocking(move |db| db.upsert_messages(&messages)).await
    }

    pub async fn copy_ripple_count(&self, id: Uuid, count: u64) -> StoreResult<()> {
        self.blocking(move |db| db.set_ripple_count(&id, count)).await
    }

    /// Run a blocking database call off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                StoreError::Other(anyhow!("local store task failed: {}", e))
            })?
            .map_err(StoreError::from)
    }
}

impl MessageStore for LocalStore {
    async fn insert(&self, new: NewMessage) -> StoreResult<Message> {
        let msg = new.into_message(Uuid::new_v4(), now_micros());
        let record = msg.clone();
        self.blocking(move |db| db.insert_message(&record)).await?;
        Ok(msg)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Message>> {
        self.blocking(move |db| db.get_message(&id)).await
    }

    async fn update_ripple_count(
        &self,
        id: Uuid,
        expected: u64,
        new: u64,
    ) -> StoreResult<CountUpdate> {
        self.blocking(move |db| db.update_ripple_count(&id, expected, new)).await
    }

    async fn query_by_parent(&self, parent_id: Uuid) -> StoreResult<Vec<Message>> {
        self.blocking(move |db| db.get_children(&parent_id)).await
    }

    async fn query_random(&self) -> StoreResult<Option<Message>> {
        self.blocking(|db| {
            let count = db.count_messages()?;
            if count == 0 {
                return Ok(None);
            }
            let offset = rand::rng().random_range(0..count);
            db.get_message_at(offset)
        })
        .await
    }

    async fn query_top_by_ripple_count(&self, limit: usize) -> StoreResult<Vec<Message>> {
        self.blocking(move |db| db.get_top_by_ripple_count(limit)).await
    }

    async fn aggregate_counts(&self, since: DateTime<Utc>) -> StoreResult<MessageCounts> {
        self.blocking(move |db| db.aggregate_counts(&since)).await
    }

    async fn scan_ripple_fields(&self) -> StoreResult<Vec<RippleFields>> {
        self.blocking(|db| db.get_ripple_fields()).await
    }

    async fn save_stats_snapshot(&self, snapshot: StatsSnapshot) -> StoreResult<()> {
        self.blocking(move |db| db.upsert_stats_snapshot(&snapshot)).await
    }
}
