use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use rand::Rng;
use tracing::debug;

use ripple_store::{MessageStore, StoreResult};
use ripple_types::models::Category;
use ripple_types::stats::{AppStats, StatsSnapshot};

/// Upper bound (exclusive) of the random part of the active user estimate.
const ACTIVE_USER_JITTER: u64 = 20;

/// Read-only counts over the message store. Shares the store with the
/// ledger but none of its rules.
pub struct StatsAggregator<S> {
    store: Arc<S>,
}

impl<S: MessageStore> StatsAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get_app_stats(&self) -> StoreResult<AppStats> {
        let counts = self.store.aggregate_counts(start_of_day(Utc::now())).await?;

        let category_stats = Category::ALL
            .into_iter()
            .map(|c| (c, counts.per_category.get(&c).copied().unwrap_or(0)))
            .collect();

        let active_users = estimate_active_users(counts.total, &mut rand::rng());

        Ok(AppStats {
            total_messages: counts.total,
            today_messages: counts.created_since,
            active_users,
            category_stats,
        })
    }

    /// Persist the current totals to the `app_stats` row.
    pub async fn record_snapshot(&self) -> StoreResult<StatsSnapshot> {
        let stats = self.get_app_stats().await?;
        let snapshot = StatsSnapshot {
            total_messages: stats.total_messages,
            active_users: stats.active_users,
            updated_at: Utc::now(),
        };
        self.store.save_stats_snapshot(snapshot.clone()).await?;
        debug!("Recorded stats snapshot: {} messages", snapshot.total_messages);
        Ok(snapshot)
    }
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// No sessions are tracked, so this is a guess: a tenth of all messages
/// plus up to 19 on top.
pub fn estimate_active_users(total_messages: u64, rng: &mut impl Rng) -> u64 {
    total_messages / 10 + rng.random_range(0..ACTIVE_USER_JITTER)
}
