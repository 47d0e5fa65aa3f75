use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use ripple_store::MessageStore;
use ripple_types::models::{
    Category, CountUpdate, MAX_MESSAGE_CHARS, Message, NewMessage, RippleFields, RippleTree,
    UnknownCategory,
};
use ripple_types::stats::RippleStats;

use crate::error::LedgerError;

/// Guarded increments attempted before giving up on a contended counter.
pub const MAX_INCREMENT_ATTEMPTS: u32 = 3;

pub const MAX_TOP_RIPPLES: usize = 100;

/// Deepest ripple tree `get_ripple_tree` will expand.
pub const MAX_TREE_DEPTH: u32 = 8;

/// Owns the ripple invariants: parent links and depths are fixed at
/// creation, and `ripple_count` only moves through the guarded increment.
pub struct RippleLedger<S> {
    store: Arc<S>,
}

impl<S: MessageStore> RippleLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create a message, optionally as a ripple of `inspired_by`.
    ///
    /// The parent's counter is bumped after the insert. A failed bump is
    /// logged and left for reconciliation; the new message is still returned.
    pub async fn create_message(
        &self,
        text: &str,
        category: &str,
        country: Option<&str>,
        inspired_by: Option<Uuid>,
    ) -> Result<Message, LedgerError> {
        let text = validate_text(text)?;
        let category: Category = category
            .parse()
            .map_err(|e: UnknownCategory| LedgerError::InvalidInput(e.to_string()))?;
        let country = country
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let new = match inspired_by {
            Some(parent_id) => {
                let parent = self
                    .store
                    .get_by_id(parent_id)
                    .await?
                    .ok_or(LedgerError::ParentNotFound(parent_id))?;
                NewMessage::ripple_of(&parent, text, category, country)
            }
            None => NewMessage::root(text, category, country),
        };

        let msg = self.store.insert(new).await?;
        info!("Created message {} ({}, depth {})", msg.id, msg.category, msg.ripple_depth);

        if let Some(parent_id) = msg.ripple_parent_id {
            if let Err(e) = self.increment_ripple_count(parent_id).await {
                warn!("Ripple count of {} not incremented for child {}: {}", parent_id, msg.id, e);
            }
        }

        Ok(msg)
    }

    /// Read-then-guarded-write, retried while other writers win the race.
    /// Returns the new count.
    pub async fn increment_ripple_count(&self, parent_id: Uuid) -> Result<u64, LedgerError> {
        for attempt in 1..=MAX_INCREMENT_ATTEMPTS {
            let current = self
                .store
                .get_by_id(parent_id)
                .await?
                .ok_or(LedgerError::NotFound(parent_id))?
                .ripple_count;

            match self.store.update_ripple_count(parent_id, current, current + 1).await? {
                CountUpdate::Applied => {
                    debug!("Ripple count of {} is now {}", parent_id, current + 1);
                    return Ok(current + 1);
                }
                CountUpdate::Stale => {
                    debug!(
                        "Ripple count of {} moved past {} (attempt {}/{})",
                        parent_id, current, attempt, MAX_INCREMENT_ATTEMPTS
                    );
                }
            }
        }

        Err(LedgerError::RippleCountRace {
            parent_id,
            attempts: MAX_INCREMENT_ATTEMPTS,
        })
    }

    /// The message and its direct ripples.
    pub async fn get_ripple_chain(&self, root_id: Uuid) -> Result<RippleTree, LedgerError> {
        self.get_ripple_tree(root_id, 1).await
    }

    /// The message and its ripples down to `max_depth` levels (capped at
    /// `MAX_TREE_DEPTH`), fetched one level at a time.
    pub async fn get_ripple_tree(
        &self,
        root_id: Uuid,
        max_depth: u32,
    ) -> Result<RippleTree, LedgerError> {
        let root = self
            .store
            .get_by_id(root_id)
            .await?
            .ok_or(LedgerError::NotFound(root_id))?;

        let mut children_of: HashMap<Uuid, Vec<Message>> = HashMap::new();
        let mut frontier = vec![root.id];

        for _ in 0..max_depth.min(MAX_TREE_DEPTH) {
            let mut next = Vec::new();
            for id in frontier {
                let children = self.store.query_by_parent(id).await?;
                next.extend(children.iter().map(|c| c.id));
                children_of.insert(id, children);
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        Ok(assemble(root, &mut children_of))
    }

    /// Most-rippled messages; never includes messages without ripples.
    pub async fn get_top_ripples(&self, limit: usize) -> Result<Vec<Message>, LedgerError> {
        let limit = limit.clamp(1, MAX_TOP_RIPPLES);
        let mut top = self.store.query_top_by_ripple_count(limit).await?;
        top.retain(|m| m.ripple_count >= 1);
        Ok(top)
    }

    pub async fn get_ripple_stats(&self) -> Result<RippleStats, LedgerError> {
        let fields = self.store.scan_ripple_fields().await?;
        Ok(summarize_ripples(&fields))
    }

    pub async fn random_message(&self) -> Result<Option<Message>, LedgerError> {
        Ok(self.store.query_random().await?)
    }
}

fn validate_text(text: &str) -> Result<String, LedgerError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(LedgerError::InvalidInput("message text is empty".into()));
    }
    let chars = text.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(LedgerError::InvalidInput(format!(
            "message is {} characters, limit is {}",
            chars, MAX_MESSAGE_CHARS
        )));
    }
    Ok(text.to_string())
}

fn assemble(message: Message, children_of: &mut HashMap<Uuid, Vec<Message>>) -> RippleTree {
    let children = children_of
        .remove(&message.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| assemble(child, children_of))
        .collect();

    RippleTree {
        total_ripples: message.ripple_count,
        message,
        children,
    }
}

pub fn summarize_ripples(fields: &[RippleFields]) -> RippleStats {
    let total_ripples: u64 = fields.iter().map(|f| f.ripple_count).sum();
    let messages_with_ripples = fields.iter().filter(|f| f.ripple_count > 0).count() as u64;
    let max_ripple_depth = fields.iter().map(|f| f.ripple_depth).max().unwrap_or(0);

    let average_ripples = if messages_with_ripples == 0 {
        0.0
    } else {
        (total_ripples as f64 / messages_with_ripples as f64 * 10.0).round() / 10.0
    };

    RippleStats {
        total_ripples,
        messages_with_ripples,
        max_ripple_depth,
        average_ripples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{DateTime, Utc};
    use ripple_store::{LocalStore, StoreResult};
    use ripple_types::models::MessageCounts;
    use ripple_types::stats::StatsSnapshot;

    fn ledger() -> RippleLedger<LocalStore> {
        RippleLedger::new(Arc::new(LocalStore::in_memory().unwrap()))
    }

    /// Local store where another writer bumps the counter right before each
    /// of our next `interfere` guarded updates.
    struct ContendedStore {
        inner: LocalStore,
        interfere: AtomicU32,
    }

    impl MessageStore for ContendedStore {
        async fn insert(&self, new: NewMessage) -> StoreResult<Message> {
            self.inner.insert(new).await
        }

        async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Message>> {
            self.inner.get_by_id(id).await
        }

        async fn update_ripple_count(
            &self,
            id: Uuid,
            expected: u64,
            new: u64,
        ) -> StoreResult<CountUpdate> {
            let interfere = self
                .interfere
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if interfere {
                if let Some(current) = self.inner.get_by_id(id).await? {
                    let count = current.ripple_count;
                    self.inner.update_ripple_count(id, count, count + 1).await?;
                }
            }
            self.inner.update_ripple_count(id, expected, new).await
        }

        async fn query_by_parent(&self, parent_id: Uuid) -> StoreResult<Vec<Message>> {
            self.inner.query_by_parent(parent_id).await
        }

        async fn query_random(&self) -> StoreResult<Option<Message>> {
            self.inner.query_random().await
        }

        async fn query_top_by_ripple_count(&self, limit: usize) -> StoreResult<Vec<Message>> {
            self.inner.query_top_by_ripple_count(limit).await
        }

        async fn aggregate_counts(&self, since: DateTime<Utc>) -> StoreResult<MessageCounts> {
            self.inner.aggregate_counts(since).await
        }

        async fn scan_ripple_fields(&self) -> StoreResult<Vec<RippleFields>> {
            self.inner.scan_ripple_fields().await
        }

        async fn save_stats_snapshot(&self, snapshot: StatsSnapshot) -> StoreResult<()> {
            self.inner.save_stats_snapshot(snapshot).await
        }
    }

    fn contended(interfere: u32) -> RippleLedger<ContendedStore> {
        RippleLedger::new(Arc::new(ContendedStore {
            inner: LocalStore::in_memory().unwrap(),
            interfere: AtomicU32::new(interfere),
        }))
    }

    #[tokio::test]
    async fn root_messages_start_clean() {
        let ledger = ledger();
        let msg = ledger
            .create_message("  thanks for the coffee  ", "kindness", Some("Indonesia"), None)
            .await
            .unwrap();

        assert_eq!(msg.text, "thanks for the coffee");
        assert_eq!(msg.ripple_depth, 0);
        assert_eq!(msg.ripple_parent_id, None);
        assert_eq!(msg.ripple_count, 0);
        assert_eq!(msg.country.as_deref(), Some("Indonesia"));
    }

    #[tokio::test]
    async fn ripple_gets_parent_depth_plus_one_and_bumps_parent() {
        let ledger = ledger();
        let root = ledger.create_message("root", "help", None, None).await.unwrap();
        let child = ledger.create_message("child", "help", None, Some(root.id)).await.unwrap();
        let grandchild = ledger
            .create_message("grandchild", "general", None, Some(child.id))
            .await
            .unwrap();

        assert_eq!(child.ripple_parent_id, Some(root.id));
        assert_eq!(child.ripple_depth, 1);
        assert_eq!(grandchild.ripple_depth, 2);

        let store = ledger.store();
        assert_eq!(store.get_by_id(root.id).await.unwrap().unwrap().ripple_count, 1);
        assert_eq!(store.get_by_id(child.id).await.unwrap().unwrap().ripple_count, 1);
        assert_eq!(store.get_by_id(grandchild.id).await.unwrap().unwrap().ripple_count, 0);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let ledger = ledger();

        for (text, category) in [("", "kindness"), ("   ", "kindness"), ("thanks", "gratitude")] {
            let err = ledger.create_message(text, category, None, None).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidInput(_)), "{text:?}/{category}: {err}");
        }

        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let err = ledger.create_message(&long, "general", None, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        assert!(ledger.store().query_random().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_parent_fails_without_insert() {
        let ledger = ledger();
        let ghost = Uuid::new_v4();

        let err = ledger
            .create_message("inspired by nothing", "kindness", None, Some(ghost))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::ParentNotFound(id) if id == ghost));
        assert_eq!(ledger.store().scan_ripple_fields().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn increment_retries_after_losing_a_race() {
        let ledger = contended(1);
        let root = ledger.create_message("root", "kindness", None, None).await.unwrap();

        // The interfering writer lands first, our retry lands second.
        assert_eq!(ledger.increment_ripple_count(root.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn exhausted_increment_still_creates_the_message() {
        let ledger = contended(u32::MAX);
        let root = ledger.create_message("root", "kindness", None, None).await.unwrap();

        let err = ledger.increment_ripple_count(root.id).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::RippleCountRace { attempts: MAX_INCREMENT_ATTEMPTS, .. }
        ));

        let child = ledger.create_message("child", "kindness", None, Some(root.id)).await.unwrap();
        assert_eq!(child.ripple_parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn increment_of_missing_message_is_not_found() {
        let err = ledger().increment_ripple_count(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn chain_of_unknown_root_is_not_found() {
        let err = ledger().get_ripple_chain(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn chain_is_one_level_and_tree_goes_deeper() {
        let ledger = ledger();
        let root = ledger.create_message("root", "kindness", None, None).await.unwrap();
        let child = ledger.create_message("child", "kindness", None, Some(root.id)).await.unwrap();
        let grandchild = ledger
            .create_message("grandchild", "kindness", None, Some(child.id))
            .await
            .unwrap();

        let chain = ledger.get_ripple_chain(root.id).await.unwrap();
        assert_eq!(chain.total_ripples, 1);
        assert_eq!(chain.child_ids(), vec![child.id]);
        assert!(chain.children[0].children.is_empty());

        let tree = ledger.get_ripple_tree(root.id, 5).await.unwrap();
        assert_eq!(tree.children[0].child_ids(), vec![grandchild.id]);

        let bare = ledger.get_ripple_tree(root.id, 0).await.unwrap();
        assert!(bare.children.is_empty());
    }

    #[tokio::test]
    async fn top_ripples_skip_unrippled_messages() {
        let ledger = ledger();
        assert!(ledger.get_top_ripples(10).await.unwrap().is_empty());

        let quiet = ledger.create_message("quiet", "general", None, None).await.unwrap();
        let loud = ledger.create_message("loud", "general", None, None).await.unwrap();
        ledger.create_message("echo", "general", None, Some(loud.id)).await.unwrap();

        let top: Vec<Uuid> =
            ledger.get_top_ripples(10).await.unwrap().iter().map(|m| m.id).collect();
        assert!(top.contains(&loud.id));
        assert!(!top.contains(&quiet.id));
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn summary_of_nothing_is_zero() {
        let stats = summarize_ripples(&[]);
        assert_eq!(stats.total_ripples, 0);
        assert_eq!(stats.messages_with_ripples, 0);
        assert_eq!(stats.max_ripple_depth, 0);
        assert_eq!(stats.average_ripples, 0.0);
    }

    #[test]
    fn summary_rounds_average_to_one_decimal() {
        let field = |ripple_count, ripple_depth| RippleFields {
            id: Uuid::new_v4(),
            ripple_count,
            ripple_depth,
        };
        let stats = summarize_ripples(&[field(2, 0), field(1, 1), field(1, 3), field(0, 4)]);

        assert_eq!(stats.total_ripples, 4);
        assert_eq!(stats.messages_with_ripples, 3);
        assert_eq!(stats.max_ripple_depth, 4);
        assert_eq!(stats.average_ripples, 1.3);
    }
}
