//! Recompute ripple counters from the actual parent links.
//!
//! Increments that lost every retry, or that were skipped while a store was
//! unreachable, leave `ripple_count` below the real number of children.
//! Reconciliation rewrites each counter to the number of messages that cite
//! it, using the same guarded update as the ledger. Running it again right
//! after changes nothing.

use futures_util::future::try_join_all;
use tracing::{info, warn};

use ripple_store::MessageStore;
use ripple_types::models::CountUpdate;
use ripple_types::stats::ReconcileReport;

use crate::error::LedgerError;
use crate::ledger::RippleLedger;

/// Child lookups in flight at once.
const RECONCILE_CONCURRENCY: usize = 8;

impl<S: MessageStore> RippleLedger<S> {
    pub async fn reconcile_ripple_counts(&self) -> Result<ReconcileReport, LedgerError> {
        let store = self.store();
        let fields = store.scan_ripple_fields().await?;

        let mut actual = Vec::with_capacity(fields.len());
        for chunk in fields.chunks(RECONCILE_CONCURRENCY) {
            let lookups = chunk.iter().map(|field| store.query_by_parent(field.id));
            let children = try_join_all(lookups).await?;
            actual.extend(chunk.iter().zip(children.iter().map(|c| c.len() as u64)));
        }

        let mut report = ReconcileReport {
            scanned: fields.len() as u64,
            corrected: 0,
        };

        for (field, children) in actual {
            if field.ripple_count == children {
                continue;
            }
            if field.ripple_count > children {
                warn!(
                    "Ripple count of {} was {} but only {} ripples exist",
                    field.id, field.ripple_count, children
                );
            }

            match store.update_ripple_count(field.id, field.ripple_count, children).await? {
                CountUpdate::Applied => report.corrected += 1,
                // A live increment got there first; the next pass picks it up.
                CountUpdate::Stale => {
                    warn!("Ripple count of {} changed during reconciliation", field.id)
                }
            }
        }

        info!(
            "Reconciled ripple counts: {} scanned, {} corrected",
            report.scanned, report.corrected
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ripple_store::LocalStore;
    use ripple_types::models::{Category, NewMessage};

    use super::*;

    #[tokio::test]
    async fn restores_counts_written_outside_the_ledger() {
        let store = Arc::new(LocalStore::in_memory().unwrap());
        let ledger = RippleLedger::new(store.clone());

        let root = ledger.create_message("root", "kindness", None, None).await.unwrap();
        // Children inserted straight into the store, as if every increment was lost.
        for text in ["a", "b", "c"] {
            store
                .insert(NewMessage::ripple_of(&root, text.into(), Category::Kindness, None))
                .await
                .unwrap();
        }
        assert_eq!(store.get_by_id(root.id).await.unwrap().unwrap().ripple_count, 0);

        let report = ledger.reconcile_ripple_counts().await.unwrap();
        assert_eq!(report, ReconcileReport { scanned: 4, corrected: 1 });
        assert_eq!(store.get_by_id(root.id).await.unwrap().unwrap().ripple_count, 3);
    }

    #[tokio::test]
    async fn second_run_changes_nothing() {
        let store = Arc::new(LocalStore::in_memory().unwrap());
        let ledger = RippleLedger::new(store.clone());

        let root = ledger.create_message("root", "help", None, None).await.unwrap();
        store
            .insert(NewMessage::ripple_of(&root, "lost".into(), Category::Help, None))
            .await
            .unwrap();
        ledger.create_message("counted", "help", None, Some(root.id)).await.unwrap();
        // over-counted by hand
        store.update_ripple_count(root.id, 1, 5).await.unwrap();

        ledger.reconcile_ripple_counts().await.unwrap();
        let first = store.scan_ripple_fields().await.unwrap();

        let report = ledger.reconcile_ripple_counts().await.unwrap();
        let second = store.scan_ripple_fields().await.unwrap();

        assert_eq!(report.corrected, 0);
        assert_eq!(first, second);
        assert_eq!(store.get_by_id(root.id).await.unwrap().unwrap().ripple_count, 2);
    }

    #[tokio::test]
    async fn empty_store_reconciles_to_nothing() {
        let ledger = RippleLedger::new(Arc::new(LocalStore::in_memory().unwrap()));
        assert_eq!(ledger.reconcile_ripple_counts().await.unwrap(), ReconcileReport::default());
    }
}
