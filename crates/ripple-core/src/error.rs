use thiserror::Error;
use uuid::Uuid;

use ripple_store::StoreError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("inspiring message {0} not found")]
    ParentNotFound(Uuid),

    #[error("message {0} not found")]
    NotFound(Uuid),

    /// Every guarded update lost to a concurrent writer. The count stays
    /// low until the next reconciliation.
    #[error("ripple count of {parent_id} still contended after {attempts} attempts")]
    RippleCountRace { parent_id: Uuid, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
