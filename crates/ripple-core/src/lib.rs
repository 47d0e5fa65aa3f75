pub mod error;
pub mod ledger;
pub mod reconcile;
pub mod starter;
pub mod stats;

pub use error::LedgerError;
pub use ledger::RippleLedger;
pub use stats::StatsAggregator;
