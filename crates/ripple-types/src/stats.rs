use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Category;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RippleStats {
    pub total_ripples: u64,
    pub messages_with_ripples: u64,
    pub max_ripple_depth: u32,
    /// `total_ripples / messages_with_ripples`, one decimal, 0 when nothing rippled.
    pub average_ripples: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStats {
    pub total_messages: u64,
    pub today_messages: u64,
    /// Heuristic, see `ripple_core::stats::estimate_active_users`.
    pub active_users: u64,
    pub category_stats: BTreeMap<Category, u64>,
}

/// Single-row summary kept in `app_stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_messages: u64,
    pub active_users: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub scanned: u64,
    pub corrected: u64,
}
