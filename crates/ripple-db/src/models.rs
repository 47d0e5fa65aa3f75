/// Database row types, mapped directly from SQLite rows.
/// Converted into `ripple_types::models::Message` at the crate boundary.
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use ripple_types::models::{Category, Message};
use uuid::Uuid;

pub struct MessageRow {
    pub id: String,
    pub message: String,
    pub category: String,
    pub category_label: String,
    pub country: Option<String>,
    pub created_at: String,
    pub ripple_parent_id: Option<String>,
    pub ripple_depth: i64,
    pub ripple_count: i64,
    pub inspired_by_message_id: Option<String>,
}

pub struct RippleFieldsRow {
    pub id: String,
    pub ripple_count: i64,
    pub ripple_depth: i64,
}

pub struct StatsSnapshotRow {
    pub total_messages: i64,
    pub active_users: i64,
    pub updated_at: String,
}

/// Timestamps are stored as RFC 3339 in UTC with microseconds, so text
/// ordering matches time ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; treat it as UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse::<Uuid>().map_err(|e| anyhow!("Corrupt id '{}': {}", raw, e))
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let category: Category = row
            .category
            .parse()
            .with_context(|| format!("message {}", row.id))?;

        Ok(Message {
            id: parse_id(&row.id)?,
            text: row.message,
            category,
            category_label: row.category_label,
            country: row.country,
            created_at: parse_timestamp(&row.created_at)?,
            ripple_parent_id: row.ripple_parent_id.as_deref().map(parse_id).transpose()?,
            ripple_depth: u32::try_from(row.ripple_depth)
                .map_err(|_| anyhow!("Corrupt ripple_depth {} on {}", row.ripple_depth, row.id))?,
            ripple_count: u64::try_from(row.ripple_count)
                .map_err(|_| anyhow!("Corrupt ripple_count {} on {}", row.ripple_count, row.id))?,
            inspired_by_message_id: row
                .inspired_by_message_id
                .as_deref()
                .map(parse_id)
                .transpose()?,
        })
    }
}
