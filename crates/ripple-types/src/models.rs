use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest message body accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Kindness,
    Hardwork,
    Friendship,
    Help,
    Inspiration,
    General,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Kindness,
        Category::Hardwork,
        Category::Friendship,
        Category::Help,
        Category::Inspiration,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kindness => "kindness",
            Self::Hardwork => "hardwork",
            Self::Friendship => "friendship",
            Self::Help => "help",
            Self::Inspiration => "inspiration",
            Self::General => "general",
        }
    }

    /// Label persisted next to the category in `category_label`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Kindness => "Atas Kebaikan Hati",
            Self::Hardwork => "Atas Kerja Keras",
            Self::Friendship => "Atas Persahabatan",
            Self::Help => "Atas Bantuan",
            Self::Inspiration => "Atas Inspirasi",
            Self::General => "Secara Umum",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// A gratitude message in the persisted record shape shared by every
/// store backend. Only `ripple_count` changes after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    #[serde(rename = "message")]
    pub text: String,
    pub category: Category,
    pub category_label: String,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ripple_parent_id: Option<Uuid>,
    pub ripple_depth: u32,
    pub ripple_count: u64,
    pub inspired_by_message_id: Option<Uuid>,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.ripple_parent_id.is_none()
    }
}

/// What the ledger hands to a store; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub text: String,
    pub category: Category,
    pub country: Option<String>,
    pub ripple_parent_id: Option<Uuid>,
    pub ripple_depth: u32,
}

impl NewMessage {
    pub fn root(text: String, category: Category, country: Option<String>) -> Self {
        Self {
            text,
            category,
            country,
            ripple_parent_id: None,
            ripple_depth: 0,
        }
    }

    pub fn ripple_of(
        parent: &Message,
        text: String,
        category: Category,
        country: Option<String>,
    ) -> Self {
        Self {
            text,
            category,
            country,
            ripple_parent_id: Some(parent.id),
            ripple_depth: parent.ripple_depth + 1,
        }
    }

    /// Build the stored record. Both backends go through here so the shape
    /// they return is identical.
    pub fn into_message(self, id: Uuid, created_at: DateTime<Utc>) -> Message {
        Message {
            id,
            text: self.text,
            category: self.category,
            category_label: self.category.label().to_string(),
            country: self.country,
            created_at,
            ripple_parent_id: self.ripple_parent_id,
            ripple_depth: self.ripple_depth,
            ripple_count: 0,
            inspired_by_message_id: self.ripple_parent_id,
        }
    }
}

/// Current time at the microsecond precision every backend can store.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Ripple columns of a message, without the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RippleFields {
    pub id: Uuid,
    pub ripple_count: u64,
    pub ripple_depth: u32,
}

/// Raw counts a store can produce in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCounts {
    pub total: u64,
    pub per_category: BTreeMap<Category, u64>,
    pub created_since: u64,
}

/// Outcome of a guarded ripple count update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountUpdate {
    Applied,
    /// The stored count no longer matched the expected value, or the row is gone.
    Stale,
}

/// A message with its ripples. `total_ripples` is the stored counter, which
/// can briefly trail `children.len()` while an increment is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RippleTree {
    pub message: Message,
    pub children: Vec<RippleTree>,
    pub total_ripples: u64,
}

impl RippleTree {
    pub fn leaf(message: Message) -> Self {
        let total_ripples = message.ripple_count;
        Self {
            message,
            children: Vec::new(),
            total_ripples,
        }
    }

    pub fn child_ids(&self) -> Vec<Uuid> {
        self.children.iter().map(|c| c.message.id).collect()
    }
}
