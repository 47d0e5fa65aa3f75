use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageRequest {
    pub message: String,
    pub category: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Id of the received message that inspired this one.
    #[serde(default)]
    pub inspired_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TopRipplesQuery {
    #[serde(default = "default_top_limit")]
    pub limit: usize,
}

fn default_top_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct RippleChainQuery {
    /// Levels of ripples to expand. Omitted means direct children only.
    pub depth: Option<u32>,
}

// -- Status --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    /// Remote store configured and answering.
    Connected,
    /// Remote store configured but unreachable; serving from the local store.
    Fallback,
    /// No remote store configured.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: StoreStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
