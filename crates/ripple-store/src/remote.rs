use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::try_join_all;
use rand::Rng;
use reqwest::{Method, RequestBuilder, Response, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use ripple_types::models::{
    Category, CountUpdate, Message, MessageCounts, NewMessage, RippleFields, now_micros,
};
use ripple_types::stats::StatsSnapshot;

use crate::error::{StoreError, StoreResult};
use crate::store::MessageStore;

const MESSAGES_TABLE: &str = "gratitude_messages";
const STATS_TABLE: &str = "app_stats";

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Message store talking to a PostgREST-style endpoint
/// (`{base_url}/rest/v1/{table}`).
#[derive(Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct RippleCountPatch {
    ripple_count: u64,
}

#[derive(Serialize)]
struct StatsRow<'a> {
    id: i64,
    total_messages: u64,
    active_users: u64,
    updated_at: &'a DateTime<Utc>,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, req: RequestBuilder) -> StoreResult<Vec<T>> {
        let resp = check_status(req.send().await?).await?;
        Ok(resp.json::<Vec<T>>().await?)
    }

    /// Exact row count via `Prefer: count=exact` on a HEAD request.
    async fn count(&self, filters: &[(&str, String)]) -> StoreResult<u64> {
        let req = self
            .request(Method::HEAD, MESSAGES_TABLE)
            .query(&[("select", "id")])
            .query(filters)
            .header("Prefer", "count=exact");
        let resp = check_status(req.send().await?).await?;

        let range = resp
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Corrupt("count response without Content-Range".into()))?;

        parse_content_range_total(range)
            .ok_or_else(|| StoreError::Corrupt(format!("unparseable Content-Range '{}'", range)))
    }

    /// Cheap reachability check used by the failover probe.
    pub async fn ping(&self) -> StoreResult<()> {
        let req = self
            .request(Method::GET, MESSAGES_TABLE)
            .query(&[("select", "id"), ("limit", "1")]);
        check_status(req.send().await?).await?;
        Ok(())
    }
}

impl MessageStore for RemoteStore {
    async fn insert(&self, new: NewMessage) -> StoreResult<Message> {
        let msg = new.into_message(Uuid::new_v4(), now_micros());
        let req = self
            .request(Method::POST, MESSAGES_TABLE)
            .header("Prefer", "return=representation")
            .json(&[&msg]);

        let mut rows: Vec<Message> = self.fetch_rows(req).await?;
        debug!("Remote insert of {} returned {} rows", msg.id, rows.len());
        rows.pop()
            .ok_or_else(|| StoreError::Corrupt(format!("insert of {} returned no row", msg.id)))
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Message>> {
        let req = self
            .request(Method::GET, MESSAGES_TABLE)
            .query(&[("select", "*".to_string()), ("id", eq(id))]);
        let mut rows: Vec<Message> = self.fetch_rows(req).await?;
        Ok(rows.pop())
    }

    async fn update_ripple_count(
        &self,
        id: Uuid,
        expected: u64,
        new: u64,
    ) -> StoreResult<CountUpdate> {
        // Both filters travel with the PATCH, so the server applies the guard
        // and the write in one statement.
        let req = self
            .request(Method::PATCH, MESSAGES_TABLE)
            .query(&[("id", eq(id)), ("ripple_count", eq(expected))])
            .header("Prefer", "return=representation")
            .json(&RippleCountPatch { ripple_count: new });

        let rows: Vec<RippleFields> = self.fetch_rows(req).await?;
        Ok(if rows.is_empty() { CountUpdate::Stale } else { CountUpdate::Applied })
    }

    async fn query_by_parent(&self, parent_id: Uuid) -> StoreResult<Vec<Message>> {
        let req = self.request(Method::GET, MESSAGES_TABLE).query(&[
            ("select", "*".to_string()),
            ("ripple_parent_id", eq(parent_id)),
            ("order", "created_at.asc".to_string()),
        ]);
        self.fetch_rows(req).await
    }

    async fn query_random(&self) -> StoreResult<Option<Message>> {
        let count = self.count(&[]).await?;
        if count == 0 {
            return Ok(None);
        }
        let offset = rand::rng().random_range(0..count);

        let req = self.request(Method::GET, MESSAGES_TABLE).query(&[
            ("select", "*".to_string()),
            ("order", "created_at.asc".to_string()),
            ("offset", offset.to_string()),
            ("limit", "1".to_string()),
        ]);
        let mut rows: Vec<Message> = self.fetch_rows(req).await?;
        Ok(rows.pop())
    }

    async fn query_top_by_ripple_count(&self, limit: usize) -> StoreResult<Vec<Message>> {
        let req = self.request(Method::GET, MESSAGES_TABLE).query(&[
            ("select", "*".to_string()),
            ("order", "ripple_count.desc,created_at.asc".to_string()),
            ("limit", limit.to_string()),
        ]);
        self.fetch_rows(req).await
    }

    async fn aggregate_counts(&self, since: DateTime<Utc>) -> StoreResult<MessageCounts> {
        let since = format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Micros, true));

        let total = self.count(&[]).await?;
        let created_since = self.count(&[("created_at", since)]).await?;

        let per_category = try_join_all(Category::ALL.into_iter().map(|category| async move {
            let count = self.count(&[("category", eq(category))]).await?;
            Ok::<_, StoreError>((category, count))
        }))
        .await?
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect();

        Ok(MessageCounts {
            total,
            per_category,
            created_since,
        })
    }

    async fn scan_ripple_fields(&self) -> StoreResult<Vec<RippleFields>> {
        let req = self
            .request(Method::GET, MESSAGES_TABLE)
            .query(&[("select", "id,ripple_count,ripple_depth")]);
        self.fetch_rows(req).await
    }

    async fn save_stats_snapshot(&self, snapshot: StatsSnapshot) -> StoreResult<()> {
        let req = self
            .request(Method::POST, STATS_TABLE)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&StatsRow {
                id: 1,
                total_messages: snapshot.total_messages,
                active_users: snapshot.active_users,
                updated_at: &snapshot.updated_at,
            });
        check_status(req.send().await?).await?;
        Ok(())
    }
}

/// PostgREST equality filter value.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

async fn check_status(resp: Response) -> StoreResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(StoreError::Unavailable(format!("{}: {}", status, body)))
    } else {
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Total from a `Content-Range` value such as `0-24/3573` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn table_urls_ignore_trailing_slash() {
        let store = RemoteStore::new(RemoteConfig {
            base_url: "https://example.supabase.co/".into(),
            api_key: "anon".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(
            store.table_url(MESSAGES_TABLE),
            "https://example.supabase.co/rest/v1/gratitude_messages"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let store = RemoteStore::new(RemoteConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: "anon".into(),
            timeout: Duration::from_millis(500),
        })
        .unwrap();

        let err = store.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {err}");
        assert!(store.ping().await.unwrap_err().is_unavailable());
    }
}
