//! RemoteStore against a small in-process stand-in for a PostgREST table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use ripple_store::{
    FailoverStore, LocalStore, MessageStore, RemoteConfig, RemoteStore, StoreBackend,
};
use ripple_types::models::{Category, CountUpdate, Message, NewMessage, now_micros};
use uuid::Uuid;

const API_KEY: &str = "test-anon-key";

type Rows = Arc<Mutex<Vec<Message>>>;

fn matches(msg: &Message, params: &HashMap<String, String>) -> bool {
    params.iter().all(|(key, value)| {
        let Some(expected) = value.strip_prefix("eq.") else {
            return true;
        };
        match key.as_str() {
            "id" => msg.id.to_string() == expected,
            "ripple_parent_id" => {
                msg.ripple_parent_id.map(|p| p.to_string()).as_deref() == Some(expected)
            },
            "ripple_count" => msg.ripple_count.to_string() == expected,
            "category" => msg.category.as_str() == expected,
            _ => true,
        }
    })
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(API_KEY)
}

async fn select(
    State(rows): State<Rows>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, HeaderMap::new(), Json(Vec::new()));
    }
    let found: Vec<Message> = rows
        .lock()
        .unwrap()
        .iter()
        .filter(|m| matches(m, &params))
        .cloned()
        .collect();

    let mut out = HeaderMap::new();
    let range = format!("*/{}", found.len());
    out.insert(header::CONTENT_RANGE, range.parse().unwrap());
    (StatusCode::OK, out, Json(found))
}

async fn insert(State(rows): State<Rows>, Json(new_rows): Json<Vec<Message>>) -> impl IntoResponse {
    rows.lock().unwrap().extend(new_rows.iter().cloned());
    (StatusCode::CREATED, Json(new_rows))
}

#[derive(serde::Deserialize)]
struct CountPatch {
    ripple_count: u64,
}

async fn patch(
    State(rows): State<Rows>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<CountPatch>,
) -> impl IntoResponse {
    let mut rows = rows.lock().unwrap();
    let updated: Vec<Message> = rows
        .iter_mut()
        .filter(|m| matches(m, &params))
        .map(|m| {
            m.ripple_count = body.ripple_count;
            m.clone()
        })
        .collect();
    Json(updated)
}

async fn serve(app: Router) -> RemoteStore {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    RemoteStore::new(RemoteConfig {
        base_url: format!("http://{}", addr),
        api_key: API_KEY.into(),
        timeout: Duration::from_secs(2),
    })
    .unwrap()
}

async fn fake_table() -> RemoteStore {
    let rows: Rows = Arc::default();
    let app = Router::new()
        .route(
            "/rest/v1/gratitude_messages",
            get(select).post(insert).patch(patch),
        )
        .with_state(rows);
    serve(app).await
}

/// Table that still answers reads but fails every write server-side.
async fn read_only_table(rows: Rows) -> RemoteStore {
    let app = Router::new()
        .route(
            "/rest/v1/gratitude_messages",
            get(select)
                .post(|| async { StatusCode::SERVICE_UNAVAILABLE })
                .patch(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        )
        .with_state(rows);
    serve(app).await
}

fn remote_message(text: &str) -> Message {
    NewMessage::root(text.into(), Category::Kindness, None)
        .into_message(Uuid::new_v4(), now_micros())
}

#[tokio::test]
async fn insert_then_read_back() {
    let store = fake_table().await;
    let root = store
        .insert(NewMessage::root("terima kasih".into(), Category::Help, None))
        .await
        .unwrap();
    let child = store
        .insert(NewMessage::ripple_of(&root, "lanjutkan".into(), Category::Help, None))
        .await
        .unwrap();

    assert_eq!(store.get_by_id(root.id).await.unwrap(), Some(root.clone()));
    let children = store.query_by_parent(root.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, child.id);
    assert_eq!(children[0].ripple_depth, 1);
}

#[tokio::test]
async fn guarded_update_reports_stale_writes() {
    let store = fake_table().await;
    let root = store
        .insert(NewMessage::root("thanks".into(), Category::Kindness, None))
        .await
        .unwrap();

    assert_eq!(store.update_ripple_count(root.id, 0, 1).await.unwrap(), CountUpdate::Applied);
    assert_eq!(store.update_ripple_count(root.id, 0, 1).await.unwrap(), CountUpdate::Stale);
    assert_eq!(store.get_by_id(root.id).await.unwrap().unwrap().ripple_count, 1);
}

#[tokio::test]
async fn random_pick_uses_exact_count() {
    let store = fake_table().await;
    assert_eq!(store.query_random().await.unwrap(), None);

    let only = store
        .insert(NewMessage::root("thanks".into(), Category::General, None))
        .await
        .unwrap();
    assert_eq!(store.query_random().await.unwrap().map(|m| m.id), Some(only.id));
}

#[tokio::test]
async fn server_errors_are_unavailable_client_errors_are_not() {
    let down = serve(Router::new().fallback(|| async { StatusCode::SERVICE_UNAVAILABLE })).await;
    assert!(down.ping().await.unwrap_err().is_unavailable());

    let rejecting = serve(Router::new().fallback(|| async { StatusCode::BAD_REQUEST })).await;
    let err = rejecting.scan_ripple_fields().await.unwrap_err();
    assert!(!err.is_unavailable(), "unexpected error: {err}");
}

#[tokio::test]
async fn ripple_of_remote_parent_lands_in_fallback_when_writes_fail() {
    let parent = remote_message("held remotely");
    let rows: Rows = Arc::new(Mutex::new(vec![parent.clone()]));
    let fallback = LocalStore::in_memory().unwrap();
    let store = FailoverStore::new(
        StoreBackend::Remote(read_only_table(rows).await),
        fallback.clone(),
    );

    let seen = store.get_by_id(parent.id).await.unwrap().unwrap();
    let child = store
        .insert(NewMessage::ripple_of(&seen, "echo".into(), Category::Kindness, None))
        .await
        .unwrap();

    assert!(store.is_degraded());
    assert_eq!(child.ripple_parent_id, Some(parent.id));
    assert_eq!(fallback.get_by_id(child.id).await.unwrap(), Some(child.clone()));

    // Both ends of the ripple are served while degraded.
    assert_eq!(store.get_by_id(parent.id).await.unwrap(), Some(parent.clone()));
    let children = store.query_by_parent(parent.id).await.unwrap();
    assert_eq!(children, vec![child]);
    assert_eq!(store.update_ripple_count(parent.id, 0, 1).await.unwrap(), CountUpdate::Applied);
}

#[tokio::test]
async fn ripple_of_unseen_remote_parent_is_still_stored() {
    let parent = remote_message("never read through the failover store");
    let store = FailoverStore::new(
        StoreBackend::Remote(read_only_table(Arc::default()).await),
        LocalStore::in_memory().unwrap(),
    );

    let child = store
        .insert(NewMessage::ripple_of(&parent, "echo".into(), Category::Help, None))
        .await
        .unwrap();
    assert_eq!(store.get_by_id(child.id).await.unwrap(), Some(child));
}
