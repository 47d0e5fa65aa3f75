use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use ripple_core::starter;
use ripple_types::api::{CreateMessageRequest, RippleChainQuery};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn create_message(
    State(state): State<AppState>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .ledger
        .create_message(
            &req.message,
            &req.category,
            req.country.as_deref(),
            req.inspired_by,
        )
        .await?;

    // Snapshot off the request path, shared by writes that land while it
    // waits; a failure only costs a stale row.
    if state.snapshots.claim() {
        let snapshot_state = state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(snapshot_state.snapshots.delay()).await;
            snapshot_state.snapshots.release();
            if let Err(e) = snapshot_state.stats.record_snapshot().await {
                warn!("Stats snapshot failed: {}", e);
            }
        });
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// A random stored message, or one of the built-in greetings while the
/// store is empty.
pub async fn random_message(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .ledger
        .random_message()
        .await?
        .unwrap_or_else(starter::random_starter);
    Ok(Json(message))
}

pub async fn get_ripples(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<RippleChainQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tree = match query.depth {
        Some(depth) => state.ledger.get_ripple_tree(message_id, depth).await?,
        None => state.ledger.get_ripple_chain(message_id).await?,
    };
    Ok(Json(tree))
}
