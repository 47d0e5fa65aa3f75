use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use ripple_types::api::TopRipplesQuery;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn top_ripples(
    State(state): State<AppState>,
    Query(query): Query<TopRipplesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.ledger.get_top_ripples(query.limit).await?;
    Ok(Json(messages))
}

pub async fn ripple_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.ledger.get_ripple_stats().await?))
}

/// Recount every message's children and repair drifted counters.
pub async fn reconcile(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.ledger.reconcile_ripple_counts().await?))
}
