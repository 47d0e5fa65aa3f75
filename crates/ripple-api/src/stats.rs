use axum::{Json, extract::State, response::IntoResponse};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn app_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.stats.get_app_stats().await?))
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.status())
}
