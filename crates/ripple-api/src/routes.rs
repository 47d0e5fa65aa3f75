use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;
use crate::{messages, ripples, stats};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages", post(messages::create_message))
        .route("/messages/random", get(messages::random_message))
        .route("/messages/{message_id}/ripples", get(messages::get_ripples))
        .route("/ripples/top", get(ripples::top_ripples))
        .route("/ripples/stats", get(ripples::ripple_stats))
        .route("/ripples/reconcile", post(ripples::reconcile))
        .route("/stats", get(stats::app_stats))
        .route("/status", get(stats::status))
        .with_state(state)
}
