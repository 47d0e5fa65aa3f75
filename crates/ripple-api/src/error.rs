use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use ripple_core::LedgerError;
use ripple_store::StoreError;
use ripple_types::api::ErrorResponse;

/// Handler error: a status plus a short message for the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn internal(e: &dyn std::fmt::Display) -> Self {
        error!("Request failed: {}", e);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status = match &e {
            LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LedgerError::ParentNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => return Self::internal(&e),
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::internal(&e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}
