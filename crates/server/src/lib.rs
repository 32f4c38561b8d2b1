//! JSON service surface over the besitos engine.
//!
//! Callers authenticate with a shared bearer token and name the acting user
//! in the `telegram-user-id` header.

use api_types::ErrorResponse;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

pub use server::{CurrentUser, ServerState, router, run, run_with_listener, spawn_with_listener};

mod balance;
mod daily_gift;
mod inventory;
mod leaderboard;
mod missions;
mod profile;
mod server;
mod shop;

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_)
        | EngineError::AlreadyClaimedToday
        | EngineError::AlreadyClaimed
        | EngineError::OutOfStock(_)
        | EngineError::PurchaseCapExceeded(_) => StatusCode::CONFLICT,
        EngineError::InsufficientFunds { .. }
        | EngineError::InvalidAmount(_)
        | EngineError::MissionNotCompleted
        | EngineError::NotEligible(_)
        | EngineError::InvalidCatalog(_)
        | EngineError::InvalidCursor(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::ConfigurationIntegrity(_) | EngineError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn code_for_engine_error(err: &EngineError) -> &'static str {
    match err {
        EngineError::InsufficientFunds { .. } => "insufficient_funds",
        EngineError::InvalidAmount(_) => "invalid_amount",
        EngineError::AlreadyClaimedToday => "already_claimed_today",
        EngineError::MissionNotCompleted => "mission_not_completed",
        EngineError::AlreadyClaimed => "already_claimed",
        EngineError::OutOfStock(_) => "out_of_stock",
        EngineError::PurchaseCapExceeded(_) => "purchase_cap_exceeded",
        EngineError::NotEligible(_) => "not_eligible",
        EngineError::ConfigurationIntegrity(_) => "configuration_integrity",
        EngineError::Busy(_) => "busy",
        EngineError::KeyNotFound(_) => "not_found",
        EngineError::ExistingKey(_) => "conflict",
        EngineError::InvalidCatalog(_) => "invalid_catalog",
        EngineError::InvalidCursor(_) => "invalid_cursor",
        EngineError::Database(_) => "internal",
    }
}

fn body_for_engine_error(err: &EngineError) -> ErrorResponse {
    if matches!(
        err,
        EngineError::Database(_) | EngineError::ConfigurationIntegrity(_)
    ) {
        tracing::error!("engine failure: {err}");
    } else {
        tracing::debug!("request refused: {err}");
    }
    ErrorResponse {
        error: code_for_engine_error(err).to_string(),
        message: err.user_message().to_string(),
        retryable: err.is_retryable(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), body_for_engine_error(&err)),
            ServerError::Generic(err) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "bad_request".to_string(),
                    message: err,
                    retryable: false,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
