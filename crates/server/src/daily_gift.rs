//! Daily gift endpoints.

use api_types::daily_gift::{DailyGiftClaimed, DailyGiftStatus};
use axum::{Json, extract::State, http::StatusCode};

use crate::{CurrentUser, ServerError, server::ServerState};

pub async fn claim(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
) -> Result<(StatusCode, Json<DailyGiftClaimed>), ServerError> {
    let outcome = state.engine.claim_daily_gift(user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(DailyGiftClaimed {
            besitos_granted: outcome.besitos_granted,
            new_balance: outcome.new_balance,
            claim_date: outcome.claim_date,
            current_streak: outcome.streak.current_streak,
            longest_streak: outcome.streak.longest_streak,
            total_claims: outcome.streak.total_claims,
            level: outcome.level,
            leveled_up: outcome.level > outcome.previous_level,
            completed_missions: outcome.completed_missions,
        }),
    ))
}

pub async fn status(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
) -> Result<Json<DailyGiftStatus>, ServerError> {
    let status = state.engine.get_daily_gift_status(user_id).await?;
    Ok(Json(DailyGiftStatus {
        can_claim: status.can_claim,
        besitos_amount: status.besitos_amount,
        current_streak: status.current_streak,
        longest_streak: status.longest_streak,
        total_claims: status.total_claims,
        last_claim_date: status.last_claim_date,
    }))
}
