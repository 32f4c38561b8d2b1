//! Balance and ledger endpoints.

use api_types::balance::{
    DeltaApplied, DeltaNew, LedgerEntryView, LedgerPageResponse, LedgerQuery,
    TransactionKind as ApiKind,
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{CurrentUser, ServerError, server::ServerState};

fn map_kind(kind: engine::TransactionKind) -> ApiKind {
    match kind {
        engine::TransactionKind::Grant => ApiKind::Grant,
        engine::TransactionKind::Purchase => ApiKind::Purchase,
        engine::TransactionKind::MissionReward => ApiKind::MissionReward,
        engine::TransactionKind::DailyGift => ApiKind::DailyGift,
        engine::TransactionKind::Reaction => ApiKind::Reaction,
        engine::TransactionKind::Reward => ApiKind::Reward,
        engine::TransactionKind::Refund => ApiKind::Refund,
        engine::TransactionKind::Adjustment => ApiKind::Adjustment,
    }
}

fn engine_kind(kind: ApiKind) -> engine::TransactionKind {
    match kind {
        ApiKind::Grant => engine::TransactionKind::Grant,
        ApiKind::Purchase => engine::TransactionKind::Purchase,
        ApiKind::MissionReward => engine::TransactionKind::MissionReward,
        ApiKind::DailyGift => engine::TransactionKind::DailyGift,
        ApiKind::Reaction => engine::TransactionKind::Reaction,
        ApiKind::Reward => engine::TransactionKind::Reward,
        ApiKind::Refund => engine::TransactionKind::Refund,
        ApiKind::Adjustment => engine::TransactionKind::Adjustment,
    }
}

pub async fn apply_delta(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Json(payload): Json<DeltaNew>,
) -> Result<(StatusCode, Json<DeltaApplied>), ServerError> {
    let mut cmd = engine::DeltaCmd::new(user_id, payload.amount, engine_kind(payload.kind));
    cmd.reference_id = payload.reference_id;
    cmd.description = payload.description;
    cmd.idempotency_key = payload.idempotency_key;

    let outcome = state.engine.apply_delta(cmd).await?;
    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(DeltaApplied {
            new_balance: outcome.new_balance,
            transaction_id: outcome.transaction_id,
            level: outcome.level,
            leveled_up: outcome.leveled_up(),
            replayed: outcome.replayed,
        }),
    ))
}

pub async fn ledger(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerPageResponse>, ServerError> {
    let page = state
        .engine
        .list_ledger_page(user_id, query.limit.unwrap_or(50), query.cursor.as_deref())
        .await?;
    let items = page
        .items
        .into_iter()
        .map(|row| LedgerEntryView {
            id: row.id,
            seq: row.seq,
            amount: row.amount,
            kind: map_kind(row.kind),
            reference_id: row.reference_id,
            description: row.description,
            balance_after: row.balance_after,
            created_at: row.created_at,
        })
        .collect();
    Ok(Json(LedgerPageResponse {
        items,
        next_cursor: page.next_cursor,
    }))
}
