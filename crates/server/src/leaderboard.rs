use api_types::leaderboard::{
    LeaderboardEntryView, LeaderboardKind, LeaderboardQuery, LeaderboardResponse,
};
use axum::{
    Json,
    extract::{Query, State},
};

use crate::{ServerError, server::ServerState};

pub async fn get(
    State(state): State<ServerState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ServerError> {
    let kind = match query.kind {
        LeaderboardKind::Besitos => engine::LeaderboardKind::Besitos,
        LeaderboardKind::Level => engine::LeaderboardKind::Level,
        LeaderboardKind::Streak => engine::LeaderboardKind::Streak,
    };
    let entries = state
        .engine
        .get_leaderboard(kind, query.limit.unwrap_or(10))
        .await?
        .into_iter()
        .map(|entry| LeaderboardEntryView {
            rank: entry.rank,
            user_id: entry.user_id,
            value: entry.value,
        })
        .collect();
    Ok(Json(LeaderboardResponse {
        kind: query.kind,
        entries,
    }))
}
