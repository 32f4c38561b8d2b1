//! Mission endpoints.

use api_types::mission::{
    MissionClaimed, MissionListResponse, MissionStarted, MissionState as ApiState, MissionView,
    ObjectiveType as ApiObjective, ProgressNew, ProgressRecorded, ReactionNew,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{CurrentUser, ServerError, server::ServerState};

fn map_objective(objective: engine::ObjectiveType) -> ApiObjective {
    match objective {
        engine::ObjectiveType::Streak => ApiObjective::Streak,
        engine::ObjectiveType::DailyCount => ApiObjective::DailyCount,
        engine::ObjectiveType::WeeklyCount => ApiObjective::WeeklyCount,
        engine::ObjectiveType::OneTimeCount => ApiObjective::OneTimeCount,
        engine::ObjectiveType::SpecificReaction => ApiObjective::SpecificReaction,
    }
}

fn engine_objective(objective: ApiObjective) -> engine::ObjectiveType {
    match objective {
        ApiObjective::Streak => engine::ObjectiveType::Streak,
        ApiObjective::DailyCount => engine::ObjectiveType::DailyCount,
        ApiObjective::WeeklyCount => engine::ObjectiveType::WeeklyCount,
        ApiObjective::OneTimeCount => engine::ObjectiveType::OneTimeCount,
        ApiObjective::SpecificReaction => engine::ObjectiveType::SpecificReaction,
    }
}

fn map_state(state: engine::MissionState) -> ApiState {
    match state {
        engine::MissionState::NotStarted => ApiState::NotStarted,
        engine::MissionState::InProgress => ApiState::InProgress,
        engine::MissionState::Completed => ApiState::Completed,
        engine::MissionState::Claimed => ApiState::Claimed,
    }
}

pub async fn list(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
) -> Result<Json<MissionListResponse>, ServerError> {
    let missions = state
        .engine
        .list_user_missions(user_id)
        .await?
        .into_iter()
        .map(|view| MissionView {
            id: view.mission.id,
            name: view.mission.name,
            description: view.mission.description,
            objective_type: map_objective(view.mission.objective_type),
            objective_value: view.mission.objective_value,
            besitos_reward: view.mission.besitos_reward,
            reward_id: view.mission.reward_id,
            state: view.progress.as_ref().map(|row| map_state(row.state)),
            current_progress: view.progress.map_or(0, |row| row.current_progress),
        })
        .collect();
    Ok(Json(MissionListResponse { missions }))
}

pub async fn start(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Path(mission_id): Path<Uuid>,
) -> Result<Json<MissionStarted>, ServerError> {
    let started = state.engine.start_mission(user_id, mission_id).await?;
    Ok(Json(MissionStarted { started }))
}

pub async fn record_progress(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Json(payload): Json<ProgressNew>,
) -> Result<Json<ProgressRecorded>, ServerError> {
    let mut cmd =
        engine::ProgressCmd::new(user_id, engine_objective(payload.objective), payload.increment);
    cmd.reaction = payload.reaction;
    cmd.idempotency_key = payload.idempotency_key;
    let completed = state.engine.record_progress(cmd).await?;
    Ok(Json(ProgressRecorded { completed }))
}

pub async fn record_reaction(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Json(payload): Json<ReactionNew>,
) -> Result<Json<ProgressRecorded>, ServerError> {
    let completed = state
        .engine
        .record_reaction(
            user_id,
            &payload.reaction,
            payload.idempotency_key.as_deref(),
        )
        .await?;
    Ok(Json(ProgressRecorded { completed }))
}

pub async fn claim(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Path(mission_id): Path<Uuid>,
) -> Result<(StatusCode, Json<MissionClaimed>), ServerError> {
    let claim = state.engine.claim_reward(user_id, mission_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(MissionClaimed {
            mission_id: claim.mission_id,
            besitos_granted: claim.besitos_granted,
            new_balance: claim.new_balance,
            reward_id: claim.reward_id,
            level: claim.level,
        }),
    ))
}
