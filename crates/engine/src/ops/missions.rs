use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    DeltaCmd, EngineError, Mission, MissionState, ObjectiveType, ProgressCmd, ProgressStep,
    ResultEngine, TransactionKind, UserMission, missions, progress_events, rewards, user_missions,
    util::normalize_optional_text,
};

use super::{
    Engine, balance::apply_delta_in_tx, current_level, fulfillment::grant_reward_in_tx, is_vip_at,
    missing, with_tx,
};

/// A catalog mission with the user's state for it, if started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionView {
    pub mission: Mission,
    pub progress: Option<UserMission>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionClaim {
    pub mission_id: Uuid,
    pub besitos_granted: i64,
    /// Ledger row of the besitos credit, if the mission pays besitos.
    pub transaction_id: Option<Uuid>,
    pub new_balance: i64,
    /// Attached reward granted by this claim.
    pub reward_id: Option<Uuid>,
    pub state: MissionState,
    pub level: i32,
}

impl Engine {
    /// Starts a mission for a user.
    ///
    /// Returns `false` without changing anything when the mission is
    /// unknown, inactive, gated (level or VIP) or already started.
    pub async fn start_mission(&self, user_id: i64, mission_id: Uuid) -> ResultEngine<bool> {
        let _guard = self.lock_user(user_id).await?;
        let now = Utc::now();
        with_tx!(self, |db_tx| {
            let Some(model) = missions::Entity::find_by_id(mission_id.to_string())
                .one(&db_tx)
                .await?
            else {
                return Ok(false);
            };
            let mission = Mission::try_from(model)?;
            if !mission.is_active {
                return Ok(false);
            }
            let started = user_missions::Entity::find()
                .filter(user_missions::Column::UserId.eq(user_id))
                .filter(user_missions::Column::MissionId.eq(mission_id.to_string()))
                .one(&db_tx)
                .await?
                .is_some();
            if started {
                return Ok(false);
            }
            if current_level(&db_tx, user_id).await? < mission.required_level {
                tracing::debug!(user_id, %mission_id, "mission start refused: level");
                return Ok(false);
            }
            if mission.is_vip_only && !is_vip_at(&db_tx, user_id, now).await? {
                tracing::debug!(user_id, %mission_id, "mission start refused: vip");
                return Ok(false);
            }

            let row = UserMission::start(user_id, mission_id, now);
            let model: user_missions::ActiveModel = (&row).into();
            model.insert(&db_tx).await?;
            Ok(true)
        })
    }

    /// Advances every in-progress mission of `cmd.objective` by `cmd.increment`.
    ///
    /// Returns the missions this call completed. A repeated idempotency key
    /// is a no-op that returns nothing.
    pub async fn record_progress(&self, cmd: ProgressCmd) -> ResultEngine<Vec<Uuid>> {
        self.record_progress_at(cmd, Utc::now()).await
    }

    pub async fn record_progress_at(
        &self,
        cmd: ProgressCmd,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Uuid>> {
        if cmd.increment <= 0 {
            return Err(EngineError::InvalidAmount(
                "progress increment must be > 0".to_string(),
            ));
        }
        let _guard = self.lock_user(cmd.user_id).await?;
        let reaction = normalize_optional_text(cmd.reaction.as_deref());
        with_tx!(self, |db_tx| {
            let key = cmd.idempotency_key.as_deref();
            if !claim_event_key(&db_tx, cmd.user_id, key, cmd.objective.as_str(), now).await? {
                return Ok(Vec::new());
            }
            advance_missions_in_tx(
                &db_tx,
                cmd.user_id,
                now,
                self.settings.timezone,
                |mission| {
                    mission.objective_type == cmd.objective
                        && (mission.objective_type != ObjectiveType::SpecificReaction
                            || reaction
                                .as_deref()
                                .is_some_and(|reaction| mission.counts_reaction(reaction)))
                },
                ProgressStep::Increment(cmd.increment),
            )
            .await
        })
    }

    /// Counts one reaction toward every reaction-driven mission it matches.
    pub async fn record_reaction(
        &self,
        user_id: i64,
        reaction: &str,
        idempotency_key: Option<&str>,
    ) -> ResultEngine<Vec<Uuid>> {
        self.record_reaction_at(user_id, reaction, idempotency_key, Utc::now())
            .await
    }

    pub async fn record_reaction_at(
        &self,
        user_id: i64,
        reaction: &str,
        idempotency_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Uuid>> {
        let reaction = reaction.trim();
        if reaction.is_empty() {
            return Err(EngineError::InvalidAmount(
                "reaction must not be empty".to_string(),
            ));
        }
        let _guard = self.lock_user(user_id).await?;
        let completed = with_tx!(self, |db_tx| {
            if !claim_event_key(&db_tx, user_id, idempotency_key, "reaction", now).await? {
                return Ok(Vec::new());
            }
            advance_missions_in_tx(
                &db_tx,
                user_id,
                now,
                self.settings.timezone,
                |mission| mission.counts_reaction(reaction),
                ProgressStep::Increment(1),
            )
            .await
        })?;
        if !completed.is_empty() {
            tracing::info!(user_id, completed = completed.len(), "missions completed");
        }
        Ok(completed)
    }

    /// Pays out a completed mission.
    ///
    /// Credits `besitos_reward` and grants the attached reward in one
    /// database transaction. One-time missions become `Claimed`; recurring
    /// missions go back to `NotStarted` until their next period.
    pub async fn claim_reward(&self, user_id: i64, mission_id: Uuid) -> ResultEngine<MissionClaim> {
        self.claim_reward_at(user_id, mission_id, Utc::now()).await
    }

    pub async fn claim_reward_at(
        &self,
        user_id: i64,
        mission_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<MissionClaim> {
        let _guard = self.lock_user(user_id).await?;
        let tz = self.settings.timezone;
        let outcome = with_tx!(self, |db_tx| {
            let (mut row, mission) = load_user_mission(&db_tx, user_id, mission_id).await?;
            if row.refresh(mission.recurrence(), now, tz) {
                save_user_mission(&db_tx, &row).await?;
            }
            // Refusals are returned after the commit so a lazy reset sticks.
            let outcome = match claim_refusal(&row) {
                Some(refusal) => Err(refusal),
                None => Ok(pay_out_in_tx(&db_tx, user_id, &mut row, &mission, now).await?),
            };
            Ok::<_, EngineError>(outcome)
        })?;
        let (claim, previous_level) = outcome?;

        let level = self.settle_level(user_id, previous_level).await;
        tracing::info!(
            user_id,
            operation = "claim_reward",
            reference_id = %mission_id,
            besitos = claim.besitos_granted,
            "mission reward claimed"
        );
        Ok(MissionClaim { level, ..claim })
    }

    /// Every active mission, with the user's state where started.
    ///
    /// Recurring missions past their cadence boundary are shown reset; the
    /// reset itself is persisted by the next write touching them.
    pub async fn list_user_missions(&self, user_id: i64) -> ResultEngine<Vec<MissionView>> {
        self.list_user_missions_at(user_id, Utc::now()).await
    }

    pub async fn list_user_missions_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<MissionView>> {
        let tz = self.settings.timezone;
        let catalog = missions::Entity::find()
            .filter(missions::Column::IsActive.eq(true))
            .order_by_asc(missions::Column::CreatedAt)
            .all(&self.database)
            .await?;
        let rows = user_missions::Entity::find()
            .filter(user_missions::Column::UserId.eq(user_id))
            .all(&self.database)
            .await?;
        let mut rows = rows
            .into_iter()
            .map(UserMission::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        let mut out = Vec::with_capacity(catalog.len());
        for model in catalog {
            let mission = Mission::try_from(model)?;
            let progress = rows
                .iter()
                .position(|row| row.mission_id == mission.id)
                .map(|index| rows.swap_remove(index))
                .map(|mut row| {
                    row.refresh(mission.recurrence(), now, tz);
                    row
                });
            out.push(MissionView { mission, progress });
        }
        Ok(out)
    }

    /// Active missions the user could start right now.
    pub async fn available_missions(&self, user_id: i64) -> ResultEngine<Vec<Mission>> {
        let now = Utc::now();
        let level = current_level(&self.database, user_id).await?;
        let is_vip = is_vip_at(&self.database, user_id, now).await?;
        let views = self.list_user_missions_at(user_id, now).await?;
        Ok(views
            .into_iter()
            .filter(|view| view.progress.is_none())
            .map(|view| view.mission)
            .filter(|mission| mission.required_level <= level && (!mission.is_vip_only || is_vip))
            .collect())
    }
}

/// Records a progress idempotency key. Returns `false` if it was seen before.
async fn claim_event_key(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    key: Option<&str>,
    objective: &str,
    now: DateTime<Utc>,
) -> ResultEngine<bool> {
    let Some(key) = normalize_optional_text(key) else {
        return Ok(true);
    };
    let seen = progress_events::Entity::find_by_id((user_id, key.clone()))
        .one(db_tx)
        .await?
        .is_some();
    if seen {
        tracing::debug!(user_id, idempotency_key = %key, "duplicate progress event ignored");
        return Ok(false);
    }
    progress_events::ActiveModel {
        user_id: ActiveValue::Set(user_id),
        idempotency_key: ActiveValue::Set(key),
        objective: ActiveValue::Set(objective.to_string()),
        created_at: ActiveValue::Set(now),
    }
    .insert(db_tx)
    .await?;
    Ok(true)
}

/// Applies `step` to the user's started missions selected by `matches`.
///
/// Recurring rows past their cadence boundary are reset first. Returns the
/// ids of missions completed by this step.
pub(crate) async fn advance_missions_in_tx<F>(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    now: DateTime<Utc>,
    tz: Tz,
    matches: F,
    step: ProgressStep,
) -> ResultEngine<Vec<Uuid>>
where
    F: Fn(&Mission) -> bool,
{
    let rows = user_missions::Entity::find()
        .find_also_related(missions::Entity)
        .filter(user_missions::Column::UserId.eq(user_id))
        .filter(missions::Column::IsActive.eq(true))
        .all(db_tx)
        .await?;

    let mut completed = Vec::new();
    for (row, mission) in rows {
        let Some(mission) = mission else { continue };
        let mission = Mission::try_from(mission)?;
        if !matches(&mission) {
            continue;
        }
        let mut row = UserMission::try_from(row)?;
        let mut changed = row.refresh(mission.recurrence(), now, tz);
        if row.state == MissionState::InProgress {
            let before = row.current_progress;
            let done = row.advance(step, mission.objective_value, now);
            if done {
                completed.push(mission.id);
            }
            changed |= done || row.current_progress != before;
        }
        if changed {
            save_user_mission(db_tx, &row).await?;
        }
    }
    Ok(completed)
}

/// Why a loaded mission row cannot be claimed, if it cannot.
fn claim_refusal(row: &UserMission) -> Option<EngineError> {
    match row.state {
        MissionState::Completed => None,
        MissionState::Claimed => Some(EngineError::AlreadyClaimed),
        MissionState::NotStarted if row.claimed_at.is_some() => Some(EngineError::AlreadyClaimed),
        MissionState::NotStarted | MissionState::InProgress => {
            Some(EngineError::MissionNotCompleted)
        }
    }
}

/// Credits the besitos, grants the attached reward and marks the row claimed.
async fn pay_out_in_tx(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    row: &mut UserMission,
    mission: &Mission,
    now: DateTime<Utc>,
) -> ResultEngine<(MissionClaim, i32)> {
    let mut previous_level = current_level(db_tx, user_id).await?;
    let mut transaction_id = None;
    let mut new_balance = None;
    if mission.besitos_reward > 0 {
        let cmd = DeltaCmd::new(user_id, mission.besitos_reward, TransactionKind::MissionReward)
            .reference_id(mission.id.to_string())
            .description(format!("Mission reward: {}", mission.name));
        let applied = apply_delta_in_tx(db_tx, &cmd, now).await?;
        previous_level = applied.previous_level;
        transaction_id = Some(applied.transaction_id);
        new_balance = Some(applied.new_balance);
    }

    let mut reward_id = None;
    if let Some(id) = mission.reward_id {
        let reward = rewards::Entity::find_by_id(id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| missing("reward"))?;
        let reward = crate::Reward::try_from(reward)?;
        let granted = grant_reward_in_tx(
            db_tx,
            user_id,
            &reward,
            crate::AcquisitionSource::Mission,
            0,
            now,
        )
        .await?;
        if let Some(balance) = granted.new_balance {
            new_balance = Some(balance);
        }
        reward_id = granted.granted.then_some(reward.id);
    }

    row.mark_claimed(mission.recurrence(), now);
    save_user_mission(db_tx, row).await?;

    let new_balance = match new_balance {
        Some(balance) => balance,
        None => super::progress_row(db_tx, user_id, now).await?.besitos_balance,
    };
    Ok((
        MissionClaim {
            mission_id: mission.id,
            besitos_granted: mission.besitos_reward,
            transaction_id,
            new_balance,
            reward_id,
            state: row.state,
            level: previous_level,
        },
        previous_level,
    ))
}

async fn load_user_mission(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    mission_id: Uuid,
) -> ResultEngine<(UserMission, Mission)> {
    let (row, mission) = user_missions::Entity::find()
        .find_also_related(missions::Entity)
        .filter(user_missions::Column::UserId.eq(user_id))
        .filter(user_missions::Column::MissionId.eq(mission_id.to_string()))
        .one(db_tx)
        .await?
        .ok_or(EngineError::MissionNotCompleted)?;
    let mission = mission.ok_or_else(|| missing("mission"))?;
    Ok((UserMission::try_from(row)?, Mission::try_from(mission)?))
}

async fn save_user_mission(db_tx: &DatabaseTransaction, row: &UserMission) -> ResultEngine<()> {
    let model: user_missions::ActiveModel = row.into();
    model.update(db_tx).await?;
    Ok(())
}
