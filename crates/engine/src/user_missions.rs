//! Per-user mission state.
//!
//! ```text
//! NOT_STARTED -> IN_PROGRESS -> COMPLETED -> CLAIMED
//!      ^              ^                        |
//!      |              +---- cadence boundary --+  (recurring missions)
//!      +---- claim of a recurring mission -----+
//! ```
//!
//! At most one row exists per `(user_id, mission_id)`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, missions::Recurrence, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionState {
    NotStarted,
    InProgress,
    Completed,
    Claimed,
}

impl MissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Claimed => "claimed",
        }
    }
}

impl TryFrom<&str> for MissionState {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "claimed" => Ok(Self::Claimed),
            other => Err(EngineError::InvalidCatalog(format!(
                "invalid mission state: {other}"
            ))),
        }
    }
}

/// How a qualifying action moves a mission's progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStep {
    /// Add to the current progress.
    Increment(i64),
    /// Raise the progress to at least this value (streak objectives).
    AtLeast(i64),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMission {
    pub id: Uuid,
    pub user_id: i64,
    pub mission_id: Uuid,
    pub state: MissionState,
    pub current_progress: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_reset_at: DateTime<Utc>,
}

impl UserMission {
    pub fn start(user_id: i64, mission_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            mission_id,
            state: MissionState::InProgress,
            current_progress: 0,
            started_at: now,
            completed_at: None,
            claimed_at: None,
            last_reset_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, MissionState::Completed | MissionState::Claimed)
    }

    /// Applies a progress step to an in-progress mission.
    ///
    /// Progress is clamped at `target`. Returns `true` when this step
    /// completed the mission.
    pub fn advance(&mut self, step: ProgressStep, target: i64, now: DateTime<Utc>) -> bool {
        if self.state != MissionState::InProgress {
            return false;
        }
        let next = match step {
            ProgressStep::Increment(n) => self.current_progress.saturating_add(n.max(0)),
            ProgressStep::AtLeast(value) => self.current_progress.max(value),
        };
        self.current_progress = next.min(target);
        if self.current_progress >= target {
            self.state = MissionState::Completed;
            self.completed_at = Some(now);
            return true;
        }
        false
    }

    /// Lazily resets a recurring mission once its cadence period is over.
    ///
    /// Completed-but-unclaimed progress from the previous period is dropped.
    /// Returns `true` if the row changed.
    pub fn refresh(&mut self, recurrence: Recurrence, now: DateTime<Utc>, tz: Tz) -> bool {
        if !recurrence.crossed_boundary(self.last_reset_at, now, tz) {
            return false;
        }
        self.state = MissionState::InProgress;
        self.current_progress = 0;
        self.completed_at = None;
        self.claimed_at = None;
        self.last_reset_at = now;
        true
    }

    /// Transition after a successful claim.
    pub fn mark_claimed(&mut self, recurrence: Recurrence, now: DateTime<Utc>) {
        if recurrence.is_recurring() {
            self.state = MissionState::NotStarted;
            self.current_progress = 0;
            self.completed_at = None;
            self.last_reset_at = now;
        } else {
            self.state = MissionState::Claimed;
        }
        self.claimed_at = Some(now);
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_missions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: i64,
    pub mission_id: String,
    pub state: String,
    pub current_progress: i64,
    pub started_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
    pub claimed_at: Option<DateTimeUtc>,
    pub last_reset_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::missions::Entity",
        from = "Column::MissionId",
        to = "super::missions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Missions,
}

impl Related<super::missions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Missions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&UserMission> for ActiveModel {
    fn from(value: &UserMission) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            user_id: ActiveValue::Set(value.user_id),
            mission_id: ActiveValue::Set(value.mission_id.to_string()),
            state: ActiveValue::Set(value.state.as_str().to_string()),
            current_progress: ActiveValue::Set(value.current_progress),
            started_at: ActiveValue::Set(value.started_at),
            completed_at: ActiveValue::Set(value.completed_at),
            claimed_at: ActiveValue::Set(value.claimed_at),
            last_reset_at: ActiveValue::Set(value.last_reset_at),
        }
    }
}

impl TryFrom<Model> for UserMission {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "user mission")?,
            user_id: model.user_id,
            mission_id: parse_uuid(&model.mission_id, "mission")?,
            state: MissionState::try_from(model.state.as_str())?,
            current_progress: model.current_progress,
            started_at: model.started_at,
            completed_at: model.completed_at,
            claimed_at: model.claimed_at,
            last_reset_at: model.last_reset_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 2, 10, 0, 0).unwrap()
    }

    #[test]
    fn progress_clamps_and_completes_at_target() {
        let mut mission = UserMission::start(1, Uuid::new_v4(), now());
        for _ in 0..4 {
            assert!(!mission.advance(ProgressStep::Increment(1), 5, now()));
        }
        assert_eq!(mission.state, MissionState::InProgress);
        assert_eq!(mission.current_progress, 4);

        assert!(mission.advance(ProgressStep::Increment(3), 5, now()));
        assert_eq!(mission.current_progress, 5);
        assert_eq!(mission.state, MissionState::Completed);
        assert_eq!(mission.completed_at, Some(now()));

        assert!(!mission.advance(ProgressStep::Increment(1), 5, now()));
        assert_eq!(mission.current_progress, 5);
    }

    #[test]
    fn at_least_never_lowers_progress() {
        let mut mission = UserMission::start(1, Uuid::new_v4(), now());
        mission.advance(ProgressStep::AtLeast(3), 7, now());
        mission.advance(ProgressStep::AtLeast(1), 7, now());
        assert_eq!(mission.current_progress, 3);
    }

    #[test]
    fn recurring_claim_waits_for_next_period() {
        let tz = chrono_tz::UTC;
        let mut mission = UserMission::start(1, Uuid::new_v4(), now());
        mission.advance(ProgressStep::Increment(2), 2, now());
        mission.mark_claimed(Recurrence::Daily, now());
        assert_eq!(mission.state, MissionState::NotStarted);

        assert!(!mission.refresh(Recurrence::Daily, now() + Duration::hours(2), tz));
        assert!(mission.refresh(Recurrence::Daily, now() + Duration::days(1), tz));
        assert_eq!(mission.state, MissionState::InProgress);
        assert_eq!(mission.current_progress, 0);
    }

    #[test]
    fn one_time_claim_is_terminal() {
        let mut mission = UserMission::start(1, Uuid::new_v4(), now());
        mission.advance(ProgressStep::Increment(1), 1, now());
        mission.mark_claimed(Recurrence::Once, now());
        assert_eq!(mission.state, MissionState::Claimed);
        assert!(!mission.refresh(Recurrence::Once, now() + Duration::days(30), chrono_tz::UTC));
    }
}
