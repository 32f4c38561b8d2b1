//! Mission catalog.
//!
//! Missions are admin-managed objectives. The objective type decides both
//! which actions advance the mission and whether it recurs.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{local_date, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveType {
    /// Reach a daily gift streak of `objective_value` days.
    Streak,
    /// React `objective_value` times within one local day.
    DailyCount,
    /// React `objective_value` times within one local week (Monday start).
    WeeklyCount,
    /// React `objective_value` times, once.
    OneTimeCount,
    /// Use the reaction named in the mission metadata `objective_value` times.
    SpecificReaction,
}

impl ObjectiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streak => "streak",
            Self::DailyCount => "daily_count",
            Self::WeeklyCount => "weekly_count",
            Self::OneTimeCount => "one_time_count",
            Self::SpecificReaction => "specific_reaction",
        }
    }

    pub fn recurrence(self) -> Recurrence {
        match self {
            Self::DailyCount => Recurrence::Daily,
            Self::WeeklyCount => Recurrence::Weekly,
            Self::Streak | Self::OneTimeCount | Self::SpecificReaction => Recurrence::Once,
        }
    }
}

impl TryFrom<&str> for ObjectiveType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "streak" => Ok(Self::Streak),
            "daily_count" => Ok(Self::DailyCount),
            "weekly_count" => Ok(Self::WeeklyCount),
            "one_time_count" => Ok(Self::OneTimeCount),
            "specific_reaction" => Ok(Self::SpecificReaction),
            other => Err(EngineError::InvalidCatalog(format!(
                "invalid objective type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Once,
    Daily,
    Weekly,
}

impl Recurrence {
    pub fn is_recurring(self) -> bool {
        !matches!(self, Self::Once)
    }

    /// First local day of the cadence period containing `at`.
    pub fn period_start(self, at: DateTime<Utc>, tz: Tz) -> Option<NaiveDate> {
        let day = local_date(at, tz);
        match self {
            Self::Once => None,
            Self::Daily => Some(day),
            Self::Weekly => {
                Some(day - Duration::days(i64::from(day.weekday().num_days_from_monday())))
            }
        }
    }

    /// Whether `now` lies in a later cadence period than `since`.
    pub fn crossed_boundary(self, since: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> bool {
        match (self.period_start(since, tz), self.period_start(now, tz)) {
            (Some(then), Some(current)) => current > then,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionMetadata {
    /// Reaction a `specific_reaction` mission counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub objective_type: ObjectiveType,
    pub objective_value: i64,
    pub besitos_reward: i64,
    pub reward_id: Option<Uuid>,
    pub is_active: bool,
    pub required_level: i32,
    pub is_vip_only: bool,
    pub metadata: MissionMetadata,
    pub created_at: DateTime<Utc>,
}

impl Mission {
    pub fn recurrence(&self) -> Recurrence {
        self.objective_type.recurrence()
    }

    /// Whether a reaction counts toward this mission.
    pub fn counts_reaction(&self, reaction: &str) -> bool {
        match self.objective_type {
            ObjectiveType::DailyCount
            | ObjectiveType::WeeklyCount
            | ObjectiveType::OneTimeCount => true,
            ObjectiveType::SpecificReaction => self.metadata.reaction.as_deref() == Some(reaction),
            ObjectiveType::Streak => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "missions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub objective_type: String,
    pub objective_value: i64,
    pub besitos_reward: i64,
    pub reward_id: Option<String>,
    pub is_active: bool,
    pub required_level: i32,
    pub is_vip_only: bool,
    pub metadata: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_missions::Entity")]
    UserMissions,
}

impl Related<super::user_missions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserMissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&Mission> for ActiveModel {
    type Error = EngineError;

    fn try_from(value: &Mission) -> ResultEngine<Self> {
        let metadata = serde_json::to_string(&value.metadata)
            .map_err(|err| EngineError::InvalidCatalog(format!("invalid metadata: {err}")))?;
        Ok(Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            description: ActiveValue::Set(value.description.clone()),
            objective_type: ActiveValue::Set(value.objective_type.as_str().to_string()),
            objective_value: ActiveValue::Set(value.objective_value),
            besitos_reward: ActiveValue::Set(value.besitos_reward),
            reward_id: ActiveValue::Set(value.reward_id.map(|id| id.to_string())),
            is_active: ActiveValue::Set(value.is_active),
            required_level: ActiveValue::Set(value.required_level),
            is_vip_only: ActiveValue::Set(value.is_vip_only),
            metadata: ActiveValue::Set(metadata),
            created_at: ActiveValue::Set(value.created_at),
        })
    }
}

impl TryFrom<Model> for Mission {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let metadata = serde_json::from_str(&model.metadata).map_err(|err| {
            EngineError::InvalidCatalog(format!("invalid metadata for mission {}: {err}", model.id))
        })?;
        Ok(Self {
            id: parse_uuid(&model.id, "mission")?,
            name: model.name,
            description: model.description,
            objective_type: ObjectiveType::try_from(model.objective_type.as_str())?,
            objective_value: model.objective_value,
            besitos_reward: model.besitos_reward,
            reward_id: model
                .reward_id
                .as_deref()
                .map(|id| parse_uuid(id, "reward"))
                .transpose()?,
            is_active: model.is_active,
            required_level: model.required_level,
            is_vip_only: model.is_vip_only,
            metadata,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn daily_boundary_is_local_midnight() {
        let tz = chrono_tz::Europe::Madrid;
        // 21:30 and 22:30 UTC on 2026-06-01 fall on either side of Madrid midnight.
        let before = Utc.with_ymd_and_hms(2026, 6, 1, 21, 30, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 6, 1, 22, 30, 0).unwrap();
        assert!(Recurrence::Daily.crossed_boundary(before, after, tz));
        assert!(!Recurrence::Daily.crossed_boundary(after, after, tz));
    }

    #[test]
    fn weekly_boundary_is_monday() {
        let tz = chrono_tz::UTC;
        let sunday = Utc.with_ymd_and_hms(2026, 6, 7, 12, 0, 0).unwrap();
        let wednesday = Utc.with_ymd_and_hms(2026, 6, 3, 12, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2026, 6, 8, 0, 0, 0).unwrap();
        assert!(!Recurrence::Weekly.crossed_boundary(wednesday, sunday, tz));
        assert!(Recurrence::Weekly.crossed_boundary(sunday, monday, tz));
    }

    #[test]
    fn one_time_missions_never_reset() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        assert!(!Recurrence::Once.crossed_boundary(at, later, chrono_tz::UTC));
    }
}
