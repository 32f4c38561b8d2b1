//! Daily gift claims and streak cadence.
//!
//! Days are calendar days in the engine's reference timezone; the stored
//! `last_claim_date` is a date, never a timestamp.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub last_claim_date: Option<NaiveDate>,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_claims: i32,
}

impl StreakState {
    pub fn can_claim(&self, today: NaiveDate) -> bool {
        self.last_claim_date.is_none_or(|last| last < today)
    }

    /// The streak a claim on `today` would continue, or `0` if it is broken.
    pub fn live_streak(&self, today: NaiveDate) -> i32 {
        match self.last_claim_date {
            Some(last) if last == today || today.pred_opt() == Some(last) => self.current_streak,
            _ => 0,
        }
    }

    /// State after a successful claim on `today`.
    ///
    /// Claiming the day after the last claim extends the streak; any longer
    /// gap (or a first claim) restarts it at 1. A claim dated today or later
    /// is rejected.
    pub fn claim(&self, today: NaiveDate) -> ResultEngine<Self> {
        if !self.can_claim(today) {
            return Err(EngineError::AlreadyClaimedToday);
        }
        let current_streak = match self.last_claim_date {
            Some(last) if today.pred_opt() == Some(last) => self.current_streak + 1,
            _ => 1,
        };
        Ok(Self {
            last_claim_date: Some(today),
            current_streak,
            longest_streak: self.longest_streak.max(current_streak),
            total_claims: self.total_claims + 1,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "daily_gift_claims")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub last_claim_date: Option<Date>,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_claims: i32,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for StreakState {
    fn from(model: Model) -> Self {
        Self {
            last_claim_date: model.last_claim_date,
            current_streak: model.current_streak,
            longest_streak: model.longest_streak,
            total_claims: model.total_claims,
        }
    }
}

pub(crate) fn active_model(user_id: i64, state: &StreakState, now: DateTime<Utc>) -> ActiveModel {
    ActiveModel {
        user_id: ActiveValue::Set(user_id),
        last_claim_date: ActiveValue::Set(state.last_claim_date),
        current_streak: ActiveValue::Set(state.current_streak),
        longest_streak: ActiveValue::Set(state.longest_streak),
        total_claims: ActiveValue::Set(state.total_claims),
        updated_at: ActiveValue::Set(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[test]
    fn first_claim_starts_streak() {
        let state = StreakState::default().claim(day(1)).unwrap();
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 1);
        assert_eq!(state.total_claims, 1);
        assert_eq!(state.last_claim_date, Some(day(1)));
    }

    #[test]
    fn consecutive_days_extend_and_gaps_reset() {
        let state = StreakState::default().claim(day(1)).unwrap();
        let state = state.claim(day(2)).unwrap();
        assert_eq!(state.current_streak, 2);

        let state = state.claim(day(4)).unwrap();
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 2);
        assert_eq!(state.total_claims, 3);
    }

    #[test]
    fn same_day_claim_is_rejected() {
        let state = StreakState::default().claim(day(1)).unwrap();
        assert_eq!(state.claim(day(1)), Err(EngineError::AlreadyClaimedToday));
    }

    #[test]
    fn month_boundary_counts_as_consecutive() {
        let last = NaiveDate::from_ymd_opt(2026, 4, 30).unwrap();
        let state = StreakState {
            last_claim_date: Some(last),
            current_streak: 6,
            longest_streak: 6,
            total_claims: 6,
        };
        assert_eq!(state.claim(day(1)).unwrap().current_streak, 7);
    }

    #[test]
    fn live_streak_drops_to_zero_after_a_missed_day() {
        let state = StreakState::default().claim(day(1)).unwrap();
        assert_eq!(state.live_streak(day(2)), 1);
        assert_eq!(state.live_streak(day(3)), 0);
    }
}
