use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{QueryFilter, QueryOrder, QuerySelect, prelude::*};

use crate::{ResultEngine, daily_gifts, user_progress, util::local_date};

use super::Engine;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    Besitos,
    Level,
    Streak,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: u32,
    pub user_id: i64,
    pub value: i64,
}

const MAX_LEADERBOARD: u64 = 100;

impl Engine {
    /// Top users by balance, level or live daily-gift streak.
    ///
    /// Users with nothing to show (zero balance, broken streak) are left out.
    /// `limit` is clamped to `1..=100`. Ties are broken by `user_id`
    /// ascending; level ties first by lifetime earned points.
    pub async fn get_leaderboard(
        &self,
        kind: LeaderboardKind,
        limit: u64,
    ) -> ResultEngine<Vec<LeaderboardEntry>> {
        self.get_leaderboard_at(kind, limit, Utc::now()).await
    }

    pub async fn get_leaderboard_at(
        &self,
        kind: LeaderboardKind,
        limit: u64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<LeaderboardEntry>> {
        let limit = limit.clamp(1, MAX_LEADERBOARD);
        let rows: Vec<(i64, i64)> = match kind {
            LeaderboardKind::Besitos => user_progress::Entity::find()
                .filter(user_progress::Column::BesitosBalance.gt(0))
                .order_by_desc(user_progress::Column::BesitosBalance)
                .order_by_asc(user_progress::Column::UserId)
                .limit(limit)
                .all(&self.database)
                .await?
                .into_iter()
                .map(|row| (row.user_id, row.besitos_balance))
                .collect(),
            LeaderboardKind::Level => user_progress::Entity::find()
                .order_by_desc(user_progress::Column::CurrentLevel)
                .order_by_desc(user_progress::Column::TotalPointsEarned)
                .order_by_asc(user_progress::Column::UserId)
                .limit(limit)
                .all(&self.database)
                .await?
                .into_iter()
                .map(|row| (row.user_id, i64::from(row.current_level)))
                .collect(),
            LeaderboardKind::Streak => {
                // A streak is live only if the last claim was today or yesterday.
                let today = local_date(now, self.settings.timezone);
                let yesterday = today.pred_opt().unwrap_or(today);
                daily_gifts::Entity::find()
                    .filter(daily_gifts::Column::LastClaimDate.gte(yesterday))
                    .filter(daily_gifts::Column::CurrentStreak.gt(0))
                    .order_by_desc(daily_gifts::Column::CurrentStreak)
                    .order_by_asc(daily_gifts::Column::UserId)
                    .limit(limit)
                    .all(&self.database)
                    .await?
                    .into_iter()
                    .map(|row| (row.user_id, i64::from(row.current_streak)))
                    .collect()
            }
        };

        Ok(rows
            .into_iter()
            .zip(1u32..)
            .map(|((user_id, value), rank)| LeaderboardEntry {
                rank,
                user_id,
                value,
            })
            .collect())
    }
}
