use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{PaginatorTrait, QueryFilter, prelude::*};

use crate::{
    ItemKind, ResultEngine, StreakState, band_for, daily_gifts, inventories,
    inventory_items, user_missions, user_progress, util::local_date,
};

use super::{Engine, is_vip_at, load_levels};

/// Read-only aggregation of everything the profile screen shows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub user_id: i64,
    pub besitos_balance: i64,
    pub level: i32,
    pub level_name: Option<String>,
    pub multiplier: f64,
    /// Lifetime points at which the next level starts; `None` at the top.
    pub next_level_at: Option<i64>,
    pub total_points_earned: i64,
    pub total_points_spent: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_claims: i32,
    pub can_claim_daily_gift: bool,
    pub last_claim_date: Option<NaiveDate>,
    /// One-time missions claimed plus recurring ones claimed this period.
    pub missions_completed: u64,
    pub inventory_items: i64,
    pub badges: u64,
    pub is_vip: bool,
}

impl Engine {
    pub async fn get_profile_summary(&self, user_id: i64) -> ResultEngine<ProfileSummary> {
        self.get_profile_summary_at(user_id, Utc::now()).await
    }

    /// Builds the profile summary as of `now`.
    ///
    /// A cached level that disagrees with the level bands (e.g. after a
    /// failed post-commit recompute) is corrected here when the user's lock
    /// is free.
    pub async fn get_profile_summary_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<ProfileSummary> {
        let today = local_date(now, self.settings.timezone);
        let progress = user_progress::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .map(crate::UserProgress::from)
            .unwrap_or_else(|| crate::UserProgress::new(user_id, now));
        let streak = daily_gifts::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .map(StreakState::from)
            .unwrap_or_default();

        let bands = load_levels(&self.database).await?;
        let mut level = progress.current_level;
        if let Some(band) = band_for(&bands, progress.total_points_earned)
            && band.level != level
        {
            level = match self.locks.try_acquire(user_id) {
                Some(_guard) => self.settle_level(user_id, level).await,
                None => band.level,
            };
        }
        let current_band = bands.iter().find(|band| band.level == level);

        let missions_completed = user_missions::Entity::find()
            .filter(user_missions::Column::UserId.eq(user_id))
            .filter(user_missions::Column::ClaimedAt.is_not_null())
            .count(&self.database)
            .await?;
        let inventory_items = inventories::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .map_or(0, |row| row.total_items);
        let badges = inventory_items::Entity::find()
            .filter(inventory_items::Column::UserId.eq(user_id))
            .filter(inventory_items::Column::ItemKind.eq(ItemKind::Badge.as_str()))
            .count(&self.database)
            .await?;

        Ok(ProfileSummary {
            user_id,
            besitos_balance: progress.besitos_balance,
            level,
            level_name: current_band.map(|band| band.name.clone()),
            multiplier: current_band.map_or(1.0, |band| band.multiplier),
            next_level_at: current_band.and_then(|band| band.max_points),
            total_points_earned: progress.total_points_earned,
            total_points_spent: progress.total_points_spent,
            current_streak: streak.live_streak(today),
            longest_streak: streak.longest_streak,
            total_claims: streak.total_claims,
            can_claim_daily_gift: streak.can_claim(today),
            last_claim_date: streak.last_claim_date,
            missions_completed,
            inventory_items,
            badges,
            is_vip: is_vip_at(&self.database, user_id, now).await?,
        })
    }
}
