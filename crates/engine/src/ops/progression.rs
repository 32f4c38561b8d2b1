use chrono::Utc;

use sea_orm::{TransactionTrait, prelude::*};

use crate::{
    EngineError, Level, ResultEngine, band_for, levels, levels::validate_bands, user_progress,
};

use super::{Engine, load_levels, store_level, with_tx};

impl Engine {
    /// Recomputes a user's level from lifetime earned points.
    ///
    /// Spending never demotes: the basis is `total_points_earned`. When no
    /// band contains the total the previous level is kept and a
    /// configuration warning is logged.
    pub async fn recompute_level(&self, user_id: i64) -> ResultEngine<i32> {
        let _guard = self.lock_user(user_id).await?;
        self.recompute_level_unlocked(user_id).await
    }

    /// Level catalog ordered by `min_points`.
    pub async fn levels(&self) -> ResultEngine<Vec<Level>> {
        load_levels(&self.database).await
    }

    /// Replaces the whole level catalog.
    ///
    /// The bands must partition `[0, ∞)`. Cached user levels are corrected
    /// on their next balance change or profile read.
    pub async fn replace_levels(&self, mut defs: Vec<Level>) -> ResultEngine<Vec<Level>> {
        validate_bands(&defs)?;
        defs.sort_by_key(|level| level.min_points);
        with_tx!(self, |db_tx| {
            levels::Entity::delete_many().exec(&db_tx).await?;
            for level in &defs {
                let model = levels::ActiveModel::try_from(level)?;
                model.insert(&db_tx).await?;
            }
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(bands = defs.len(), "level catalog replaced");
        Ok(defs)
    }

    /// Caller holds the user's lock.
    pub(crate) async fn recompute_level_unlocked(&self, user_id: i64) -> ResultEngine<i32> {
        let Some(progress) = user_progress::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
        else {
            return Ok(1);
        };
        let bands = load_levels(&self.database).await?;
        let Some(band) = band_for(&bands, progress.total_points_earned) else {
            let warning = EngineError::ConfigurationIntegrity(format!(
                "no level band contains {} points",
                progress.total_points_earned
            ));
            tracing::warn!(
                user_id,
                operation = "recompute_level",
                kept_level = progress.current_level,
                "{warning}"
            );
            return Ok(progress.current_level);
        };
        if band.level != progress.current_level {
            store_level(&self.database, user_id, band.level, Utc::now()).await?;
            tracing::info!(
                user_id,
                from = progress.current_level,
                to = band.level,
                "level changed"
            );
        }
        Ok(band.level)
    }

    /// Post-commit level follow-up that never fails the triggering write.
    pub(crate) async fn settle_level(&self, user_id: i64, fallback: i32) -> i32 {
        match self.recompute_level_unlocked(user_id).await {
            Ok(level) => level,
            Err(err) => {
                tracing::warn!(
                    user_id,
                    operation = "recompute_level",
                    error = %err,
                    "level recompute failed; it will be corrected on next read"
                );
                fallback
            }
        }
    }
}
