use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{TransactionTrait, prelude::*};

use crate::{
    DeltaCmd, ObjectiveType, ProgressStep, ResultEngine, StreakState, TransactionKind,
    daily_gifts, util::local_date,
};

use super::{Engine, balance::apply_delta_in_tx, missions::advance_missions_in_tx, with_tx};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGiftOutcome {
    pub besitos_granted: i64,
    pub new_balance: i64,
    pub transaction_id: Uuid,
    pub claim_date: NaiveDate,
    pub streak: StreakState,
    pub previous_level: i32,
    pub level: i32,
    /// Streak missions completed by this claim.
    pub completed_missions: Vec<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGiftStatus {
    pub can_claim: bool,
    pub besitos_amount: i64,
    /// Streak a claim today would extend; `0` once a day was missed.
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_claims: i32,
    pub last_claim_date: Option<NaiveDate>,
}

impl Engine {
    pub async fn claim_daily_gift(&self, user_id: i64) -> ResultEngine<DailyGiftOutcome> {
        self.claim_daily_gift_at(user_id, Utc::now()).await
    }

    /// Claims the daily gift as of `now`.
    ///
    /// The credit, the claim record and streak mission progress commit
    /// together: if the credit fails the claim is not recorded. A second
    /// claim on the same local day fails with
    /// [`crate::EngineError::AlreadyClaimedToday`].
    pub async fn claim_daily_gift_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<DailyGiftOutcome> {
        let _guard = self.lock_user(user_id).await?;
        let today = local_date(now, self.settings.timezone);
        let amount = self.settings.daily_gift_besitos;

        let (applied, streak, completed_missions) = with_tx!(self, |db_tx| {
            let existing = daily_gifts::Entity::find_by_id(user_id).one(&db_tx).await?;
            let is_new = existing.is_none();
            let previous = existing.map(StreakState::from).unwrap_or_default();
            let streak = previous.claim(today)?;

            let cmd = DeltaCmd::new(user_id, amount, TransactionKind::DailyGift)
                .reference_id(format!("daily_gift:{today}"))
                .description(format!("Daily gift, streak {}", streak.current_streak))
                .idempotency_key(format!("daily_gift:{today}"));
            let applied = apply_delta_in_tx(&db_tx, &cmd, now).await?;

            let model = daily_gifts::active_model(user_id, &streak, now);
            if is_new {
                model.insert(&db_tx).await?;
            } else {
                model.update(&db_tx).await?;
            }

            let completed = advance_missions_in_tx(
                &db_tx,
                user_id,
                now,
                self.settings.timezone,
                |mission| mission.objective_type == ObjectiveType::Streak,
                ProgressStep::AtLeast(i64::from(streak.current_streak)),
            )
            .await?;
            Ok::<_, crate::EngineError>((applied, streak, completed))
        })?;

        let level = self.settle_level(user_id, applied.previous_level).await;
        tracing::info!(
            user_id,
            operation = "claim_daily_gift",
            streak = streak.current_streak,
            amount,
            "daily gift claimed"
        );
        Ok(DailyGiftOutcome {
            besitos_granted: amount,
            new_balance: applied.new_balance,
            transaction_id: applied.transaction_id,
            claim_date: today,
            streak,
            previous_level: applied.previous_level,
            level,
            completed_missions,
        })
    }

    pub async fn get_daily_gift_status(&self, user_id: i64) -> ResultEngine<DailyGiftStatus> {
        self.get_daily_gift_status_at(user_id, Utc::now()).await
    }

    pub async fn get_daily_gift_status_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<DailyGiftStatus> {
        let today = local_date(now, self.settings.timezone);
        let state = daily_gifts::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .map(StreakState::from)
            .unwrap_or_default();
        Ok(DailyGiftStatus {
            can_claim: state.can_claim(today),
            besitos_amount: self.settings.daily_gift_besitos,
            current_streak: state.live_streak(today),
            longest_streak: state.longest_streak,
            total_claims: state.total_claims,
            last_claim_date: state.last_claim_date,
        })
    }
}
