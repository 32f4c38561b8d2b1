use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder, prelude::*, sea_query::Expr,
};

use crate::{
    EngineError, EngineSettings, ResultEngine, levels,
    locks::{UserGuard, UserLocks},
    user_progress, vip,
};

mod balance;
mod catalog;
mod daily_gift;
mod fulfillment;
mod inventory;
mod leaderboard;
mod ledger;
mod missions;
mod profile;
mod progression;

pub use balance::DeltaOutcome;
pub use daily_gift::{DailyGiftOutcome, DailyGiftStatus};
pub use fulfillment::{PurchaseReceipt, PurchaseRefund};
pub use inventory::{InventorySnapshot, OwnedBadge};
pub use leaderboard::{LeaderboardEntry, LeaderboardKind};
pub use ledger::{LedgerAudit, LedgerDiscrepancy, LedgerPage};
pub use missions::{MissionClaim, MissionView};
pub use profile::ProfileSummary;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    settings: EngineSettings,
    locks: UserLocks,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Serializes writes for `user_id`. Must be taken before opening a
    /// database transaction.
    async fn lock_user(&self, user_id: i64) -> ResultEngine<UserGuard> {
        self.locks.acquire(user_id, self.settings.lock_timeout).await
    }
}

/// Loads the user's balance row, creating it with a zero balance on first touch.
async fn progress_row<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    now: DateTime<Utc>,
) -> ResultEngine<user_progress::Model> {
    if let Some(model) = user_progress::Entity::find_by_id(user_id).one(db).await? {
        return Ok(model);
    }
    let fresh = crate::UserProgress::new(user_id, now);
    let model: user_progress::ActiveModel = (&fresh).into();
    Ok(model.insert(db).await?)
}

/// Current level of a user, `1` for users without a balance row.
async fn current_level<C: ConnectionTrait>(db: &C, user_id: i64) -> ResultEngine<i32> {
    Ok(user_progress::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .map_or(1, |model| model.current_level))
}

async fn is_vip_at<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    now: DateTime<Utc>,
) -> ResultEngine<bool> {
    Ok(vip::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .is_some_and(|membership| membership.is_active_at(now)))
}

async fn load_levels<C: ConnectionTrait>(db: &C) -> ResultEngine<Vec<crate::Level>> {
    let models = levels::Entity::find()
        .order_by_asc(levels::Column::MinPoints)
        .all(db)
        .await?;
    models.into_iter().map(crate::Level::try_from).collect()
}

/// Writes a new cached level without touching the balance or its version.
async fn store_level<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    level: i32,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    user_progress::Entity::update_many()
        .col_expr(user_progress::Column::CurrentLevel, Expr::value(level))
        .col_expr(user_progress::Column::UpdatedAt, Expr::value(now))
        .filter(user_progress::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(())
}

fn missing(label: &str) -> EngineError {
    EngineError::KeyNotFound(format!("{label} not exists"))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    settings: EngineSettings,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> EngineBuilder {
        self.settings = settings;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        if self.settings.daily_gift_besitos <= 0 {
            return Err(EngineError::InvalidAmount(
                "daily gift amount must be > 0".to_string(),
            ));
        }
        Ok(Engine {
            database: self.database,
            settings: self.settings,
            locks: UserLocks::default(),
        })
    }
}
