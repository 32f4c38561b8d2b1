//! Ledger primitives.
//!
//! A [`BesitoTransaction`] is an immutable record of one balance change.
//! Rows are insert-only: corrections are new rows (`refund`, `adjustment`),
//! never updates.
//!
//! For every user, summing `amount` over rows ordered by `seq` reproduces the
//! cached balance, and each row's `balance_after` is the running sum through
//! that row.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Grant,
    Purchase,
    MissionReward,
    DailyGift,
    Reaction,
    Reward,
    Refund,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Purchase => "purchase",
            Self::MissionReward => "mission_reward",
            Self::DailyGift => "daily_gift",
            Self::Reaction => "reaction",
            Self::Reward => "reward",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
        }
    }

    /// Folds a committed amount into the lifetime `(earned, spent)` counters.
    ///
    /// Refunds give spent besitos back, so they shrink `spent` instead of
    /// growing `earned`. Levels are derived from `earned` only.
    pub(crate) fn apply_to_totals(self, amount: i64, earned: i64, spent: i64) -> (i64, i64) {
        match (self, amount.signum()) {
            (Self::Refund, 1) => (earned, (spent - amount).max(0)),
            (_, 1) => (earned + amount, spent),
            (_, -1) => (earned, spent + amount.abs()),
            _ => (earned, spent),
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "grant" => Ok(Self::Grant),
            "purchase" => Ok(Self::Purchase),
            "mission_reward" => Ok(Self::MissionReward),
            "daily_gift" => Ok(Self::DailyGift),
            "reaction" => Ok(Self::Reaction),
            "reward" => Ok(Self::Reward),
            "refund" => Ok(Self::Refund),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BesitoTransaction {
    pub id: Uuid,
    pub user_id: i64,
    /// Per-user position in the ledger, starting at 1.
    pub seq: i64,
    pub amount: i64,
    pub kind: TransactionKind,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub balance_after: i64,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "besito_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: i64,
    pub seq: i64,
    pub amount: i64,
    pub kind: String,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub balance_after: i64,
    pub idempotency_key: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user_progress::Entity",
        from = "Column::UserId",
        to = "super::user_progress::Column::UserId",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    UserProgress,
}

impl Related<super::user_progress::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserProgress.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BesitoTransaction> for ActiveModel {
    fn from(tx: &BesitoTransaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            user_id: ActiveValue::Set(tx.user_id),
            seq: ActiveValue::Set(tx.seq),
            amount: ActiveValue::Set(tx.amount),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            reference_id: ActiveValue::Set(tx.reference_id.clone()),
            description: ActiveValue::Set(tx.description.clone()),
            balance_after: ActiveValue::Set(tx.balance_after),
            idempotency_key: ActiveValue::Set(tx.idempotency_key.clone()),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for BesitoTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            user_id: model.user_id,
            seq: model.seq,
            amount: model.amount,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            reference_id: model.reference_id,
            description: model.description,
            balance_after: model.balance_after,
            idempotency_key: model.idempotency_key,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_grow_earned_and_debits_grow_spent() {
        assert_eq!(TransactionKind::DailyGift.apply_to_totals(10, 0, 0), (10, 0));
        assert_eq!(TransactionKind::Purchase.apply_to_totals(-40, 10, 0), (10, 40));
        assert_eq!(TransactionKind::Adjustment.apply_to_totals(-5, 10, 40), (10, 45));
    }

    #[test]
    fn refunds_shrink_spent_without_touching_earned() {
        assert_eq!(TransactionKind::Refund.apply_to_totals(40, 10, 45), (10, 5));
        assert_eq!(TransactionKind::Refund.apply_to_totals(40, 10, 15), (10, 0));
    }

    #[test]
    fn kind_round_trips_through_storage_name() {
        for kind in [
            TransactionKind::Grant,
            TransactionKind::MissionReward,
            TransactionKind::Refund,
        ] {
            assert_eq!(TransactionKind::try_from(kind.as_str()), Ok(kind));
        }
        assert!(TransactionKind::try_from("bonus").is_err());
    }
}
