//! Per-user balance row.
//!
//! `besitos_balance` is a denormalized cache of the ledger: it must always
//! equal the sum of the user's `besito_transactions` amounts. Only the balance
//! engine writes it, guarded by the `version` column.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: i64,
    pub besitos_balance: i64,
    pub current_level: i32,
    pub total_points_earned: i64,
    pub total_points_spent: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    /// A fresh row for a user seen for the first time.
    pub fn new(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            besitos_balance: 0,
            current_level: 1,
            total_points_earned: 0,
            total_points_spent: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_progress")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub besitos_balance: i64,
    pub current_level: i32,
    pub total_points_earned: i64,
    pub total_points_spent: i64,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&UserProgress> for ActiveModel {
    fn from(value: &UserProgress) -> Self {
        Self {
            user_id: ActiveValue::Set(value.user_id),
            besitos_balance: ActiveValue::Set(value.besitos_balance),
            current_level: ActiveValue::Set(value.current_level),
            total_points_earned: ActiveValue::Set(value.total_points_earned),
            total_points_spent: ActiveValue::Set(value.total_points_spent),
            version: ActiveValue::Set(0),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl From<Model> for UserProgress {
    fn from(model: Model) -> Self {
        Self {
            user_id: model.user_id,
            besitos_balance: model.besitos_balance,
            current_level: model.current_level,
            total_points_earned: model.total_points_earned,
            total_points_spent: model.total_points_spent,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
