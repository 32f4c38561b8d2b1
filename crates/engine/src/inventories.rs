//! Per-user inventory aggregate.
//!
//! Created on first grant. `total_items` counts units currently owned and
//! `total_spent` the besitos paid for them, net of refunds.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInventory {
    pub user_id: i64,
    pub total_items: i64,
    pub total_spent: i64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_inventories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub total_items: i64,
    pub total_spent: i64,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for UserInventory {
    fn from(model: Model) -> Self {
        Self {
            user_id: model.user_id,
            total_items: model.total_items,
            total_spent: model.total_spent,
        }
    }
}
