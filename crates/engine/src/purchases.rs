//! Shop purchase history.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Completed,
    Refunded,
}

impl PurchaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Refunded => "refunded",
        }
    }
}

impl TryFrom<&str> for PurchaseStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "completed" => Ok(Self::Completed),
            "refunded" => Ok(Self::Refunded),
            other => Err(EngineError::InvalidCatalog(format!(
                "invalid purchase status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopItemPurchase {
    pub id: Uuid,
    pub user_id: i64,
    pub item_id: Uuid,
    pub quantity: i64,
    pub price_paid: i64,
    /// Ledger row of the debit.
    pub transaction_id: Uuid,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shop_item_purchases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: i64,
    pub item_id: String,
    pub quantity: i64,
    pub price_paid: i64,
    pub transaction_id: String,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shop_items::Entity",
        from = "Column::ItemId",
        to = "super::shop_items::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    ShopItems,
}

impl Related<super::shop_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShopItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ShopItemPurchase> for ActiveModel {
    fn from(value: &ShopItemPurchase) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            user_id: ActiveValue::Set(value.user_id),
            item_id: ActiveValue::Set(value.item_id.to_string()),
            quantity: ActiveValue::Set(value.quantity),
            price_paid: ActiveValue::Set(value.price_paid),
            transaction_id: ActiveValue::Set(value.transaction_id.to_string()),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for ShopItemPurchase {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "purchase")?,
            user_id: model.user_id,
            item_id: parse_uuid(&model.item_id, "shop item")?,
            quantity: model.quantity,
            price_paid: model.price_paid,
            transaction_id: parse_uuid(&model.transaction_id, "transaction")?,
            status: PurchaseStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
        })
    }
}
