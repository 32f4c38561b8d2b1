//! Owned inventory entries.
//!
//! One row per `(user_id, item_kind, item_ref)`; repeated grants of a
//! stackable item raise `quantity` instead of adding rows.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// `item_ref` is a shop item id.
    ShopItem,
    /// `item_ref` is a badge reward id.
    Badge,
    /// `item_ref` is a permission reward id.
    Permission,
    /// `item_ref` is an item reward id.
    RewardItem,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShopItem => "shop_item",
            Self::Badge => "badge",
            Self::Permission => "permission",
            Self::RewardItem => "reward_item",
        }
    }
}

impl TryFrom<&str> for ItemKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "shop_item" => Ok(Self::ShopItem),
            "badge" => Ok(Self::Badge),
            "permission" => Ok(Self::Permission),
            "reward_item" => Ok(Self::RewardItem),
            other => Err(EngineError::InvalidCatalog(format!(
                "invalid inventory item kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionSource {
    Purchase,
    Reward,
    Mission,
}

impl AcquisitionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Reward => "reward",
            Self::Mission => "mission",
        }
    }
}

impl TryFrom<&str> for AcquisitionSource {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "purchase" => Ok(Self::Purchase),
            "reward" => Ok(Self::Reward),
            "mission" => Ok(Self::Mission),
            other => Err(EngineError::InvalidCatalog(format!(
                "invalid acquisition source: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInventoryItem {
    pub id: Uuid,
    pub user_id: i64,
    pub item_kind: ItemKind,
    pub item_ref: Uuid,
    pub name: String,
    pub quantity: i64,
    pub is_equipped: bool,
    pub is_used: bool,
    pub source: AcquisitionSource,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UserInventoryItem {
    /// Permissions lapse at `expires_at`; everything else never expires.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_inventory_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: i64,
    pub item_kind: String,
    pub item_ref: String,
    pub name: String,
    pub quantity: i64,
    pub is_equipped: bool,
    pub is_used: bool,
    pub source: String,
    pub acquired_at: DateTimeUtc,
    pub expires_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&UserInventoryItem> for ActiveModel {
    fn from(value: &UserInventoryItem) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            user_id: ActiveValue::Set(value.user_id),
            item_kind: ActiveValue::Set(value.item_kind.as_str().to_string()),
            item_ref: ActiveValue::Set(value.item_ref.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            quantity: ActiveValue::Set(value.quantity),
            is_equipped: ActiveValue::Set(value.is_equipped),
            is_used: ActiveValue::Set(value.is_used),
            source: ActiveValue::Set(value.source.as_str().to_string()),
            acquired_at: ActiveValue::Set(value.acquired_at),
            expires_at: ActiveValue::Set(value.expires_at),
        }
    }
}

impl TryFrom<Model> for UserInventoryItem {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "inventory item")?,
            user_id: model.user_id,
            item_kind: ItemKind::try_from(model.item_kind.as_str())?,
            item_ref: parse_uuid(&model.item_ref, "item")?,
            name: model.name,
            quantity: model.quantity,
            is_equipped: model.is_equipped,
            is_used: model.is_used,
            source: AcquisitionSource::try_from(model.source.as_str())?,
            acquired_at: model.acquired_at,
            expires_at: model.expires_at,
        })
    }
}
