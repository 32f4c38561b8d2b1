//! Shop catalog.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Can be used once per unit.
    Consumable,
    /// Can be equipped.
    Cosmetic,
    Collectible,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Consumable => "consumable",
            Self::Cosmetic => "cosmetic",
            Self::Collectible => "collectible",
        }
    }
}

impl TryFrom<&str> for ItemType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "consumable" => Ok(Self::Consumable),
            "cosmetic" => Ok(Self::Cosmetic),
            "collectible" => Ok(Self::Collectible),
            other => Err(EngineError::InvalidCatalog(format!(
                "invalid item type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    pub price: i64,
    /// Remaining units; `None` is unlimited.
    pub stock: Option<i64>,
    /// Most units a single user may own; `None` is unlimited.
    pub max_per_user: Option<i64>,
    pub is_vip_only: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shop_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub item_type: String,
    pub price: i64,
    pub stock: Option<i64>,
    pub max_per_user: Option<i64>,
    pub is_vip_only: bool,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchases::Entity")]
    Purchases,
}

impl Related<super::purchases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ShopItem> for ActiveModel {
    fn from(value: &ShopItem) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            description: ActiveValue::Set(value.description.clone()),
            item_type: ActiveValue::Set(value.item_type.as_str().to_string()),
            price: ActiveValue::Set(value.price),
            stock: ActiveValue::Set(value.stock),
            max_per_user: ActiveValue::Set(value.max_per_user),
            is_vip_only: ActiveValue::Set(value.is_vip_only),
            is_active: ActiveValue::Set(value.is_active),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for ShopItem {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "shop item")?,
            name: model.name,
            description: model.description,
            item_type: ItemType::try_from(model.item_type.as_str())?,
            price: model.price,
            stock: model.stock,
            max_per_user: model.max_per_user,
            is_vip_only: model.is_vip_only,
            is_active: model.is_active,
            created_at: model.created_at,
        })
    }
}
