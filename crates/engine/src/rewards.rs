//! Reward catalog.
//!
//! A reward's shape depends on its type, so the payload is a tagged enum
//! persisted as JSON next to a plain `reward_type` column used for filtering.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Badge,
    Item,
    Permission,
    Besitos,
}

impl RewardType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Badge => "badge",
            Self::Item => "item",
            Self::Permission => "permission",
            Self::Besitos => "besitos",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardPayload {
    Badge {
        rarity: BadgeRarity,
        /// Hidden from catalogs until earned.
        #[serde(default)]
        is_secret: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
    Item {
        quantity: i64,
    },
    Permission {
        permission: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_days: Option<i64>,
    },
    Besitos {
        amount: i64,
    },
}

impl RewardPayload {
    pub fn reward_type(&self) -> RewardType {
        match self {
            Self::Badge { .. } => RewardType::Badge,
            Self::Item { .. } => RewardType::Item,
            Self::Permission { .. } => RewardType::Permission,
            Self::Besitos { .. } => RewardType::Besitos,
        }
    }

    /// Badges and permissions are owned at most once.
    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Badge { .. } | Self::Permission { .. })
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Badge { is_secret: true, .. })
    }

    pub(crate) fn validate(&self) -> ResultEngine<()> {
        match self {
            Self::Item { quantity } if *quantity <= 0 => Err(EngineError::InvalidCatalog(
                "item reward quantity must be > 0".to_string(),
            )),
            Self::Besitos { amount } if *amount <= 0 => Err(EngineError::InvalidCatalog(
                "besitos reward amount must be > 0".to_string(),
            )),
            Self::Permission { permission, .. } if permission.trim().is_empty() => Err(
                EngineError::InvalidCatalog("permission name must not be empty".to_string()),
            ),
            Self::Permission {
                duration_days: Some(days),
                ..
            } if *days <= 0 => Err(EngineError::InvalidCatalog(
                "permission duration must be > 0 days".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Conditions that must all hold before a reward can be obtained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockConditions {
    pub mission_id: Option<Uuid>,
    pub min_level: Option<i32>,
    pub min_besitos: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub payload: RewardPayload,
    /// `None` means the reward is earned, never sold.
    pub cost_besitos: Option<i64>,
    pub unlock: UnlockConditions,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Reward {
    pub fn reward_type(&self) -> RewardType {
        self.payload.reward_type()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "rewards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub reward_type: String,
    pub payload: String,
    pub cost_besitos: Option<i64>,
    pub unlock_mission_id: Option<String>,
    pub unlock_level: Option<i32>,
    pub unlock_min_besitos: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&Reward> for ActiveModel {
    type Error = EngineError;

    fn try_from(value: &Reward) -> ResultEngine<Self> {
        let payload = serde_json::to_string(&value.payload)
            .map_err(|err| EngineError::InvalidCatalog(format!("invalid reward payload: {err}")))?;
        Ok(Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            description: ActiveValue::Set(value.description.clone()),
            reward_type: ActiveValue::Set(value.reward_type().as_str().to_string()),
            payload: ActiveValue::Set(payload),
            cost_besitos: ActiveValue::Set(value.cost_besitos),
            unlock_mission_id: ActiveValue::Set(value.unlock.mission_id.map(|id| id.to_string())),
            unlock_level: ActiveValue::Set(value.unlock.min_level),
            unlock_min_besitos: ActiveValue::Set(value.unlock.min_besitos),
            is_active: ActiveValue::Set(value.is_active),
            created_at: ActiveValue::Set(value.created_at),
        })
    }
}

impl TryFrom<Model> for Reward {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let payload: RewardPayload = serde_json::from_str(&model.payload).map_err(|err| {
            EngineError::InvalidCatalog(format!("invalid payload for reward {}: {err}", model.id))
        })?;
        if payload.reward_type().as_str() != model.reward_type {
            return Err(EngineError::InvalidCatalog(format!(
                "reward {} type {} does not match its payload",
                model.id, model.reward_type
            )));
        }
        Ok(Self {
            id: parse_uuid(&model.id, "reward")?,
            name: model.name,
            description: model.description,
            payload,
            cost_besitos: model.cost_besitos,
            unlock: UnlockConditions {
                mission_id: model
                    .unlock_mission_id
                    .as_deref()
                    .map(|id| parse_uuid(id, "mission"))
                    .transpose()?,
                min_level: model.unlock_level,
                min_besitos: model.unlock_min_besitos,
            },
            is_active: model.is_active,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_tagged_by_type() {
        let payload = RewardPayload::Badge {
            rarity: BadgeRarity::Epic,
            is_secret: true,
            icon: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "badge");
        assert_eq!(json["rarity"], "epic");

        let parsed: RewardPayload =
            serde_json::from_str(r#"{"type":"permission","permission":"vip_chat"}"#).unwrap();
        assert_eq!(
            parsed,
            RewardPayload::Permission {
                permission: "vip_chat".to_string(),
                duration_days: None,
            }
        );
        assert_eq!(parsed.reward_type(), RewardType::Permission);
    }

    #[test]
    fn uniqueness_follows_reward_type() {
        assert!(
            RewardPayload::Badge {
                rarity: BadgeRarity::Common,
                is_secret: false,
                icon: None,
            }
            .is_unique()
        );
        assert!(!RewardPayload::Item { quantity: 2 }.is_unique());
    }

    #[test]
    fn rejects_empty_payloads() {
        assert!(RewardPayload::Besitos { amount: 0 }.validate().is_err());
        assert!(RewardPayload::Item { quantity: -1 }.validate().is_err());
        assert!(
            RewardPayload::Permission {
                permission: " ".to_string(),
                duration_days: None,
            }
            .validate()
            .is_err()
        );
    }
}
