use chrono::{DateTime, Utc};
use uuid::Uuid;

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    EngineError, Mission, MissionNew, ObjectiveType, ResultEngine, Reward, RewardNew, ShopItem,
    ShopItemNew, missions, rewards, shop_items,
    util::{normalize_optional_text, normalize_required_name},
    vip,
};

use super::{Engine, is_vip_at, missing, with_tx};

impl Engine {
    pub async fn create_mission(&self, new: MissionNew) -> ResultEngine<Mission> {
        let name = normalize_required_name(&new.name, "mission")?;
        if new.objective_value <= 0 {
            return Err(EngineError::InvalidCatalog(
                "objective value must be > 0".to_string(),
            ));
        }
        if new.besitos_reward < 0 {
            return Err(EngineError::InvalidCatalog(
                "besitos reward must not be negative".to_string(),
            ));
        }
        if new.required_level < 1 {
            return Err(EngineError::InvalidCatalog(
                "required level must be >= 1".to_string(),
            ));
        }
        let mut metadata = new.metadata;
        metadata.reaction = normalize_optional_text(metadata.reaction.as_deref());
        if new.objective_type == ObjectiveType::SpecificReaction && metadata.reaction.is_none() {
            return Err(EngineError::InvalidCatalog(
                "specific reaction missions need a reaction".to_string(),
            ));
        }
        if new.besitos_reward == 0 && new.reward_id.is_none() {
            return Err(EngineError::InvalidCatalog(
                "mission must pay besitos or grant a reward".to_string(),
            ));
        }

        let mission = Mission {
            id: Uuid::new_v4(),
            name,
            description: normalize_optional_text(new.description.as_deref()),
            objective_type: new.objective_type,
            objective_value: new.objective_value,
            besitos_reward: new.besitos_reward,
            reward_id: new.reward_id,
            is_active: true,
            required_level: new.required_level,
            is_vip_only: new.is_vip_only,
            metadata,
            created_at: Utc::now(),
        };
        with_tx!(self, |db_tx| {
            if let Some(reward_id) = mission.reward_id {
                rewards::Entity::find_by_id(reward_id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| missing("reward"))?;
            }
            let model = missions::ActiveModel::try_from(&mission)?;
            model.insert(&db_tx).await?;
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(
            mission_id = %mission.id,
            objective = mission.objective_type.as_str(),
            "mission created"
        );
        Ok(mission)
    }

    pub async fn set_mission_active(&self, mission_id: Uuid, active: bool) -> ResultEngine<()> {
        let updated = missions::Entity::update_many()
            .col_expr(missions::Column::IsActive, Expr::value(active))
            .filter(missions::Column::Id.eq(mission_id.to_string()))
            .exec(&self.database)
            .await?;
        if updated.rows_affected == 0 {
            return Err(missing("mission"));
        }
        Ok(())
    }

    pub async fn missions(&self) -> ResultEngine<Vec<Mission>> {
        missions::Entity::find()
            .order_by_asc(missions::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Mission::try_from)
            .collect()
    }

    pub async fn mission(&self, mission_id: Uuid) -> ResultEngine<Mission> {
        let model = missions::Entity::find_by_id(mission_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| missing("mission"))?;
        Mission::try_from(model)
    }

    pub async fn create_reward(&self, new: RewardNew) -> ResultEngine<Reward> {
        let name = normalize_required_name(&new.name, "reward")?;
        new.payload.validate()?;
        if new.cost_besitos.is_some_and(|cost| cost <= 0) {
            return Err(EngineError::InvalidCatalog(
                "reward cost must be > 0".to_string(),
            ));
        }
        if new.unlock.min_level.is_some_and(|level| level < 1)
            || new.unlock.min_besitos.is_some_and(|besitos| besitos < 0)
        {
            return Err(EngineError::InvalidCatalog(
                "invalid unlock condition".to_string(),
            ));
        }

        let reward = Reward {
            id: Uuid::new_v4(),
            name,
            description: normalize_optional_text(new.description.as_deref()),
            payload: new.payload,
            cost_besitos: new.cost_besitos,
            unlock: new.unlock,
            is_active: true,
            created_at: Utc::now(),
        };
        with_tx!(self, |db_tx| {
            if let Some(mission_id) = reward.unlock.mission_id {
                missions::Entity::find_by_id(mission_id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| missing("mission"))?;
            }
            let model = rewards::ActiveModel::try_from(&reward)?;
            model.insert(&db_tx).await?;
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(
            reward_id = %reward.id,
            reward_type = reward.reward_type().as_str(),
            "reward created"
        );
        Ok(reward)
    }

    pub async fn set_reward_active(&self, reward_id: Uuid, active: bool) -> ResultEngine<()> {
        let updated = rewards::Entity::update_many()
            .col_expr(rewards::Column::IsActive, Expr::value(active))
            .filter(rewards::Column::Id.eq(reward_id.to_string()))
            .exec(&self.database)
            .await?;
        if updated.rows_affected == 0 {
            return Err(missing("reward"));
        }
        Ok(())
    }

    /// Reward catalog. Secret badges are left out unless `include_secret`.
    pub async fn rewards(&self, include_secret: bool) -> ResultEngine<Vec<Reward>> {
        let all = rewards::Entity::find()
            .order_by_asc(rewards::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Reward::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(all
            .into_iter()
            .filter(|reward| include_secret || !reward.payload.is_secret())
            .collect())
    }

    pub async fn create_shop_item(&self, new: ShopItemNew) -> ResultEngine<ShopItem> {
        let name = normalize_required_name(&new.name, "shop item")?;
        if new.price <= 0 {
            return Err(EngineError::InvalidCatalog(
                "price must be > 0".to_string(),
            ));
        }
        if new.stock.is_some_and(|stock| stock < 0) {
            return Err(EngineError::InvalidCatalog(
                "stock must not be negative".to_string(),
            ));
        }
        if new.max_per_user.is_some_and(|max| max <= 0) {
            return Err(EngineError::InvalidCatalog(
                "max per user must be > 0".to_string(),
            ));
        }

        let item = ShopItem {
            id: Uuid::new_v4(),
            name,
            description: normalize_optional_text(new.description.as_deref()),
            item_type: new.item_type,
            price: new.price,
            stock: new.stock,
            max_per_user: new.max_per_user,
            is_vip_only: new.is_vip_only,
            is_active: true,
            created_at: Utc::now(),
        };
        let model: shop_items::ActiveModel = (&item).into();
        model.insert(&self.database).await?;
        tracing::info!(item_id = %item.id, price = item.price, "shop item created");
        Ok(item)
    }

    pub async fn set_shop_item_active(&self, item_id: Uuid, active: bool) -> ResultEngine<()> {
        let updated = shop_items::Entity::update_many()
            .col_expr(shop_items::Column::IsActive, Expr::value(active))
            .filter(shop_items::Column::Id.eq(item_id.to_string()))
            .exec(&self.database)
            .await?;
        if updated.rows_affected == 0 {
            return Err(missing("shop item"));
        }
        Ok(())
    }

    /// Adds units to a stocked item. Unlimited items are left unlimited.
    pub async fn restock_shop_item(&self, item_id: Uuid, units: i64) -> ResultEngine<ShopItem> {
        if units <= 0 {
            return Err(EngineError::InvalidAmount(
                "restock units must be > 0".to_string(),
            ));
        }
        shop_items::Entity::update_many()
            .col_expr(
                shop_items::Column::Stock,
                Expr::col(shop_items::Column::Stock).add(units),
            )
            .filter(shop_items::Column::Id.eq(item_id.to_string()))
            .filter(shop_items::Column::Stock.is_not_null())
            .exec(&self.database)
            .await?;
        self.shop_item(item_id).await
    }

    pub async fn shop_item(&self, item_id: Uuid) -> ResultEngine<ShopItem> {
        let model = shop_items::Entity::find_by_id(item_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| missing("shop item"))?;
        ShopItem::try_from(model)
    }

    /// Shop catalog; only active items unless `include_inactive`.
    pub async fn shop_items(&self, include_inactive: bool) -> ResultEngine<Vec<ShopItem>> {
        let mut query = shop_items::Entity::find().order_by_asc(shop_items::Column::Price);
        if !include_inactive {
            query = query.filter(shop_items::Column::IsActive.eq(true));
        }
        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(ShopItem::try_from)
            .collect()
    }

    /// Grants or extends VIP membership. `until: None` never expires.
    pub async fn set_vip(&self, user_id: i64, until: Option<DateTime<Utc>>) -> ResultEngine<()> {
        let now = Utc::now();
        with_tx!(self, |db_tx| {
            let existing = vip::Entity::find_by_id(user_id).one(&db_tx).await?;
            let model = vip::ActiveModel {
                user_id: ActiveValue::Set(user_id),
                expires_at: ActiveValue::Set(until),
                granted_at: ActiveValue::Set(now),
            };
            if existing.is_some() {
                model.update(&db_tx).await?;
            } else {
                model.insert(&db_tx).await?;
            }
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(user_id, until = ?until, "vip membership set");
        Ok(())
    }

    pub async fn revoke_vip(&self, user_id: i64) -> ResultEngine<()> {
        vip::Entity::delete_by_id(user_id)
            .exec(&self.database)
            .await?;
        Ok(())
    }

    pub async fn is_vip(&self, user_id: i64) -> ResultEngine<bool> {
        is_vip_at(&self.database, user_id, Utc::now()).await
    }
}
