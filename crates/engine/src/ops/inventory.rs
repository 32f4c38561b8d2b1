use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    AcquisitionSource, EngineError, ItemKind, ItemType, ResultEngine, Reward, ShopItem,
    UserInventory, UserInventoryItem, inventories, inventory_items, rewards, shop_items,
};

use super::{Engine, missing, with_tx};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub summary: UserInventory,
    pub items: Vec<UserInventoryItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedBadge {
    pub reward: Reward,
    pub acquired_at: DateTime<Utc>,
    pub is_equipped: bool,
}

/// One inventory delivery.
pub(crate) struct InventoryGrant<'a> {
    pub user_id: i64,
    pub kind: ItemKind,
    pub item_ref: Uuid,
    pub name: &'a str,
    pub quantity: i64,
    /// Stackable grants add to the owned quantity; others set it to 1.
    pub stackable: bool,
    pub source: AcquisitionSource,
    pub expires_at: Option<DateTime<Utc>>,
    /// Besitos paid for this grant.
    pub spent: i64,
}

impl Engine {
    pub async fn inventory(&self, user_id: i64) -> ResultEngine<InventorySnapshot> {
        let summary = inventories::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .map(UserInventory::from)
            .unwrap_or(UserInventory {
                user_id,
                ..UserInventory::default()
            });
        let items = inventory_items::Entity::find()
            .filter(inventory_items::Column::UserId.eq(user_id))
            .filter(inventory_items::Column::Quantity.gt(0))
            .order_by_asc(inventory_items::Column::AcquiredAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(UserInventoryItem::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(InventorySnapshot { summary, items })
    }

    /// Badges the user owns, with their catalog entries.
    pub async fn badges(&self, user_id: i64) -> ResultEngine<Vec<OwnedBadge>> {
        let rows = inventory_items::Entity::find()
            .filter(inventory_items::Column::UserId.eq(user_id))
            .filter(inventory_items::Column::ItemKind.eq(ItemKind::Badge.as_str()))
            .order_by_asc(inventory_items::Column::AcquiredAt)
            .all(&self.database)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let item = UserInventoryItem::try_from(row)?;
            let Some(model) = rewards::Entity::find_by_id(item.item_ref.to_string())
                .one(&self.database)
                .await?
            else {
                continue;
            };
            out.push(OwnedBadge {
                reward: Reward::try_from(model)?,
                acquired_at: item.acquired_at,
                is_equipped: item.is_equipped,
            });
        }
        Ok(out)
    }

    /// Equips or unequips an owned cosmetic item or badge.
    pub async fn set_item_equipped(
        &self,
        user_id: i64,
        item_id: Uuid,
        equipped: bool,
    ) -> ResultEngine<UserInventoryItem> {
        let _guard = self.lock_user(user_id).await?;
        with_tx!(self, |db_tx| {
            let mut item = load_owned(&db_tx, user_id, item_id).await?;
            let equippable = match item.item_kind {
                ItemKind::Badge => true,
                ItemKind::ShopItem => {
                    shop_item(&db_tx, item.item_ref).await?.item_type == ItemType::Cosmetic
                }
                ItemKind::Permission | ItemKind::RewardItem => false,
            };
            if !equippable {
                return Err(EngineError::NotEligible(format!(
                    "{} cannot be equipped",
                    item.name
                )));
            }
            item.is_equipped = equipped;
            let model: inventory_items::ActiveModel = (&item).into();
            model.update(&db_tx).await?;
            Ok(item)
        })
    }

    /// Consumes one unit of an owned consumable or reward item.
    pub async fn use_item(&self, user_id: i64, item_id: Uuid) -> ResultEngine<UserInventoryItem> {
        let _guard = self.lock_user(user_id).await?;
        let now = Utc::now();
        let item = with_tx!(self, |db_tx| {
            let mut item = load_owned(&db_tx, user_id, item_id).await?;
            let usable = match item.item_kind {
                ItemKind::RewardItem => true,
                ItemKind::ShopItem => {
                    shop_item(&db_tx, item.item_ref).await?.item_type == ItemType::Consumable
                }
                ItemKind::Badge | ItemKind::Permission => false,
            };
            if !usable {
                return Err(EngineError::NotEligible(format!(
                    "{} cannot be used",
                    item.name
                )));
            }
            if item.quantity <= 0 {
                return Err(EngineError::NotEligible(format!(
                    "{} is used up",
                    item.name
                )));
            }
            item.quantity -= 1;
            item.is_used = item.quantity == 0;
            let model: inventory_items::ActiveModel = (&item).into();
            model.update(&db_tx).await?;
            bump_totals(&db_tx, user_id, -1, 0, now).await?;
            Ok::<_, EngineError>(item)
        })?;
        tracing::debug!(user_id, item_id = %item_id, left = item.quantity, "item used");
        Ok(item)
    }
}

async fn load_owned(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    item_id: Uuid,
) -> ResultEngine<UserInventoryItem> {
    let model = inventory_items::Entity::find_by_id(item_id.to_string())
        .filter(inventory_items::Column::UserId.eq(user_id))
        .one(db_tx)
        .await?
        .ok_or_else(|| missing("inventory item"))?;
    UserInventoryItem::try_from(model)
}

async fn shop_item(db_tx: &DatabaseTransaction, item_id: Uuid) -> ResultEngine<ShopItem> {
    let model = shop_items::Entity::find_by_id(item_id.to_string())
        .one(db_tx)
        .await?
        .ok_or_else(|| missing("shop item"))?;
    ShopItem::try_from(model)
}

pub(crate) async fn owned_item(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    kind: ItemKind,
    item_ref: Uuid,
) -> ResultEngine<Option<UserInventoryItem>> {
    inventory_items::Entity::find()
        .filter(inventory_items::Column::UserId.eq(user_id))
        .filter(inventory_items::Column::ItemKind.eq(kind.as_str()))
        .filter(inventory_items::Column::ItemRef.eq(item_ref.to_string()))
        .one(db_tx)
        .await?
        .map(UserInventoryItem::try_from)
        .transpose()
}

/// Inserts or tops up an inventory entry and the user's aggregate.
pub(crate) async fn grant_inventory_in_tx(
    db_tx: &DatabaseTransaction,
    grant: InventoryGrant<'_>,
    now: DateTime<Utc>,
) -> ResultEngine<UserInventoryItem> {
    if grant.quantity <= 0 {
        return Err(EngineError::InvalidAmount(
            "granted quantity must be > 0".to_string(),
        ));
    }
    let existing = owned_item(db_tx, grant.user_id, grant.kind, grant.item_ref).await?;
    let (item, added) = match existing {
        Some(mut item) => {
            let before = item.quantity;
            item.quantity = if grant.stackable {
                before + grant.quantity
            } else {
                1
            };
            item.is_used = false;
            item.expires_at = grant.expires_at;
            let model: inventory_items::ActiveModel = (&item).into();
            model.update(db_tx).await?;
            let added = item.quantity - before;
            (item, added)
        }
        None => {
            let item = UserInventoryItem {
                id: Uuid::new_v4(),
                user_id: grant.user_id,
                item_kind: grant.kind,
                item_ref: grant.item_ref,
                name: grant.name.to_string(),
                quantity: if grant.stackable { grant.quantity } else { 1 },
                is_equipped: false,
                is_used: false,
                source: grant.source,
                acquired_at: now,
                expires_at: grant.expires_at,
            };
            let model: inventory_items::ActiveModel = (&item).into();
            model.insert(db_tx).await?;
            let added = item.quantity;
            (item, added)
        }
    };
    bump_totals(db_tx, grant.user_id, added, grant.spent, now).await?;
    Ok(item)
}

/// Takes back up to `quantity` units; the entry is removed once empty.
pub(crate) async fn revoke_inventory_in_tx(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    kind: ItemKind,
    item_ref: Uuid,
    quantity: i64,
    refunded: i64,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    let mut removed = 0;
    if let Some(mut item) = owned_item(db_tx, user_id, kind, item_ref).await? {
        removed = quantity.min(item.quantity);
        item.quantity -= removed;
        if item.quantity == 0 {
            inventory_items::Entity::delete_by_id(item.id.to_string())
                .exec(db_tx)
                .await?;
        } else {
            let model: inventory_items::ActiveModel = (&item).into();
            model.update(db_tx).await?;
        }
    }
    bump_totals(db_tx, user_id, -removed, -refunded, now).await
}

async fn bump_totals(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    items: i64,
    spent: i64,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    match inventories::Entity::find_by_id(user_id).one(db_tx).await? {
        Some(row) => {
            inventories::ActiveModel {
                user_id: ActiveValue::Unchanged(user_id),
                total_items: ActiveValue::Set((row.total_items + items).max(0)),
                total_spent: ActiveValue::Set((row.total_spent + spent).max(0)),
                updated_at: ActiveValue::Set(now),
            }
            .update(db_tx)
            .await?;
        }
        None => {
            inventories::ActiveModel {
                user_id: ActiveValue::Set(user_id),
                total_items: ActiveValue::Set(items.max(0)),
                total_spent: ActiveValue::Set(spent.max(0)),
                updated_at: ActiveValue::Set(now),
            }
            .insert(db_tx)
            .await?;
        }
    }
    Ok(())
}
