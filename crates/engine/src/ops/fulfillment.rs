//! Reward and shop fulfillment.
//!
//! Shop purchases run in two database transactions under the user's lock:
//! the first validates, decrements stock, debits the balance and records the
//! purchase; the second delivers the inventory. If delivery fails, a third
//! transaction compensates with a refund ledger entry, restocks the item and
//! marks the purchase refunded. Reward purchases and mission grants are a
//! single transaction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{
    AcquisitionSource, DeltaCmd, EngineError, ItemKind, PurchaseCmd, PurchaseStatus,
    PurchaseTarget, ResultEngine, Reward, RewardPayload, ShopItem, ShopItemPurchase,
    TransactionKind, UserInventoryItem, UserMission, purchases, rewards, shop_items,
    user_missions,
};

use super::{
    Engine,
    balance::{AppliedDelta, apply_delta_in_tx},
    current_level,
    inventory::{InventoryGrant, grant_inventory_in_tx, owned_item, revoke_inventory_in_tx},
    is_vip_at, missing, progress_row, with_tx,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// Shop purchase history row; `None` for reward purchases.
    pub purchase_id: Option<Uuid>,
    pub quantity: i64,
    pub price_paid: i64,
    pub transaction_id: Uuid,
    pub new_balance: i64,
    /// Inventory entry that received the purchase; `None` for besitos rewards.
    pub item: Option<UserInventoryItem>,
    pub level: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRefund {
    pub purchase_id: Uuid,
    pub refunded: i64,
    pub transaction_id: Uuid,
    pub new_balance: i64,
}

/// What a reward grant changed inside the open transaction.
#[derive(Clone, Debug, Default)]
pub(crate) struct GrantOutcome {
    /// `false` when a unique reward was already owned.
    pub granted: bool,
    pub item: Option<UserInventoryItem>,
    pub transaction_id: Option<Uuid>,
    pub new_balance: Option<i64>,
}

impl Engine {
    /// Buys a shop item or a purchasable reward.
    ///
    /// Shop items are validated in order: active, stock, per-user cap, VIP
    /// gate, then the debit (`InsufficientFunds` propagates). Nothing is
    /// written when validation fails.
    pub async fn purchase(&self, cmd: PurchaseCmd) -> ResultEngine<PurchaseReceipt> {
        if cmd.quantity <= 0 {
            return Err(EngineError::InvalidAmount(
                "quantity must be > 0".to_string(),
            ));
        }
        let _guard = self.lock_user(cmd.user_id).await?;
        let now = Utc::now();
        let receipt = match cmd.target {
            PurchaseTarget::ShopItem(item_id) => {
                self.purchase_shop_item(cmd.user_id, item_id, cmd.quantity, now)
                    .await?
            }
            PurchaseTarget::Reward(reward_id) => {
                if cmd.quantity != 1 {
                    return Err(EngineError::InvalidAmount(
                        "rewards are bought one at a time".to_string(),
                    ));
                }
                self.purchase_reward(cmd.user_id, reward_id, now).await?
            }
        };
        tracing::info!(
            user_id = cmd.user_id,
            operation = "purchase",
            reference_id = %receipt.transaction_id,
            price = receipt.price_paid,
            "purchase completed"
        );
        Ok(receipt)
    }

    /// Reverses a completed shop purchase: refund credit, inventory
    /// decrement, restock, and the purchase marked refunded.
    pub async fn refund_purchase(&self, purchase_id: Uuid) -> ResultEngine<PurchaseRefund> {
        let user_id = purchases::Entity::find_by_id(purchase_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| missing("purchase"))?
            .user_id;
        let _guard = self.lock_user(user_id).await?;
        let now = Utc::now();
        let (purchase, applied) = with_tx!(self, |db_tx| {
            let purchase = load_purchase(&db_tx, purchase_id).await?;
            let applied = reverse_purchase_in_tx(&db_tx, &purchase, true, now).await?;
            Ok::<_, EngineError>((purchase, applied))
        })?;
        self.settle_level(user_id, applied.previous_level).await;
        tracing::info!(
            user_id,
            operation = "refund_purchase",
            reference_id = %purchase_id,
            amount = purchase.price_paid,
            "purchase refunded"
        );
        Ok(PurchaseRefund {
            purchase_id,
            refunded: purchase.price_paid,
            transaction_id: applied.transaction_id,
            new_balance: applied.new_balance,
        })
    }

    /// Purchase history of a user, newest first.
    pub async fn purchases(&self, user_id: i64) -> ResultEngine<Vec<ShopItemPurchase>> {
        let models = purchases::Entity::find()
            .filter(purchases::Column::UserId.eq(user_id))
            .order_by_desc(purchases::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(ShopItemPurchase::try_from).collect()
    }

    async fn purchase_shop_item(
        &self,
        user_id: i64,
        item_id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<PurchaseReceipt> {
        let (item, purchase, applied) = with_tx!(self, |db_tx| {
            let model = shop_items::Entity::find_by_id(item_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| missing("shop item"))?;
            let item = ShopItem::try_from(model)?;
            if !item.is_active {
                return Err(EngineError::NotEligible(format!(
                    "{} is not available",
                    item.name
                )));
            }
            if item.stock.is_some_and(|stock| stock < quantity) {
                return Err(EngineError::OutOfStock(item.name));
            }
            if let Some(max) = item.max_per_user {
                let bought = purchased_units(&db_tx, user_id, item.id).await?;
                if bought + quantity > max {
                    return Err(EngineError::PurchaseCapExceeded(format!(
                        "{} is limited to {max} per user",
                        item.name
                    )));
                }
            }
            if item.is_vip_only && !is_vip_at(&db_tx, user_id, now).await? {
                return Err(EngineError::NotEligible(format!(
                    "{} is reserved for VIP members",
                    item.name
                )));
            }
            let total = item
                .price
                .checked_mul(quantity)
                .ok_or_else(|| EngineError::InvalidAmount("price overflow".to_string()))?;

            if item.stock.is_some() {
                let updated = shop_items::Entity::update_many()
                    .col_expr(
                        shop_items::Column::Stock,
                        Expr::col(shop_items::Column::Stock).sub(quantity),
                    )
                    .filter(shop_items::Column::Id.eq(item.id.to_string()))
                    .filter(shop_items::Column::Stock.gte(quantity))
                    .exec(&db_tx)
                    .await?;
                if updated.rows_affected != 1 {
                    return Err(EngineError::OutOfStock(item.name));
                }
            }

            let purchase_id = Uuid::new_v4();
            let cmd = DeltaCmd::new(user_id, -total, TransactionKind::Purchase)
                .reference_id(item.id.to_string())
                .description(format!("Purchase: {} x{quantity}", item.name))
                .idempotency_key(format!("purchase:{purchase_id}"));
            let applied = apply_delta_in_tx(&db_tx, &cmd, now).await?;

            let purchase = ShopItemPurchase {
                id: purchase_id,
                user_id,
                item_id: item.id,
                quantity,
                price_paid: total,
                transaction_id: applied.transaction_id,
                status: PurchaseStatus::Completed,
                created_at: now,
            };
            let model: purchases::ActiveModel = (&purchase).into();
            model.insert(&db_tx).await?;
            Ok::<_, EngineError>((item, purchase, applied))
        })?;

        let delivered = match self.deliver_purchase(&item, &purchase, now).await {
            Ok(delivered) => delivered,
            Err(err) => {
                tracing::error!(
                    user_id,
                    operation = "purchase",
                    reference_id = %purchase.id,
                    error = %err,
                    "inventory delivery failed, compensating"
                );
                if let Err(refund_err) = self.compensate_purchase(&purchase, now).await {
                    tracing::error!(
                        user_id,
                        operation = "purchase",
                        reference_id = %purchase.id,
                        error = %refund_err,
                        "compensating refund failed; audit the ledger"
                    );
                }
                return Err(err);
            }
        };

        let level = self.settle_level(user_id, applied.previous_level).await;
        Ok(PurchaseReceipt {
            purchase_id: Some(purchase.id),
            quantity,
            price_paid: purchase.price_paid,
            transaction_id: applied.transaction_id,
            new_balance: applied.new_balance,
            item: Some(delivered),
            level,
        })
    }

    async fn deliver_purchase(
        &self,
        item: &ShopItem,
        purchase: &ShopItemPurchase,
        now: DateTime<Utc>,
    ) -> ResultEngine<UserInventoryItem> {
        with_tx!(self, |db_tx| {
            let grant = InventoryGrant {
                user_id: purchase.user_id,
                kind: ItemKind::ShopItem,
                item_ref: item.id,
                name: &item.name,
                quantity: purchase.quantity,
                stackable: true,
                source: AcquisitionSource::Purchase,
                expires_at: None,
                spent: purchase.price_paid,
            };
            grant_inventory_in_tx(&db_tx, grant, now).await
        })
    }

    async fn compensate_purchase(
        &self,
        purchase: &ShopItemPurchase,
        now: DateTime<Utc>,
    ) -> ResultEngine<AppliedDelta> {
        with_tx!(self, |db_tx| {
            reverse_purchase_in_tx(&db_tx, purchase, false, now).await
        })
    }

    async fn purchase_reward(
        &self,
        user_id: i64,
        reward_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<PurchaseReceipt> {
        let (receipt, previous_level) = with_tx!(self, |db_tx| {
            let model = rewards::Entity::find_by_id(reward_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| missing("reward"))?;
            let reward = Reward::try_from(model)?;
            if !reward.is_active {
                return Err(EngineError::NotEligible(format!(
                    "{} is not available",
                    reward.name
                )));
            }
            let Some(cost) = reward.cost_besitos else {
                return Err(EngineError::NotEligible(format!(
                    "{} cannot be bought",
                    reward.name
                )));
            };
            ensure_unlocked(&db_tx, user_id, &reward, now).await?;
            if reward.payload.is_unique()
                && let Some(kind) = inventory_kind(&reward.payload)
                && owned_item(&db_tx, user_id, kind, reward.id)
                    .await?
                    .is_some_and(|owned| owned.is_active_at(now))
            {
                return Err(EngineError::PurchaseCapExceeded(format!(
                    "{} is already owned",
                    reward.name
                )));
            }

            let cmd = DeltaCmd::new(user_id, -cost, TransactionKind::Purchase)
                .reference_id(reward.id.to_string())
                .description(format!("Reward purchase: {}", reward.name));
            let debit = apply_delta_in_tx(&db_tx, &cmd, now).await?;
            let granted =
                grant_reward_in_tx(&db_tx, user_id, &reward, AcquisitionSource::Purchase, cost, now)
                    .await?;

            Ok::<_, EngineError>((
                PurchaseReceipt {
                    purchase_id: None,
                    quantity: 1,
                    price_paid: cost,
                    transaction_id: debit.transaction_id,
                    new_balance: granted.new_balance.unwrap_or(debit.new_balance),
                    item: granted.item,
                    level: debit.previous_level,
                },
                debit.previous_level,
            ))
        })?;
        let level = self.settle_level(user_id, previous_level).await;
        Ok(PurchaseReceipt { level, ..receipt })
    }
}

fn inventory_kind(payload: &RewardPayload) -> Option<ItemKind> {
    match payload {
        RewardPayload::Badge { .. } => Some(ItemKind::Badge),
        RewardPayload::Permission { .. } => Some(ItemKind::Permission),
        RewardPayload::Item { .. } => Some(ItemKind::RewardItem),
        RewardPayload::Besitos { .. } => None,
    }
}

/// Grants a reward inside an open transaction.
///
/// Badges and permissions are owned at most once; granting an owned one is
/// reported with `granted: false` and changes nothing. `spent` is what the
/// user paid for it, `0` for earned rewards.
pub(crate) async fn grant_reward_in_tx(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    reward: &Reward,
    source: AcquisitionSource,
    spent: i64,
    now: DateTime<Utc>,
) -> ResultEngine<GrantOutcome> {
    let (kind, quantity, expires_at) = match &reward.payload {
        RewardPayload::Besitos { amount } => {
            let cmd = DeltaCmd::new(user_id, *amount, TransactionKind::Reward)
                .reference_id(reward.id.to_string())
                .description(format!("Reward: {}", reward.name));
            let applied = apply_delta_in_tx(db_tx, &cmd, now).await?;
            return Ok(GrantOutcome {
                granted: true,
                item: None,
                transaction_id: Some(applied.transaction_id),
                new_balance: Some(applied.new_balance),
            });
        }
        RewardPayload::Badge { .. } => (ItemKind::Badge, 1, None),
        RewardPayload::Permission { duration_days, .. } => (
            ItemKind::Permission,
            1,
            duration_days.map(|days| now + Duration::days(days)),
        ),
        RewardPayload::Item { quantity } => (ItemKind::RewardItem, *quantity, None),
    };

    let stackable = !reward.payload.is_unique();
    if !stackable
        && owned_item(db_tx, user_id, kind, reward.id)
            .await?
            .is_some_and(|owned| owned.is_active_at(now))
    {
        tracing::debug!(user_id, reward_id = %reward.id, "reward already owned, not granted again");
        return Ok(GrantOutcome::default());
    }

    let grant = InventoryGrant {
        user_id,
        kind,
        item_ref: reward.id,
        name: &reward.name,
        quantity,
        stackable,
        source,
        expires_at,
        spent,
    };
    let item = grant_inventory_in_tx(db_tx, grant, now).await?;
    Ok(GrantOutcome {
        granted: true,
        item: Some(item),
        transaction_id: None,
        new_balance: None,
    })
}

/// Checks every unlock condition of a reward.
async fn ensure_unlocked(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    reward: &Reward,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    let unlock = &reward.unlock;
    if let Some(mission_id) = unlock.mission_id {
        let done = user_missions::Entity::find()
            .filter(user_missions::Column::UserId.eq(user_id))
            .filter(user_missions::Column::MissionId.eq(mission_id.to_string()))
            .one(db_tx)
            .await?
            .map(UserMission::try_from)
            .transpose()?
            .is_some_and(|row| row.is_completed() || row.claimed_at.is_some());
        if !done {
            return Err(EngineError::NotEligible(format!(
                "{} requires completing a mission first",
                reward.name
            )));
        }
    }
    if let Some(min_level) = unlock.min_level
        && current_level(db_tx, user_id).await? < min_level
    {
        return Err(EngineError::NotEligible(format!(
            "{} requires level {min_level}",
            reward.name
        )));
    }
    if let Some(min_besitos) = unlock.min_besitos
        && progress_row(db_tx, user_id, now).await?.besitos_balance < min_besitos
    {
        return Err(EngineError::NotEligible(format!(
            "{} requires a balance of {min_besitos} besitos",
            reward.name
        )));
    }
    Ok(())
}

/// Units of a shop item the user bought and kept (refunds excluded), used or not.
async fn purchased_units(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    item_id: Uuid,
) -> ResultEngine<i64> {
    Ok(purchases::Entity::find()
        .filter(purchases::Column::UserId.eq(user_id))
        .filter(purchases::Column::ItemId.eq(item_id.to_string()))
        .filter(purchases::Column::Status.eq(PurchaseStatus::Completed.as_str()))
        .all(db_tx)
        .await?
        .iter()
        .map(|purchase| purchase.quantity)
        .sum())
}

async fn load_purchase(
    db_tx: &DatabaseTransaction,
    purchase_id: Uuid,
) -> ResultEngine<ShopItemPurchase> {
    let model = purchases::Entity::find_by_id(purchase_id.to_string())
        .one(db_tx)
        .await?
        .ok_or_else(|| missing("purchase"))?;
    ShopItemPurchase::try_from(model)
}

/// Refund credit, restock, optional inventory revocation, and status flip.
///
/// With `revoke_inventory`, every purchased unit must still be owned: used
/// units cannot be handed back, so the purchase is not refundable.
async fn reverse_purchase_in_tx(
    db_tx: &DatabaseTransaction,
    purchase: &ShopItemPurchase,
    revoke_inventory: bool,
    now: DateTime<Utc>,
) -> ResultEngine<AppliedDelta> {
    if revoke_inventory && purchase.status == PurchaseStatus::Completed {
        let owned = owned_item(db_tx, purchase.user_id, ItemKind::ShopItem, purchase.item_id)
            .await?
            .map_or(0, |item| item.quantity);
        if owned < purchase.quantity {
            return Err(EngineError::NotEligible(format!(
                "only {owned} of {} purchased units are still owned",
                purchase.quantity
            )));
        }
    }

    let flipped = purchases::Entity::update_many()
        .col_expr(
            purchases::Column::Status,
            Expr::value(PurchaseStatus::Refunded.as_str()),
        )
        .filter(purchases::Column::Id.eq(purchase.id.to_string()))
        .filter(purchases::Column::Status.eq(PurchaseStatus::Completed.as_str()))
        .exec(db_tx)
        .await?;
    if flipped.rows_affected != 1 {
        return Err(EngineError::ExistingKey(format!(
            "purchase {} already refunded",
            purchase.id
        )));
    }

    let cmd = DeltaCmd::new(purchase.user_id, purchase.price_paid, TransactionKind::Refund)
        .reference_id(purchase.id.to_string())
        .description("Purchase refund")
        .idempotency_key(format!("refund:{}", purchase.id));
    let applied = apply_delta_in_tx(db_tx, &cmd, now).await?;

    shop_items::Entity::update_many()
        .col_expr(
            shop_items::Column::Stock,
            Expr::col(shop_items::Column::Stock).add(purchase.quantity),
        )
        .filter(shop_items::Column::Id.eq(purchase.item_id.to_string()))
        .filter(shop_items::Column::Stock.is_not_null())
        .exec(db_tx)
        .await?;

    if revoke_inventory {
        revoke_inventory_in_tx(
            db_tx,
            purchase.user_id,
            ItemKind::ShopItem,
            purchase.item_id,
            purchase.quantity,
            purchase.price_paid,
            now,
        )
        .await?;
    }
    Ok(applied)
}
