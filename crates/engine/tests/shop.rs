use sea_orm::{ConnectionTrait, Statement};

use engine::{
    BadgeRarity, EngineError, ItemKind, ItemType, MissionNew, ObjectiveType, PurchaseCmd,
    PurchaseStatus, RewardNew, RewardPayload, ShopItemNew, TransactionKind,
};

mod common;

use common::{engine_with_db, grant};

#[tokio::test]
async fn purchase_above_balance_fails_without_side_effects() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 1, 100).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Golden frame", ItemType::Cosmetic, 150).stock(3))
        .await
        .unwrap();

    let err = engine
        .purchase(PurchaseCmd::shop_item(1, item.id))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientFunds {
            balance: 100,
            requested: 150,
        }
    );

    assert_eq!(engine.balance(1).await.unwrap(), 100);
    assert!(engine.inventory(1).await.unwrap().items.is_empty());
    assert!(engine.purchases(1).await.unwrap().is_empty());
    assert_eq!(engine.shop_item(item.id).await.unwrap().stock, Some(3));
}

#[tokio::test]
async fn purchase_debits_and_delivers() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 2, 100).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Sticker pack", ItemType::Consumable, 20).stock(5))
        .await
        .unwrap();

    let receipt = engine
        .purchase(PurchaseCmd::shop_item(2, item.id).quantity(2))
        .await
        .unwrap();
    assert_eq!(receipt.price_paid, 40);
    assert_eq!(receipt.new_balance, 60);
    let delivered = receipt.item.unwrap();
    assert_eq!(delivered.item_kind, ItemKind::ShopItem);
    assert_eq!(delivered.quantity, 2);

    let snapshot = engine.inventory(2).await.unwrap();
    assert_eq!(snapshot.summary.total_items, 2);
    assert_eq!(snapshot.summary.total_spent, 40);
    assert_eq!(engine.shop_item(item.id).await.unwrap().stock, Some(3));

    let history = engine.purchases(2).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PurchaseStatus::Completed);
    assert_eq!(history[0].transaction_id, receipt.transaction_id);

    let page = engine.list_ledger_page(2, 1, None).await.unwrap();
    assert_eq!(page.items[0].kind, TransactionKind::Purchase);
    assert_eq!(page.items[0].amount, -40);
}

#[tokio::test]
async fn stock_runs_out() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 1, 50).await;
    grant(&engine, 2, 50).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Last one", ItemType::Collectible, 10).stock(1))
        .await
        .unwrap();

    engine
        .purchase(PurchaseCmd::shop_item(1, item.id))
        .await
        .unwrap();
    let err = engine
        .purchase(PurchaseCmd::shop_item(2, item.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OutOfStock(_)));
    assert_eq!(engine.balance(2).await.unwrap(), 50);

    let item = engine.restock_shop_item(item.id, 2).await.unwrap();
    assert_eq!(item.stock, Some(2));
    engine
        .purchase(PurchaseCmd::shop_item(2, item.id))
        .await
        .unwrap();
}

#[tokio::test]
async fn per_user_cap_counts_purchased_units() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 3, 100).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Limited", ItemType::Collectible, 5).max_per_user(2))
        .await
        .unwrap();

    engine
        .purchase(PurchaseCmd::shop_item(3, item.id).quantity(2))
        .await
        .unwrap();
    let err = engine
        .purchase(PurchaseCmd::shop_item(3, item.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PurchaseCapExceeded(_)));
    assert_eq!(engine.balance(3).await.unwrap(), 90);
}

#[tokio::test]
async fn used_consumables_still_count_toward_the_cap() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 3, 100).await;
    let tonic = engine
        .create_shop_item(ShopItemNew::new("Tonic", ItemType::Consumable, 10).max_per_user(1))
        .await
        .unwrap();

    let row = engine
        .purchase(PurchaseCmd::shop_item(3, tonic.id))
        .await
        .unwrap()
        .item
        .unwrap();
    let used = engine.use_item(3, row.id).await.unwrap();
    assert!(used.is_used);

    let err = engine
        .purchase(PurchaseCmd::shop_item(3, tonic.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PurchaseCapExceeded(_)));
    assert_eq!(engine.balance(3).await.unwrap(), 90);
}

#[tokio::test]
async fn refunded_units_free_the_cap() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 3, 100).await;
    let pin = engine
        .create_shop_item(ShopItemNew::new("Pin", ItemType::Collectible, 10).max_per_user(1))
        .await
        .unwrap();

    let receipt = engine
        .purchase(PurchaseCmd::shop_item(3, pin.id))
        .await
        .unwrap();
    engine
        .refund_purchase(receipt.purchase_id.unwrap())
        .await
        .unwrap();

    let receipt = engine
        .purchase(PurchaseCmd::shop_item(3, pin.id))
        .await
        .unwrap();
    assert_eq!(receipt.new_balance, 90);
}

#[tokio::test]
async fn vip_items_need_an_active_membership() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 4, 100).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Velvet room key", ItemType::Cosmetic, 30).vip_only(true))
        .await
        .unwrap();

    let err = engine
        .purchase(PurchaseCmd::shop_item(4, item.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotEligible(_)));

    let past = chrono::Utc::now() - chrono::Duration::days(1);
    engine.set_vip(4, Some(past)).await.unwrap();
    assert!(!engine.is_vip(4).await.unwrap());

    engine.set_vip(4, None).await.unwrap();
    assert!(engine.is_vip(4).await.unwrap());
    engine
        .purchase(PurchaseCmd::shop_item(4, item.id))
        .await
        .unwrap();
}

#[tokio::test]
async fn inactive_items_cannot_be_bought() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 5, 100).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Retired", ItemType::Cosmetic, 10))
        .await
        .unwrap();
    engine.set_shop_item_active(item.id, false).await.unwrap();

    let err = engine
        .purchase(PurchaseCmd::shop_item(5, item.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotEligible(_)));
    assert!(engine.shop_items(false).await.unwrap().is_empty());
    assert_eq!(engine.shop_items(true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn refund_reverses_purchase() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 6, 100).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Mug", ItemType::Collectible, 30).stock(4))
        .await
        .unwrap();
    let receipt = engine
        .purchase(PurchaseCmd::shop_item(6, item.id))
        .await
        .unwrap();
    let purchase_id = receipt.purchase_id.unwrap();

    let refund = engine.refund_purchase(purchase_id).await.unwrap();
    assert_eq!(refund.refunded, 30);
    assert_eq!(refund.new_balance, 100);

    assert!(engine.inventory(6).await.unwrap().items.is_empty());
    assert_eq!(engine.shop_item(item.id).await.unwrap().stock, Some(4));
    assert_eq!(
        engine.purchases(6).await.unwrap()[0].status,
        PurchaseStatus::Refunded
    );

    let progress = engine.user_progress(6).await.unwrap().unwrap();
    assert_eq!(progress.total_points_earned, 100);
    assert_eq!(progress.total_points_spent, 0);
    assert!(engine.audit_ledger(6).await.unwrap().is_consistent());

    let err = engine.refund_purchase(purchase_id).await.unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
    assert_eq!(engine.balance(6).await.unwrap(), 100);
}

#[tokio::test]
async fn refund_is_refused_once_units_are_used() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 6, 100).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Elixir", ItemType::Consumable, 40).stock(5))
        .await
        .unwrap();
    let receipt = engine
        .purchase(PurchaseCmd::shop_item(6, item.id).quantity(2))
        .await
        .unwrap();
    let row = receipt.item.unwrap();
    engine.use_item(6, row.id).await.unwrap();

    let err = engine
        .refund_purchase(receipt.purchase_id.unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotEligible(_)));

    assert_eq!(engine.balance(6).await.unwrap(), 20);
    assert_eq!(engine.shop_item(item.id).await.unwrap().stock, Some(3));
    assert_eq!(
        engine.purchases(6).await.unwrap()[0].status,
        PurchaseStatus::Completed
    );
    assert_eq!(engine.inventory(6).await.unwrap().items[0].quantity, 1);
    assert!(engine.audit_ledger(6).await.unwrap().is_consistent());
}

#[tokio::test]
async fn failed_delivery_refunds_and_restocks() {
    let (engine, db) = engine_with_db().await;
    grant(&engine, 6, 100).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Fragile vase", ItemType::Collectible, 30).stock(2))
        .await
        .unwrap();

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "CREATE TRIGGER block_delivery BEFORE INSERT ON user_inventory_items \
         BEGIN SELECT RAISE(ABORT, 'delivery blocked'); END;",
    ))
    .await
    .unwrap();

    engine
        .purchase(PurchaseCmd::shop_item(6, item.id))
        .await
        .unwrap_err();

    assert_eq!(engine.balance(6).await.unwrap(), 100);
    assert_eq!(engine.shop_item(item.id).await.unwrap().stock, Some(2));
    assert!(engine.inventory(6).await.unwrap().items.is_empty());

    let history = engine.purchases(6).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PurchaseStatus::Refunded);

    let page = engine.list_ledger_page(6, 10, None).await.unwrap();
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.items[0].kind, TransactionKind::Refund);
    assert_eq!(page.items[0].amount, 30);
    assert_eq!(page.items[0].balance_after, 100);
    assert_eq!(page.items[1].kind, TransactionKind::Purchase);
    assert!(engine.audit_ledger(6).await.unwrap().is_consistent());
}

#[tokio::test]
async fn consumables_are_used_and_cosmetics_equipped() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 7, 100).await;
    let potion = engine
        .create_shop_item(ShopItemNew::new("Potion", ItemType::Consumable, 5))
        .await
        .unwrap();
    let hat = engine
        .create_shop_item(ShopItemNew::new("Hat", ItemType::Cosmetic, 5))
        .await
        .unwrap();

    let potion_row = engine
        .purchase(PurchaseCmd::shop_item(7, potion.id).quantity(2))
        .await
        .unwrap()
        .item
        .unwrap();
    let hat_row = engine
        .purchase(PurchaseCmd::shop_item(7, hat.id))
        .await
        .unwrap()
        .item
        .unwrap();

    let left = engine.use_item(7, potion_row.id).await.unwrap();
    assert_eq!(left.quantity, 1);
    let left = engine.use_item(7, potion_row.id).await.unwrap();
    assert_eq!(left.quantity, 0);
    assert!(left.is_used);
    let err = engine.use_item(7, potion_row.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotEligible(_)));

    let err = engine.use_item(7, hat_row.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotEligible(_)));
    let equipped = engine.set_item_equipped(7, hat_row.id, true).await.unwrap();
    assert!(equipped.is_equipped);

    let snapshot = engine.inventory(7).await.unwrap();
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.summary.total_items, 1);
}

#[tokio::test]
async fn badge_rewards_are_owned_once() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 8, 200).await;
    let badge = engine
        .create_reward(
            RewardNew::new(
                "Night owl",
                RewardPayload::Badge {
                    rarity: BadgeRarity::Rare,
                    is_secret: true,
                    icon: None,
                },
            )
            .cost(50),
        )
        .await
        .unwrap();
    assert!(engine.rewards(false).await.unwrap().is_empty());
    assert_eq!(engine.rewards(true).await.unwrap().len(), 1);

    let receipt = engine
        .purchase(PurchaseCmd::reward(8, badge.id))
        .await
        .unwrap();
    assert_eq!(receipt.new_balance, 150);
    assert_eq!(receipt.item.unwrap().item_kind, ItemKind::Badge);

    let err = engine
        .purchase(PurchaseCmd::reward(8, badge.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PurchaseCapExceeded(_)));
    assert_eq!(engine.balance(8).await.unwrap(), 150);
    assert_eq!(engine.badges(8).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reward_unlock_conditions_are_checked() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 9, 60).await;
    let mission = engine
        .create_mission(MissionNew::new("Gatekeeper", ObjectiveType::OneTimeCount, 1, 5))
        .await
        .unwrap();
    let reward = engine
        .create_reward(
            RewardNew::new("Extra stickers", RewardPayload::Item { quantity: 3 })
                .cost(10)
                .unlocked_by_mission(mission.id),
        )
        .await
        .unwrap();
    let rich_only = engine
        .create_reward(
            RewardNew::new("Bonus", RewardPayload::Besitos { amount: 5 })
                .cost(20)
                .min_besitos(1000),
        )
        .await
        .unwrap();

    let err = engine
        .purchase(PurchaseCmd::reward(9, reward.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotEligible(_)));
    let err = engine
        .purchase(PurchaseCmd::reward(9, rich_only.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotEligible(_)));

    engine.start_mission(9, mission.id).await.unwrap();
    engine.record_reaction(9, "heart", None).await.unwrap();
    let receipt = engine
        .purchase(PurchaseCmd::reward(9, reward.id))
        .await
        .unwrap();
    assert_eq!(receipt.new_balance, 50);
    let item = receipt.item.unwrap();
    assert_eq!(item.item_kind, ItemKind::RewardItem);
    assert_eq!(item.quantity, 3);
}

#[tokio::test]
async fn catalog_validation() {
    let (engine, _db) = engine_with_db().await;
    let err = engine
        .create_shop_item(ShopItemNew::new("Free", ItemType::Cosmetic, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCatalog(_)));

    let err = engine
        .create_reward(RewardNew::new("Cheap", RewardPayload::Item { quantity: 1 }).cost(0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCatalog(_)));

    let err = engine
        .create_shop_item(ShopItemNew::new("   ", ItemType::Cosmetic, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCatalog(_)));
}
