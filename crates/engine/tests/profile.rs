use chrono::Utc;

use engine::{ItemType, LeaderboardKind, PurchaseCmd, ShopItemNew};

mod common;

use common::{engine_with_db, grant};

#[tokio::test]
async fn leaderboards_rank_with_user_id_tie_break() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 1, 50).await;
    grant(&engine, 3, 150).await;
    grant(&engine, 2, 150).await;
    grant(&engine, 4, 10).await;
    let item = engine
        .create_shop_item(ShopItemNew::new("Pin", ItemType::Collectible, 10))
        .await
        .unwrap();
    engine
        .purchase(PurchaseCmd::shop_item(4, item.id))
        .await
        .unwrap();

    let besitos = engine
        .get_leaderboard(LeaderboardKind::Besitos, 10)
        .await
        .unwrap();
    let ranked: Vec<(u32, i64, i64)> = besitos
        .iter()
        .map(|entry| (entry.rank, entry.user_id, entry.value))
        .collect();
    assert_eq!(ranked, vec![(1, 2, 150), (2, 3, 150), (3, 1, 50)]);

    let top = engine
        .get_leaderboard(LeaderboardKind::Besitos, 1)
        .await
        .unwrap();
    assert_eq!(top.len(), 1);

    let levels = engine
        .get_leaderboard(LeaderboardKind::Level, 10)
        .await
        .unwrap();
    let order: Vec<(i64, i64)> = levels
        .iter()
        .map(|entry| (entry.user_id, entry.value))
        .collect();
    assert_eq!(order, vec![(2, 2), (3, 2), (1, 1), (4, 1)]);
}

#[tokio::test]
async fn streak_leaderboard_skips_broken_streaks() {
    let (engine, _db) = engine_with_db().await;
    let now = Utc::now();
    let day = chrono::Duration::days(1);

    engine.claim_daily_gift_at(1, now - day * 5).await.unwrap();
    engine.claim_daily_gift_at(2, now - day).await.unwrap();
    engine.claim_daily_gift_at(2, now).await.unwrap();
    engine.claim_daily_gift_at(3, now).await.unwrap();

    let streaks = engine
        .get_leaderboard_at(LeaderboardKind::Streak, 10, now)
        .await
        .unwrap();
    let order: Vec<(i64, i64)> = streaks
        .iter()
        .map(|entry| (entry.user_id, entry.value))
        .collect();
    assert_eq!(order, vec![(2, 2), (3, 1)]);
}

#[tokio::test]
async fn profile_aggregates_every_engine() {
    let (engine, _db) = engine_with_db().await;
    let now = Utc::now();
    grant(&engine, 5, 120).await;
    engine.claim_daily_gift_at(5, now).await.unwrap();
    engine.set_vip(5, None).await.unwrap();
    let item = engine
        .create_shop_item(ShopItemNew::new("Scarf", ItemType::Cosmetic, 30))
        .await
        .unwrap();
    engine
        .purchase(PurchaseCmd::shop_item(5, item.id))
        .await
        .unwrap();

    let profile = engine.get_profile_summary_at(5, now).await.unwrap();
    assert_eq!(profile.besitos_balance, 100);
    assert_eq!(profile.level, 2);
    assert_eq!(profile.level_name.as_deref(), Some("Coqueto"));
    assert_eq!(profile.next_level_at, Some(500));
    assert_eq!(profile.total_points_earned, 130);
    assert_eq!(profile.total_points_spent, 30);
    assert_eq!(profile.current_streak, 1);
    assert!(!profile.can_claim_daily_gift);
    assert_eq!(profile.inventory_items, 1);
    assert_eq!(profile.badges, 0);
    assert!(profile.is_vip);
}

#[tokio::test]
async fn profile_of_unknown_user_is_empty() {
    let (engine, _db) = engine_with_db().await;

    let profile = engine.get_profile_summary(42).await.unwrap();
    assert_eq!(profile.besitos_balance, 0);
    assert_eq!(profile.level, 1);
    assert_eq!(profile.level_name.as_deref(), Some("Novato"));
    assert!(profile.can_claim_daily_gift);
    assert_eq!(profile.missions_completed, 0);
    assert!(!profile.is_vip);
    assert_eq!(engine.user_progress(42).await.unwrap(), None);
}
