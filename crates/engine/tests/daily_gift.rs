use chrono::{Duration, NaiveDate, TimeZone, Utc};

use engine::{EngineError, EngineSettings, MissionNew, ObjectiveType, TransactionKind};

mod common;

use common::{engine_with_db, engine_with_settings, grant, noon};

#[tokio::test]
async fn streak_extends_on_consecutive_days_and_resets_after_a_gap() {
    let (engine, _db) = engine_with_db().await;
    grant(&engine, 1, 200).await;

    let day1 = engine.claim_daily_gift_at(1, noon(2030, 3, 1)).await.unwrap();
    assert_eq!(day1.besitos_granted, 10);
    assert_eq!(day1.new_balance, 210);
    assert_eq!(day1.streak.current_streak, 1);

    let day2 = engine.claim_daily_gift_at(1, noon(2030, 3, 2)).await.unwrap();
    assert_eq!(day2.new_balance, 220);
    assert_eq!(day2.streak.current_streak, 2);

    let status = engine
        .get_daily_gift_status_at(1, noon(2030, 3, 3))
        .await
        .unwrap();
    assert!(status.can_claim);
    assert_eq!(status.current_streak, 2);

    let day4 = engine.claim_daily_gift_at(1, noon(2030, 3, 4)).await.unwrap();
    assert_eq!(day4.new_balance, 230);
    assert_eq!(day4.streak.current_streak, 1);
    assert_eq!(day4.streak.longest_streak, 2);
    assert_eq!(day4.streak.total_claims, 3);
    assert_eq!(
        day4.claim_date,
        NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
    );

    let audit = engine.audit_ledger(1).await.unwrap();
    assert_eq!(audit.entries, 4);
    assert!(audit.is_consistent());
}

#[tokio::test]
async fn second_claim_on_the_same_day_is_rejected() {
    let (engine, _db) = engine_with_db().await;

    engine.claim_daily_gift_at(2, noon(2030, 3, 1)).await.unwrap();
    let late = Utc.with_ymd_and_hms(2030, 3, 1, 23, 59, 0).unwrap();
    let err = engine.claim_daily_gift_at(2, late).await.unwrap_err();
    assert_eq!(err, EngineError::AlreadyClaimedToday);

    assert_eq!(engine.balance(2).await.unwrap(), 10);
    let status = engine.get_daily_gift_status_at(2, late).await.unwrap();
    assert!(!status.can_claim);
    assert_eq!(status.total_claims, 1);

    let page = engine.list_ledger_page(2, 10, None).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].kind, TransactionKind::DailyGift);
    assert_eq!(
        page.items[0].idempotency_key.as_deref(),
        Some("daily_gift:2030-03-01")
    );
}

#[tokio::test]
async fn days_follow_the_reference_timezone() {
    let settings = EngineSettings {
        timezone: chrono_tz::America::Mexico_City,
        daily_gift_besitos: 15,
        ..EngineSettings::default()
    };
    let (engine, _db) = engine_with_settings(settings).await;

    // 03:00 UTC is still the previous evening in Mexico City; 07:00 UTC is
    // past local midnight.
    let evening = Utc.with_ymd_and_hms(2030, 1, 2, 3, 0, 0).unwrap();
    let after_midnight = Utc.with_ymd_and_hms(2030, 1, 2, 7, 0, 0).unwrap();

    let first = engine.claim_daily_gift_at(3, evening).await.unwrap();
    assert_eq!(first.claim_date, NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
    assert_eq!(first.besitos_granted, 15);

    let second = engine.claim_daily_gift_at(3, after_midnight).await.unwrap();
    assert_eq!(second.streak.current_streak, 2);
    assert_eq!(second.new_balance, 30);
}

#[tokio::test]
async fn broken_streak_reads_as_zero() {
    let (engine, _db) = engine_with_db().await;
    engine.claim_daily_gift_at(4, noon(2030, 5, 1)).await.unwrap();

    let status = engine
        .get_daily_gift_status_at(4, noon(2030, 5, 1) + Duration::days(3))
        .await
        .unwrap();
    assert_eq!(status.current_streak, 0);
    assert_eq!(status.longest_streak, 1);
    assert_eq!(status.besitos_amount, 10);
}

#[tokio::test]
async fn claim_advances_streak_missions() {
    let (engine, _db) = engine_with_db().await;
    let mission = engine
        .create_mission(MissionNew::new("Two in a row", ObjectiveType::Streak, 2, 25))
        .await
        .unwrap();
    assert!(engine.start_mission(5, mission.id).await.unwrap());

    let day1 = engine.claim_daily_gift_at(5, noon(2030, 6, 1)).await.unwrap();
    assert!(day1.completed_missions.is_empty());

    let day2 = engine.claim_daily_gift_at(5, noon(2030, 6, 2)).await.unwrap();
    assert_eq!(day2.completed_missions, vec![mission.id]);

    let claim = engine.claim_reward(5, mission.id).await.unwrap();
    assert_eq!(claim.besitos_granted, 25);
    assert_eq!(claim.new_balance, 45);
}
