use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Statement};

use engine::{
    BadgeRarity, EngineError, MissionNew, MissionState, ObjectiveType, ProgressCmd, RewardNew,
    RewardPayload,
};

mod common;

use common::{engine_with_db, grant};

async fn progress_of(engine: &engine::Engine, user_id: i64, mission_id: uuid::Uuid) -> (MissionState, i64) {
    let view = engine
        .list_user_missions(user_id)
        .await
        .unwrap()
        .into_iter()
        .find(|view| view.mission.id == mission_id)
        .unwrap();
    let progress = view.progress.unwrap();
    (progress.state, progress.current_progress)
}

#[tokio::test]
async fn fifth_increment_completes_and_claim_pays_once() {
    let (engine, _db) = engine_with_db().await;
    let mission = engine
        .create_mission(MissionNew::new("React five times", ObjectiveType::OneTimeCount, 5, 20))
        .await
        .unwrap();
    assert!(engine.start_mission(1, mission.id).await.unwrap());
    assert!(!engine.start_mission(1, mission.id).await.unwrap());

    for _ in 0..4 {
        let done = engine
            .record_progress(ProgressCmd::new(1, ObjectiveType::OneTimeCount, 1))
            .await
            .unwrap();
        assert!(done.is_empty());
    }
    assert_eq!(
        progress_of(&engine, 1, mission.id).await,
        (MissionState::InProgress, 4)
    );
    let err = engine.claim_reward(1, mission.id).await.unwrap_err();
    assert_eq!(err, EngineError::MissionNotCompleted);

    let done = engine
        .record_progress(ProgressCmd::new(1, ObjectiveType::OneTimeCount, 1))
        .await
        .unwrap();
    assert_eq!(done, vec![mission.id]);
    assert_eq!(
        progress_of(&engine, 1, mission.id).await,
        (MissionState::Completed, 5)
    );

    let claim = engine.claim_reward(1, mission.id).await.unwrap();
    assert_eq!(claim.besitos_granted, 20);
    assert_eq!(claim.new_balance, 20);
    assert_eq!(claim.state, MissionState::Claimed);
    assert!(claim.transaction_id.is_some());

    let err = engine.claim_reward(1, mission.id).await.unwrap_err();
    assert_eq!(err, EngineError::AlreadyClaimed);
    assert_eq!(engine.balance(1).await.unwrap(), 20);
}

#[tokio::test]
async fn progress_clamps_at_objective_value() {
    let (engine, _db) = engine_with_db().await;
    let mission = engine
        .create_mission(MissionNew::new("Burst", ObjectiveType::OneTimeCount, 3, 5))
        .await
        .unwrap();
    engine.start_mission(2, mission.id).await.unwrap();

    engine
        .record_progress(ProgressCmd::new(2, ObjectiveType::OneTimeCount, 10))
        .await
        .unwrap();
    assert_eq!(
        progress_of(&engine, 2, mission.id).await,
        (MissionState::Completed, 3)
    );
}

#[tokio::test]
async fn duplicate_progress_keys_count_once() {
    let (engine, _db) = engine_with_db().await;
    let mission = engine
        .create_mission(MissionNew::new("Twice", ObjectiveType::OneTimeCount, 2, 5))
        .await
        .unwrap();
    engine.start_mission(3, mission.id).await.unwrap();

    for _ in 0..3 {
        engine
            .record_progress(
                ProgressCmd::new(3, ObjectiveType::OneTimeCount, 1).idempotency_key("msg-42"),
            )
            .await
            .unwrap();
    }
    assert_eq!(
        progress_of(&engine, 3, mission.id).await,
        (MissionState::InProgress, 1)
    );

    engine
        .record_reaction(3, "heart", Some("msg-43"))
        .await
        .unwrap();
    engine
        .record_reaction(3, "heart", Some("msg-43"))
        .await
        .unwrap();
    assert_eq!(
        progress_of(&engine, 3, mission.id).await,
        (MissionState::Completed, 2)
    );
}

#[tokio::test]
async fn specific_reaction_missions_only_count_their_reaction() {
    let (engine, _db) = engine_with_db().await;
    let mission = engine
        .create_mission(
            MissionNew::new("Fire fan", ObjectiveType::SpecificReaction, 2, 10).reaction("fire"),
        )
        .await
        .unwrap();
    engine.start_mission(4, mission.id).await.unwrap();

    engine.record_reaction(4, "heart", None).await.unwrap();
    engine.record_reaction(4, "fire", None).await.unwrap();
    assert_eq!(
        progress_of(&engine, 4, mission.id).await,
        (MissionState::InProgress, 1)
    );
    let done = engine.record_reaction(4, "fire", None).await.unwrap();
    assert_eq!(done, vec![mission.id]);
}

#[tokio::test]
async fn daily_missions_reset_at_the_next_local_day() {
    let (engine, _db) = engine_with_db().await;
    let mission = engine
        .create_mission(MissionNew::new("Daily pair", ObjectiveType::DailyCount, 2, 15))
        .await
        .unwrap();
    engine.start_mission(5, mission.id).await.unwrap();

    let today = Utc::now();
    let tomorrow = today + Duration::days(1);
    engine.record_reaction_at(5, "heart", None, today).await.unwrap();
    engine.record_reaction_at(5, "heart", None, today).await.unwrap();

    let claim = engine.claim_reward_at(5, mission.id, today).await.unwrap();
    assert_eq!(claim.state, MissionState::NotStarted);
    let err = engine.claim_reward_at(5, mission.id, today).await.unwrap_err();
    assert_eq!(err, EngineError::AlreadyClaimed);

    // Reactions after the claim but before midnight do not count.
    engine.record_reaction_at(5, "heart", None, today).await.unwrap();

    let views = engine.list_user_missions_at(5, tomorrow).await.unwrap();
    let progress = views[0].progress.clone().unwrap();
    assert_eq!(progress.state, MissionState::InProgress);
    assert_eq!(progress.current_progress, 0);

    engine.record_reaction_at(5, "heart", None, tomorrow).await.unwrap();
    let done = engine
        .record_reaction_at(5, "heart", None, tomorrow)
        .await
        .unwrap();
    assert_eq!(done, vec![mission.id]);
    let claim = engine.claim_reward_at(5, mission.id, tomorrow).await.unwrap();
    assert_eq!(claim.new_balance, 30);
}

#[tokio::test]
async fn unclaimed_daily_completion_is_dropped_at_the_boundary() {
    let (engine, _db) = engine_with_db().await;
    let mission = engine
        .create_mission(MissionNew::new("Daily one", ObjectiveType::DailyCount, 1, 5))
        .await
        .unwrap();
    engine.start_mission(6, mission.id).await.unwrap();

    let today = Utc::now();
    engine.record_reaction_at(6, "heart", None, today).await.unwrap();
    let err = engine
        .claim_reward_at(6, mission.id, today + Duration::days(1))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::MissionNotCompleted);
}

#[tokio::test]
async fn refused_claim_still_stores_the_daily_reset() {
    let (engine, db) = engine_with_db().await;
    let mission = engine
        .create_mission(MissionNew::new("Daily kiss", ObjectiveType::DailyCount, 1, 5))
        .await
        .unwrap();
    engine.start_mission(7, mission.id).await.unwrap();

    let today = Utc::now();
    let tomorrow = today + Duration::days(1);
    engine.record_reaction_at(7, "heart", None, today).await.unwrap();
    let err = engine
        .claim_reward_at(7, mission.id, tomorrow)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::MissionNotCompleted);

    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT state, current_progress, completed_at FROM user_missions WHERE user_id = 7",
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.try_get::<String>("", "state").unwrap(), "in_progress");
    assert_eq!(row.try_get::<i64>("", "current_progress").unwrap(), 0);
    assert!(
        row.try_get::<Option<String>>("", "completed_at")
            .unwrap()
            .is_none()
    );
    assert_eq!(engine.balance(7).await.unwrap(), 0);
}

#[tokio::test]
async fn gated_missions_cannot_be_started() {
    let (engine, _db) = engine_with_db().await;
    let high = engine
        .create_mission(
            MissionNew::new("Veterans", ObjectiveType::OneTimeCount, 1, 5).required_level(2),
        )
        .await
        .unwrap();
    let vip = engine
        .create_mission(MissionNew::new("Inner circle", ObjectiveType::OneTimeCount, 1, 5).vip_only(true))
        .await
        .unwrap();

    let available = engine.available_missions(7).await.unwrap();
    assert!(available.is_empty());
    assert!(!engine.start_mission(7, high.id).await.unwrap());
    assert!(!engine.start_mission(7, vip.id).await.unwrap());

    grant(&engine, 7, 100).await;
    engine.set_vip(7, None).await.unwrap();
    assert_eq!(engine.available_missions(7).await.unwrap().len(), 2);
    assert!(engine.start_mission(7, high.id).await.unwrap());
    assert!(engine.start_mission(7, vip.id).await.unwrap());
}

#[tokio::test]
async fn claim_grants_the_attached_reward() {
    let (engine, _db) = engine_with_db().await;
    let badge = engine
        .create_reward(RewardNew::new(
            "First steps",
            RewardPayload::Badge {
                rarity: BadgeRarity::Common,
                is_secret: false,
                icon: None,
            },
        ))
        .await
        .unwrap();
    let mission = engine
        .create_mission(
            MissionNew::new("Say hi", ObjectiveType::OneTimeCount, 1, 0).reward_id(badge.id),
        )
        .await
        .unwrap();
    engine.start_mission(8, mission.id).await.unwrap();
    engine.record_reaction(8, "wave", None).await.unwrap();

    let claim = engine.claim_reward(8, mission.id).await.unwrap();
    assert_eq!(claim.reward_id, Some(badge.id));
    assert_eq!(claim.transaction_id, None);
    assert_eq!(claim.new_balance, 0);

    let badges = engine.badges(8).await.unwrap();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0].reward.id, badge.id);
    assert_eq!(engine.get_profile_summary(8).await.unwrap().missions_completed, 1);
}

#[tokio::test]
async fn catalog_rejects_missions_without_payout() {
    let (engine, _db) = engine_with_db().await;
    let err = engine
        .create_mission(MissionNew::new("Nothing", ObjectiveType::OneTimeCount, 1, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCatalog(_)));

    let err = engine
        .create_mission(MissionNew::new("No reaction", ObjectiveType::SpecificReaction, 1, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCatalog(_)));
}

#[tokio::test]
async fn inactive_missions_stop_advancing() {
    let (engine, _db) = engine_with_db().await;
    let mission = engine
        .create_mission(MissionNew::new("Paused", ObjectiveType::OneTimeCount, 2, 5))
        .await
        .unwrap();
    engine.start_mission(9, mission.id).await.unwrap();
    engine.set_mission_active(mission.id, false).await.unwrap();

    engine.record_reaction(9, "heart", None).await.unwrap();
    assert!(engine.list_user_missions(9).await.unwrap().is_empty());
    assert!(!engine.mission(mission.id).await.unwrap().is_active);
}
