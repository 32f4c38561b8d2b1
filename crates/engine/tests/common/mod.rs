#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{DeltaCmd, Engine, EngineSettings, TransactionKind};
use migration::MigratorTrait;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_with_settings(EngineSettings::default()).await
}

pub async fn engine_with_settings(settings: EngineSettings) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .settings(settings)
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn grant(engine: &Engine, user_id: i64, amount: i64) -> i64 {
    engine
        .apply_delta(DeltaCmd::new(user_id, amount, TransactionKind::Grant))
        .await
        .unwrap()
        .new_balance
}

pub fn noon(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}
