//! Balance, ledger and progression schema.
//!
//! - `user_progress`: cached balance, level and lifetime counters per user
//! - `besito_transactions`: append-only ledger
//! - `levels`: level bands, seeded with a default partition
//! - `daily_gift_claims`: streak state per user
//! - `vip_memberships`: VIP gate

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum UserProgress {
    Table,
    UserId,
    BesitosBalance,
    CurrentLevel,
    TotalPointsEarned,
    TotalPointsSpent,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum BesitoTransactions {
    Table,
    Id,
    UserId,
    Seq,
    Amount,
    Kind,
    ReferenceId,
    Description,
    BalanceAfter,
    IdempotencyKey,
    CreatedAt,
}

#[derive(Iden)]
enum Levels {
    Table,
    Level,
    Name,
    MinPoints,
    MaxPoints,
    Multiplier,
    Perks,
}

#[derive(Iden)]
enum DailyGiftClaims {
    Table,
    UserId,
    LastClaimDate,
    CurrentStreak,
    LongestStreak,
    TotalClaims,
    UpdatedAt,
}

#[derive(Iden)]
enum VipMemberships {
    Table,
    UserId,
    ExpiresAt,
    GrantedAt,
}

/// `(level, name, min_points, max_points, multiplier, perks)`
const DEFAULT_LEVELS: [(i32, &str, i64, Option<i64>, f64, &str); 5] = [
    (1, "Novato", 0, Some(100), 1.0, "[]"),
    (2, "Coqueto", 100, Some(500), 1.1, r#"["Daily gift reminder"]"#),
    (3, "Seductor", 500, Some(1500), 1.2, r#"["Exclusive reactions"]"#),
    (4, "Irresistible", 1500, Some(5000), 1.3, r#"["Early shop access"]"#),
    (5, "Leyenda", 5000, None, 1.5, r#"["Legend badge frame"]"#),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserProgress::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserProgress::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserProgress::BesitosBalance)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(UserProgress::BesitosBalance).gte(0)),
                    )
                    .col(
                        ColumnDef::new(UserProgress::CurrentLevel)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(UserProgress::TotalPointsEarned)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserProgress::TotalPointsSpent)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserProgress::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserProgress::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserProgress::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BesitoTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BesitoTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BesitoTransactions::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BesitoTransactions::Seq)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BesitoTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BesitoTransactions::Kind).string().not_null())
                    .col(ColumnDef::new(BesitoTransactions::ReferenceId).string())
                    .col(ColumnDef::new(BesitoTransactions::Description).string())
                    .col(
                        ColumnDef::new(BesitoTransactions::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BesitoTransactions::IdempotencyKey).string())
                    .col(
                        ColumnDef::new(BesitoTransactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-besito_transactions-user_id")
                            .from(BesitoTransactions::Table, BesitoTransactions::UserId)
                            .to(UserProgress::Table, UserProgress::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-besito_transactions-user_id-seq-unique")
                    .table(BesitoTransactions::Table)
                    .col(BesitoTransactions::UserId)
                    .col(BesitoTransactions::Seq)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-besito_transactions-idempotency_key")
                    .table(BesitoTransactions::Table)
                    .col(BesitoTransactions::UserId)
                    .col(BesitoTransactions::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Levels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Levels::Level)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Levels::Name).string().not_null())
                    .col(ColumnDef::new(Levels::MinPoints).big_integer().not_null())
                    .col(ColumnDef::new(Levels::MaxPoints).big_integer())
                    .col(ColumnDef::new(Levels::Multiplier).double().not_null())
                    .col(ColumnDef::new(Levels::Perks).string().not_null())
                    .to_owned(),
            )
            .await?;

        let mut seed = Query::insert();
        seed.into_table(Levels::Table).columns([
            Levels::Level,
            Levels::Name,
            Levels::MinPoints,
            Levels::MaxPoints,
            Levels::Multiplier,
            Levels::Perks,
        ]);
        for (level, name, min_points, max_points, multiplier, perks) in DEFAULT_LEVELS {
            seed.values([
                level.into(),
                name.into(),
                min_points.into(),
                max_points.into(),
                multiplier.into(),
                perks.into(),
            ])
            .map_err(|err| DbErr::Migration(err.to_string()))?;
        }
        manager.exec_stmt(seed).await?;

        manager
            .create_table(
                Table::create()
                    .table(DailyGiftClaims::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyGiftClaims::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyGiftClaims::LastClaimDate).date())
                    .col(
                        ColumnDef::new(DailyGiftClaims::CurrentStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyGiftClaims::LongestStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyGiftClaims::TotalClaims)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyGiftClaims::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VipMemberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VipMemberships::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VipMemberships::ExpiresAt).timestamp())
                    .col(
                        ColumnDef::new(VipMemberships::GrantedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VipMemberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DailyGiftClaims::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Levels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BesitoTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserProgress::Table).to_owned())
            .await?;
        Ok(())
    }
}
