//! Mission catalog, per-user mission state and progress deduplication keys.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Missions {
    Table,
    Id,
    Name,
    Description,
    ObjectiveType,
    ObjectiveValue,
    BesitosReward,
    RewardId,
    IsActive,
    RequiredLevel,
    IsVipOnly,
    Metadata,
    CreatedAt,
}

#[derive(Iden)]
enum UserMissions {
    Table,
    Id,
    UserId,
    MissionId,
    State,
    CurrentProgress,
    StartedAt,
    CompletedAt,
    ClaimedAt,
    LastResetAt,
}

#[derive(Iden)]
enum ProgressEvents {
    Table,
    UserId,
    IdempotencyKey,
    Objective,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Missions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Missions::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Missions::Name).string().not_null())
                    .col(ColumnDef::new(Missions::Description).string())
                    .col(ColumnDef::new(Missions::ObjectiveType).string().not_null())
                    .col(
                        ColumnDef::new(Missions::ObjectiveValue)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Missions::BesitosReward)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Missions::RewardId).string())
                    .col(
                        ColumnDef::new(Missions::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Missions::RequiredLevel)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Missions::IsVipOnly)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Missions::Metadata)
                            .string()
                            .not_null()
                            .default("{}"),
                    )
                    .col(ColumnDef::new(Missions::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserMissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserMissions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserMissions::UserId).big_integer().not_null())
                    .col(ColumnDef::new(UserMissions::MissionId).string().not_null())
                    .col(ColumnDef::new(UserMissions::State).string().not_null())
                    .col(
                        ColumnDef::new(UserMissions::CurrentProgress)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserMissions::StartedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserMissions::CompletedAt).timestamp())
                    .col(ColumnDef::new(UserMissions::ClaimedAt).timestamp())
                    .col(
                        ColumnDef::new(UserMissions::LastResetAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-user_missions-mission_id")
                            .from(UserMissions::Table, UserMissions::MissionId)
                            .to(Missions::Table, Missions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-user_missions-user_id-mission_id-unique")
                    .table(UserMissions::Table)
                    .col(UserMissions::UserId)
                    .col(UserMissions::MissionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProgressEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProgressEvents::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProgressEvents::IdempotencyKey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProgressEvents::Objective).string().not_null())
                    .col(
                        ColumnDef::new(ProgressEvents::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ProgressEvents::UserId)
                            .col(ProgressEvents::IdempotencyKey),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProgressEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserMissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Missions::Table).to_owned())
            .await?;
        Ok(())
    }
}
