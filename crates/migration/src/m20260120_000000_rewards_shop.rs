//! Rewards, shop catalog, inventories and purchase history.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Rewards {
    Table,
    Id,
    Name,
    Description,
    RewardType,
    Payload,
    CostBesitos,
    UnlockMissionId,
    UnlockLevel,
    UnlockMinBesitos,
    IsActive,
    CreatedAt,
}

#[derive(Iden)]
enum ShopItems {
    Table,
    Id,
    Name,
    Description,
    ItemType,
    Price,
    Stock,
    MaxPerUser,
    IsVipOnly,
    IsActive,
    CreatedAt,
}

#[derive(Iden)]
enum UserInventories {
    Table,
    UserId,
    TotalItems,
    TotalSpent,
    UpdatedAt,
}

#[derive(Iden)]
enum UserInventoryItems {
    Table,
    Id,
    UserId,
    ItemKind,
    ItemRef,
    Name,
    Quantity,
    IsEquipped,
    IsUsed,
    Source,
    AcquiredAt,
    ExpiresAt,
}

#[derive(Iden)]
enum ShopItemPurchases {
    Table,
    Id,
    UserId,
    ItemId,
    Quantity,
    PricePaid,
    TransactionId,
    Status,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rewards::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rewards::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Rewards::Name).string().not_null())
                    .col(ColumnDef::new(Rewards::Description).string())
                    .col(ColumnDef::new(Rewards::RewardType).string().not_null())
                    .col(ColumnDef::new(Rewards::Payload).string().not_null())
                    .col(ColumnDef::new(Rewards::CostBesitos).big_integer())
                    .col(ColumnDef::new(Rewards::UnlockMissionId).string())
                    .col(ColumnDef::new(Rewards::UnlockLevel).integer())
                    .col(ColumnDef::new(Rewards::UnlockMinBesitos).big_integer())
                    .col(
                        ColumnDef::new(Rewards::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Rewards::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ShopItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShopItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ShopItems::Name).string().not_null())
                    .col(ColumnDef::new(ShopItems::Description).string())
                    .col(ColumnDef::new(ShopItems::ItemType).string().not_null())
                    .col(ColumnDef::new(ShopItems::Price).big_integer().not_null())
                    .col(
                        ColumnDef::new(ShopItems::Stock)
                            .big_integer()
                            .check(Expr::col(ShopItems::Stock).gte(0)),
                    )
                    .col(ColumnDef::new(ShopItems::MaxPerUser).big_integer())
                    .col(
                        ColumnDef::new(ShopItems::IsVipOnly)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ShopItems::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ShopItems::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserInventories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserInventories::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserInventories::TotalItems)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserInventories::TotalSpent)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserInventories::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserInventoryItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserInventoryItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserInventoryItems::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserInventoryItems::ItemKind)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserInventoryItems::ItemRef).string().not_null())
                    .col(ColumnDef::new(UserInventoryItems::Name).string().not_null())
                    .col(
                        ColumnDef::new(UserInventoryItems::Quantity)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(UserInventoryItems::Quantity).gte(0)),
                    )
                    .col(
                        ColumnDef::new(UserInventoryItems::IsEquipped)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(UserInventoryItems::IsUsed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(UserInventoryItems::Source).string().not_null())
                    .col(
                        ColumnDef::new(UserInventoryItems::AcquiredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserInventoryItems::ExpiresAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-user_inventory_items-user_id-kind-ref-unique")
                    .table(UserInventoryItems::Table)
                    .col(UserInventoryItems::UserId)
                    .col(UserInventoryItems::ItemKind)
                    .col(UserInventoryItems::ItemRef)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ShopItemPurchases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShopItemPurchases::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ShopItemPurchases::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShopItemPurchases::ItemId).string().not_null())
                    .col(
                        ColumnDef::new(ShopItemPurchases::Quantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopItemPurchases::PricePaid)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopItemPurchases::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShopItemPurchases::Status).string().not_null())
                    .col(
                        ColumnDef::new(ShopItemPurchases::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-shop_item_purchases-item_id")
                            .from(ShopItemPurchases::Table, ShopItemPurchases::ItemId)
                            .to(ShopItems::Table, ShopItems::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-shop_item_purchases-user_id-created_at")
                    .table(ShopItemPurchases::Table)
                    .col(ShopItemPurchases::UserId)
                    .col(ShopItemPurchases::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ShopItemPurchases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserInventoryItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserInventories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ShopItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rewards::Table).to_owned())
            .await?;
        Ok(())
    }
}
