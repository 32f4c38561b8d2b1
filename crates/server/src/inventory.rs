use api_types::inventory::{EquipItem, InventoryItemView, InventoryResponse, ItemKind};
use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{CurrentUser, ServerError, server::ServerState};

fn item_view(item: engine::UserInventoryItem) -> InventoryItemView {
    InventoryItemView {
        id: item.id,
        item_kind: match item.item_kind {
            engine::ItemKind::ShopItem => ItemKind::ShopItem,
            engine::ItemKind::Badge => ItemKind::Badge,
            engine::ItemKind::Permission => ItemKind::Permission,
            engine::ItemKind::RewardItem => ItemKind::RewardItem,
        },
        item_ref: item.item_ref,
        name: item.name,
        quantity: item.quantity,
        is_equipped: item.is_equipped,
        is_used: item.is_used,
        acquired_at: item.acquired_at,
        expires_at: item.expires_at,
    }
}

pub async fn get(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
) -> Result<Json<InventoryResponse>, ServerError> {
    let snapshot = state.engine.inventory(user_id).await?;
    Ok(Json(InventoryResponse {
        total_items: snapshot.summary.total_items,
        total_spent: snapshot.summary.total_spent,
        items: snapshot.items.into_iter().map(item_view).collect(),
    }))
}

pub async fn use_item(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<InventoryItemView>, ServerError> {
    let item = state.engine.use_item(user_id, item_id).await?;
    Ok(Json(item_view(item)))
}

pub async fn equip(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<EquipItem>,
) -> Result<Json<InventoryItemView>, ServerError> {
    let item = state
        .engine
        .set_item_equipped(user_id, item_id, payload.equipped)
        .await?;
    Ok(Json(item_view(item)))
}
