//! Shop and purchase endpoints.

use api_types::shop::{
    ItemType as ApiItemType, PurchaseCompleted, PurchaseNew, PurchaseRefunded, PurchaseTarget,
    ShopItemView, ShopResponse,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{CurrentUser, ServerError, server::ServerState};

fn map_item_type(item_type: engine::ItemType) -> ApiItemType {
    match item_type {
        engine::ItemType::Consumable => ApiItemType::Consumable,
        engine::ItemType::Cosmetic => ApiItemType::Cosmetic,
        engine::ItemType::Collectible => ApiItemType::Collectible,
    }
}

pub async fn list(State(state): State<ServerState>) -> Result<Json<ShopResponse>, ServerError> {
    let items = state
        .engine
        .shop_items(false)
        .await?
        .into_iter()
        .map(|item| ShopItemView {
            id: item.id,
            name: item.name,
            description: item.description,
            item_type: map_item_type(item.item_type),
            price: item.price,
            stock: item.stock,
            max_per_user: item.max_per_user,
            is_vip_only: item.is_vip_only,
        })
        .collect();
    Ok(Json(ShopResponse { items }))
}

pub async fn purchase(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Json(payload): Json<PurchaseNew>,
) -> Result<(StatusCode, Json<PurchaseCompleted>), ServerError> {
    let cmd = match payload.target {
        PurchaseTarget::ShopItem(item_id) => engine::PurchaseCmd::shop_item(user_id, item_id),
        PurchaseTarget::Reward(reward_id) => engine::PurchaseCmd::reward(user_id, reward_id),
    }
    .quantity(payload.quantity.unwrap_or(1));

    let receipt = state.engine.purchase(cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(PurchaseCompleted {
            purchase_id: receipt.purchase_id,
            quantity: receipt.quantity,
            price_paid: receipt.price_paid,
            new_balance: receipt.new_balance,
            inventory_item_id: receipt.item.map(|item| item.id),
            level: receipt.level,
        }),
    ))
}

pub async fn refund(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<PurchaseRefunded>, ServerError> {
    let owned = state
        .engine
        .purchases(user_id)
        .await?
        .iter()
        .any(|purchase| purchase.id == purchase_id);
    if !owned {
        return Err(engine::EngineError::KeyNotFound("purchase not exists".to_string()).into());
    }
    let refund = state.engine.refund_purchase(purchase_id).await?;
    Ok(Json(PurchaseRefunded {
        purchase_id: refund.purchase_id,
        refunded: refund.refunded,
        new_balance: refund.new_balance,
    }))
}
