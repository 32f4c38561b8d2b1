use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::{DeltaCmd, Engine, ItemType, ShopItemNew, TransactionKind};
use migration::MigratorTrait;
use server::{ServerState, router};

const TOKEN: &str = "test-token";

async fn app() -> (Router, Arc<Engine>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Arc::new(Engine::builder().database(db).build().await.unwrap());
    (router(ServerState::new(engine.clone(), TOKEN)), engine)
}

fn request(method: &str, uri: &str, user_id: i64, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header("telegram-user-id", user_id.to_string());
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_or_wrong_token_is_unauthorized() {
    let (app, _engine) = app().await;

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header("telegram-user-id", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header(header::AUTHORIZATION, "Bearer nope")
                .header("telegram-user-id", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_user_header_is_bad_request() {
    let (app, _engine) = app().await;

    let res = app
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn daily_gift_can_be_claimed_once() {
    let (app, _engine) = app().await;

    let res = app
        .clone()
        .oneshot(request("POST", "/daily-gift", 7, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = json_body(res).await;
    assert_eq!(body["besitos_granted"], 10);
    assert_eq!(body["new_balance"], 10);
    assert_eq!(body["current_streak"], 1);

    let res = app
        .clone()
        .oneshot(request("POST", "/daily-gift", 7, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = json_body(res).await;
    assert_eq!(body["error"], "already_claimed_today");
    assert_eq!(body["retryable"], false);

    let res = app
        .oneshot(request("GET", "/daily-gift", 7, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["can_claim"], false);
    assert_eq!(body["total_claims"], 1);
}

#[tokio::test]
async fn purchase_without_funds_is_rejected() {
    let (app, engine) = app().await;
    engine
        .apply_delta(DeltaCmd::new(3, 100, TransactionKind::Grant))
        .await
        .unwrap();
    let item = engine
        .create_shop_item(ShopItemNew::new("Rosa", ItemType::Collectible, 150))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/purchases",
            3,
            Some(json!({ "target": { "shop_item": item.id } })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(res).await["error"], "insufficient_funds");
    assert_eq!(engine.balance(3).await.unwrap(), 100);

    engine
        .apply_delta(DeltaCmd::new(3, 50, TransactionKind::Grant))
        .await
        .unwrap();
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/purchases",
            3,
            Some(json!({ "target": { "shop_item": item.id } })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = json_body(res).await;
    assert_eq!(body["new_balance"], 0);
    assert_eq!(body["price_paid"], 150);

    let res = app
        .oneshot(request("GET", "/inventory", 3, None))
        .await
        .unwrap();
    let body = json_body(res).await;
    assert_eq!(body["total_items"], 1);
    assert_eq!(body["items"][0]["name"], "Rosa");
    assert_eq!(body["items"][0]["item_kind"], "shop_item");
}

#[tokio::test]
async fn balance_delta_and_profile_round_trip() {
    let (app, _engine) = app().await;

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/balance/delta",
            11,
            Some(json!({ "amount": 120, "kind": "grant", "idempotency_key": "welcome" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = json_body(res).await;
    assert_eq!(body["new_balance"], 120);
    assert_eq!(body["level"], 2);
    assert_eq!(body["leveled_up"], true);

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/balance/delta",
            11,
            Some(json!({ "amount": 120, "kind": "grant", "idempotency_key": "welcome" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["replayed"], true);

    let res = app
        .clone()
        .oneshot(request("GET", "/profile", 11, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["user_id"], 11);
    assert_eq!(body["besitos_balance"], 120);
    assert_eq!(body["level_name"], "Coqueto");
    assert_eq!(body["can_claim_daily_gift"], true);

    let res = app
        .oneshot(request("GET", "/ledger?limit=10", 11, None))
        .await
        .unwrap();
    let body = json_body(res).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["kind"], "grant");
}

#[tokio::test]
async fn claiming_unstarted_mission_is_unprocessable() {
    let (app, _engine) = app().await;

    let res = app
        .oneshot(request(
            "POST",
            "/missions/00000000-0000-0000-0000-000000000000/claim",
            5,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(res).await["error"], "mission_not_completed");
}
