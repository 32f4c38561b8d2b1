use axum::{
    Router,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, Error as AxumError, Header, authorization::Bearer},
};

use std::{net::SocketAddr, sync::Arc};

use crate::{balance, daily_gift, inventory, leaderboard, missions, profile, shop};
use engine::Engine;

static TELEGRAM_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("telegram-user-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    api_token: Arc<str>,
}

impl ServerState {
    pub fn new(engine: Arc<Engine>, api_token: &str) -> Self {
        Self {
            engine,
            api_token: Arc::from(api_token),
        }
    }
}

/// `TypedHeader` for custom telegram header
///
/// Per-user requests must contain the "telegram-user-id" entry in the header.
#[derive(Debug)]
struct TelegramHeader(i64);

impl Header for TelegramHeader {
    fn name() -> &'static axum::http::HeaderName {
        &TELEGRAM_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let Ok(value) = value.trim().parse() else {
            return Err(AxumError::invalid());
        };

        Ok(TelegramHeader(value))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        let as_string = self.0.to_string();
        match axum::http::HeaderValue::from_str(&as_string) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode telegram-user-id header"),
        }
    }
}

/// The user a request acts for, taken from the `telegram-user-id` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(TelegramHeader(user_id)) =
            TypedHeader::<TelegramHeader>::from_request_parts(parts, state)
                .await
                .map_err(|_| StatusCode::BAD_REQUEST)?;
        Ok(CurrentUser(user_id))
    }
}

/// Only trusted presentation layers holding the shared token may call in.
async fn auth(
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(Authorization(bearer))) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if state.api_token.is_empty() || bearer.token() != &*state.api_token {
        tracing::warn!("rejected request with invalid api token");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/profile", get(profile::get))
        .route("/balance/delta", post(balance::apply_delta))
        .route("/ledger", get(balance::ledger))
        .route(
            "/daily-gift",
            get(daily_gift::status).post(daily_gift::claim),
        )
        .route("/missions", get(missions::list))
        .route("/missions/progress", post(missions::record_progress))
        .route("/missions/{mission_id}/start", post(missions::start))
        .route("/missions/{mission_id}/claim", post(missions::claim))
        .route("/reactions", post(missions::record_reaction))
        .route("/shop", get(shop::list))
        .route("/purchases", post(shop::purchase))
        .route("/purchases/{purchase_id}/refund", post(shop::refund))
        .route("/inventory", get(inventory::get))
        .route("/inventory/{item_id}/use", post(inventory::use_item))
        .route("/inventory/{item_id}/equip", post(inventory::equip))
        .route("/leaderboard", get(leaderboard::get))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run(engine: Engine, api_token: &str, addr: SocketAddr) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, api_token, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    api_token: &str,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState::new(Arc::new(engine), api_token);
    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    api_token: String,
    listener: tokio::net::TcpListener,
) -> Result<SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, &api_token, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
