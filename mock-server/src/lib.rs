//! In-memory rider backend used by integration tests and local development.
//!
//! Implements the eight REST endpoints the client consumes: login / me /
//! logout under `/rider/auth`, and listing / accept / status transitions
//! under `/rider/orders`. State lives behind one `RwLock` so tests can reach
//! in directly (seed orders, revoke tokens out from under a client).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const STATUS_CREATED: &str = "CREATED";
pub const STATUS_CONFIRMED: &str = "CONFIRMED";
pub const STATUS_ASSIGNED_RIDER: &str = "ASSIGNED_RIDER";
pub const STATUS_OUT_FOR_DELIVERY: &str = "OUT_FOR_DELIVERY";
pub const STATUS_DELIVERED: &str = "DELIVERED";

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub phone: String,
    pub is_active: bool,
}

#[derive(Clone, Debug)]
pub struct RiderAccount {
    pub password: String,
    pub rider: Rider,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub product_img_url: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub status: String,
    pub total_amount: f64,
    pub subtotal_amount: f64,
    pub delivery_fee: f64,
    pub address_label: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub items: Vec<OrderItem>,
    #[serde(skip)]
    pub rider_id: Option<i64>,
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub accounts: HashMap<String, RiderAccount>,
    pub tokens: HashMap<String, i64>,
    pub revoked: HashSet<String>,
    pub orders: HashMap<Uuid, Order>,
}

impl ServerState {
    /// One active rider account (`rider_01` / `secret`) and two orders
    /// waiting to be accepted.
    pub fn seeded() -> Self {
        let mut state = Self::default();
        state.seed_account(1, "rider_01", "secret");
        state.seed_order(STATUS_CONFIRMED);
        state.seed_order(STATUS_CONFIRMED);
        state
    }

    pub fn seed_account(&mut self, id: i64, username: &str, password: &str) {
        self.accounts.insert(
            username.to_string(),
            RiderAccount {
                password: password.to_string(),
                rider: Rider {
                    id,
                    name: format!("Rider {id}"),
                    username: username.to_string(),
                    phone: format!("555-010{id}"),
                    is_active: true,
                },
            },
        );
    }

    pub fn seed_order(&mut self, status: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.orders.insert(
            id,
            Order {
                id,
                status: status.to_string(),
                total_amount: 249.5,
                subtotal_amount: 219.5,
                delivery_fee: 30.0,
                address_label: "Home".to_string(),
                address_line1: "12 MG Road".to_string(),
                address_line2: None,
                items: vec![OrderItem {
                    name: "Milk".to_string(),
                    quantity: 2,
                    product_img_url: None,
                }],
                rider_id: None,
            },
        );
        id
    }

    /// Mint a session token for an account without going through login.
    pub fn issue_token(&mut self, username: &str) -> Option<String> {
        let id = self.accounts.get(username)?.rider.id;
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), id);
        Some(token)
    }

    /// Invalidate a token so subsequent bearer requests see `TOKEN_REVOKED`.
    pub fn revoke_token(&mut self, token: &str) {
        self.tokens.remove(token);
        self.revoked.insert(token.to_string());
    }
}

pub type Db = Arc<RwLock<ServerState>>;

pub fn app() -> Router {
    app_with_db(Arc::new(RwLock::new(ServerState::seeded())))
}

pub fn app_with_db(db: Db) -> Router {
    Router::new()
        .route("/rider/auth/login", post(login))
        .route("/rider/auth/me", get(me))
        .route("/rider/auth/logout", post(logout))
        .route("/rider/orders/available", get(available_orders))
        .route("/rider/orders/active", get(active_orders))
        .route("/rider/orders/{id}/accept", post(accept_order))
        .route("/rider/orders/{id}/out-for-delivery", post(out_for_delivery))
        .route("/rider/orders/{id}/delivered", post(delivered))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Serve against externally owned state, so callers keep a handle into it.
pub async fn run_with_db(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_db(db)).await
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

fn error(status: StatusCode, code: &str) -> ApiError {
    (status, Json(json!({ "error": code })))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn authenticate(db: &Db, headers: &HeaderMap) -> Result<i64, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Err(error(StatusCode::UNAUTHORIZED, "TOKEN_REQUIRED"));
    };
    let state = db.read().await;
    if state.revoked.contains(token) {
        return Err(error(StatusCode::UNAUTHORIZED, "TOKEN_REVOKED"));
    }
    state
        .tokens
        .get(token)
        .copied()
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "TOKEN_INVALID"))
}

#[derive(Deserialize)]
struct LoginInput {
    username: String,
    password: String,
}

async fn login(State(db): State<Db>, Json(input): Json<LoginInput>) -> ApiResult {
    let mut state = db.write().await;
    let Some(account) = state.accounts.get(&input.username) else {
        return Err(error(StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"));
    };
    if account.password != input.password {
        return Err(error(StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"));
    }
    let rider = account.rider.clone();
    let token = Uuid::new_v4().to_string();
    state.tokens.insert(token.clone(), rider.id);
    Ok(Json(json!({ "token": token, "rider": rider })))
}

async fn me(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    let rider_id = authenticate(&db, &headers).await?;
    let state = db.read().await;
    let rider = state
        .accounts
        .values()
        .find(|a| a.rider.id == rider_id)
        .map(|a| a.rider.clone())
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "TOKEN_INVALID"))?;
    Ok(Json(json!({ "rider": rider })))
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    authenticate(&db, &headers).await?;
    let token = bearer_token(&headers)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "TOKEN_REQUIRED"))?
        .to_string();
    db.write().await.revoke_token(&token);
    Ok(Json(json!({ "ok": true })))
}

async fn available_orders(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    authenticate(&db, &headers).await?;
    let state = db.read().await;
    let orders: Vec<&Order> = state
        .orders
        .values()
        .filter(|o| {
            o.rider_id.is_none() && (o.status == STATUS_CREATED || o.status == STATUS_CONFIRMED)
        })
        .collect();
    Ok(Json(json!({ "orders": orders })))
}

async fn active_orders(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    let rider_id = authenticate(&db, &headers).await?;
    let state = db.read().await;
    let orders: Vec<&Order> = state
        .orders
        .values()
        .filter(|o| {
            o.rider_id == Some(rider_id)
                && (o.status == STATUS_ASSIGNED_RIDER || o.status == STATUS_OUT_FOR_DELIVERY)
        })
        .collect();
    Ok(Json(json!({ "orders": orders })))
}

async fn accept_order(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult {
    let rider_id = authenticate(&db, &headers).await?;
    let mut state = db.write().await;
    let order = state
        .orders
        .get_mut(&id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"))?;
    if order.rider_id.is_some() {
        return Err(error(StatusCode::CONFLICT, "ORDER_ALREADY_ASSIGNED"));
    }
    if order.status != STATUS_CREATED && order.status != STATUS_CONFIRMED {
        return Err(error(StatusCode::CONFLICT, "INVALID_STATUS_TRANSITION"));
    }
    order.rider_id = Some(rider_id);
    order.status = STATUS_ASSIGNED_RIDER.to_string();
    Ok(Json(json!({ "order": order })))
}

async fn out_for_delivery(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult {
    transition(db, id, headers, STATUS_ASSIGNED_RIDER, STATUS_OUT_FOR_DELIVERY).await
}

async fn delivered(State(db): State<Db>, Path(id): Path<Uuid>, headers: HeaderMap) -> ApiResult {
    transition(db, id, headers, STATUS_OUT_FOR_DELIVERY, STATUS_DELIVERED).await
}

async fn transition(db: Db, id: Uuid, headers: HeaderMap, from: &str, to: &str) -> ApiResult {
    let rider_id = authenticate(&db, &headers).await?;
    let mut state = db.write().await;
    let order = state
        .orders
        .get_mut(&id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"))?;
    if order.rider_id != Some(rider_id) {
        return Err(error(StatusCode::FORBIDDEN, "NOT_YOUR_ORDER"));
    }
    if order.status != from {
        return Err(error(StatusCode::CONFLICT, "INVALID_STATUS_TRANSITION"));
    }
    order.status = to.to_string();
    Ok(Json(json!({ "order": order })))
}
