//! REST API router for the order core.
//!
//! Used by the binary and by integration tests. Create with [`create_router`].
//! Uses Extension for state so the router is `Router<()>` and works with `into_make_service()`.

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{require_admin, require_api_key_or_anonymous, AuthConfig, AuthUser};
use crate::error::PosError;
use crate::lifecycle::{OrderLifecycle, OrderPatch};
use crate::reports::{dashboard_stats, sales_report, ReportRange};
use crate::types::{OrderDraft, OrderId, OrderStatus};

/// Maximum orders returned by the list endpoint.
pub const ORDER_LIST_LIMIT: usize = 100;

/// Shared app state: one lifecycle (and store handle) per process.
#[derive(Clone)]
pub struct AppState {
    pub(crate) lifecycle: Arc<OrderLifecycle>,
    pub(crate) auth: AuthConfig,
}

/// Builds the REST router. Returns `Router<()>` so you can call `.into_make_service()` for `axum::serve`.
pub fn create_router(lifecycle: Arc<OrderLifecycle>, auth: AuthConfig) -> Router<()> {
    let state = AppState {
        lifecycle,
        auth: auth.clone(),
    };
    let api = Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/:id", get(get_order).patch(update_order))
        .route("/orders/:id/status", patch(transition_status))
        .route("/tables", get(list_tables))
        .route("/dashboard/stats", get(dashboard))
        .route("/reports", get(report))
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            require_api_key_or_anonymous(req, next, auth.clone())
        }));
    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(Extension(state))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn parse_order_id(raw: &str) -> Result<OrderId, PosError> {
    Uuid::parse_str(raw)
        .map(OrderId)
        .map_err(|_| PosError::validation(format!("'{}' is not a valid order id", raw)))
}

/// Bodies are parsed here rather than by the `Json` extractor so malformed input
/// gets the same error shape as every other failure.
fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, PosError> {
    serde_json::from_slice(body).map_err(|e| PosError::validation(e.to_string()))
}

async fn create_order(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Response, PosError> {
    let mut draft: OrderDraft = parse_body(&body)?;
    if draft.attribution.cashier_id.is_none() {
        draft.attribution.cashier_id = user.key_id.clone();
    }
    let order = state.lifecycle.create_order(draft, user.actor()).await?;
    Ok((StatusCode::CREATED, Json(order)).into_response())
}

async fn list_orders(Extension(state): Extension<AppState>) -> Result<Response, PosError> {
    let orders = state.lifecycle.list_orders(ORDER_LIST_LIMIT).await?;
    Ok(Json(orders).into_response())
}

async fn get_order(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<Response, PosError> {
    let order = state.lifecycle.get_order(parse_order_id(&id)?).await?;
    Ok(Json(order).into_response())
}

#[derive(serde::Deserialize)]
struct StatusRequest {
    status: OrderStatus,
}

async fn transition_status(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, PosError> {
    let order_id = parse_order_id(&id)?;
    let req: StatusRequest = parse_body(&body)?;
    let order = state
        .lifecycle
        .transition_status(order_id, req.status, user.actor())
        .await?;
    Ok(Json(order).into_response())
}

async fn update_order(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, PosError> {
    let order_id = parse_order_id(&id)?;
    let patch: OrderPatch = parse_body(&body)?;
    let order = state.lifecycle.update_order(order_id, patch, user.actor()).await?;
    Ok(Json(order).into_response())
}

async fn list_tables(Extension(state): Extension<AppState>) -> Result<Response, PosError> {
    Ok(Json(state.lifecycle.list_tables().await?).into_response())
}

async fn dashboard(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, PosError> {
    if let Err(denied) = require_admin(&user, &state.auth) {
        return Ok(denied);
    }
    let orders = state.lifecycle.all_orders().await?;
    let tables = state.lifecycle.list_tables().await?;
    Ok(Json(dashboard_stats(&orders, &tables, Utc::now())).into_response())
}

#[derive(serde::Deserialize)]
struct ReportQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn report(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, PosError> {
    if let Err(denied) = require_admin(&user, &state.auth) {
        return Ok(denied);
    }
    let today = Utc::now().date_naive();
    let to = query.to.unwrap_or(today);
    let from = query.from.unwrap_or(to);
    let range = ReportRange::new(from, to)?;
    let orders = state.lifecycle.all_orders().await?;
    Ok(Json(sales_report(&orders, range)).into_response())
}
