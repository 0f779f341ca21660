use axum::{extract::State, response::Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ServiceError,
    events::Event,
    handlers::{ApiJson, ApiPath, RequireAdmin},
    models::{OrderStatus, Wallet},
    storefront::OrderView,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1))]
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreditWalletRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
}

fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw.trim())
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status: {}", raw)))
}

/// Every order in the store, with the admin's advance button
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(viewer): RequireAdmin,
) -> ApiResult<Vec<OrderView>> {
    let orders = state
        .services
        .orders
        .list_orders()
        .into_iter()
        .map(|o| OrderView::new(o, viewer.role))
        .collect();
    Ok(Json(ApiResponse::success(orders)))
}

/// Move an order to a new status
pub async fn update_order_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    RequireAdmin(viewer): RequireAdmin,
    ApiJson(payload): ApiJson<UpdateStatusRequest>,
) -> ApiResult<OrderView> {
    payload.validate()?;
    let status = parse_status(&payload.status)?;

    let order = state.services.orders.update_status(id, status).await?;
    info!(admin = %viewer.user_id, order_id = %id, %status, "Admin updated order status");

    Ok(Json(ApiResponse::success_with_message(
        OrderView::new(order, viewer.role),
        format!("Order marked as {}", status),
    )))
}

/// Top up a customer's wallet
pub async fn credit_wallet(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
    RequireAdmin(viewer): RequireAdmin,
    ApiJson(payload): ApiJson<CreditWalletRequest>,
) -> ApiResult<Wallet> {
    payload.validate()?;

    state
        .services
        .wallets
        .credit(&user_id, payload.amount, &payload.reason, None)?;
    info!(admin = %viewer.user_id, %user_id, amount = %payload.amount, "Wallet credited");

    state
        .event_sender
        .publish(Event::WalletCredited {
            user_id: user_id.clone(),
            amount: payload.amount,
            order_id: None,
        })
        .await;

    Ok(Json(ApiResponse::success(
        state.services.wallets.get_wallet(&user_id),
    )))
}
