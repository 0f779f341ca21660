use axum::{extract::State, response::Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    handlers::ApiJson,
    models::Viewer,
    services::payments::{GatewayOrder, PaymentFailureReport, VerifyPaymentRequest},
    storefront::OrderView,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGatewayOrderRequest {
    pub order_id: Uuid,
}

/// Open a gateway order for an unpaid order
pub async fn create_gateway_order(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiJson(payload): ApiJson<CreateGatewayOrderRequest>,
) -> ApiResult<GatewayOrder> {
    let gateway_order = state
        .services
        .payments
        .create_gateway_order(&viewer.user_id, payload.order_id)
        .await?;
    Ok(Json(ApiResponse::success(gateway_order)))
}

/// Verify the signature returned by the hosted checkout
pub async fn verify_payment(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiJson(payload): ApiJson<VerifyPaymentRequest>,
) -> ApiResult<OrderView> {
    let order = state
        .services
        .payments
        .verify_payment(&viewer.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        OrderView::new(order, viewer.role),
        "Payment verified",
    )))
}

pub async fn report_failure(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiJson(payload): ApiJson<PaymentFailureReport>,
) -> ApiResult<OrderView> {
    let order = state
        .services
        .payments
        .record_failure(&viewer.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        OrderView::new(order, viewer.role),
        "Payment failure recorded",
    )))
}
