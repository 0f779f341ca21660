use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::{ApiJson, ApiPath},
    models::{Order, PaymentMethod, Viewer},
    services::orders::CheckoutRequest,
    storefront::OrderView,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPaymentRequest {
    pub payment_method: PaymentMethod,
}

fn view(order: Order, viewer: &Viewer) -> OrderView {
    OrderView::new(order, viewer.role)
}

/// List the caller's orders, newest first
pub async fn list_orders(
    State(state): State<AppState>,
    viewer: Viewer,
) -> ApiResult<Vec<OrderView>> {
    let orders = state
        .services
        .orders
        .list_user_orders(&viewer.user_id)
        .into_iter()
        .map(|o| view(o, &viewer))
        .collect();
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn get_order(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    viewer: Viewer,
) -> ApiResult<OrderView> {
    let order = state.services.orders.get_user_order(&viewer.user_id, id)?;
    Ok(Json(ApiResponse::success(view(order, &viewer))))
}

/// Place an order
pub async fn create_order(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiJson(payload): ApiJson<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .checkout(&viewer.user_id, payload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            view(order, &viewer),
            "Order placed",
        )),
    ))
}

/// Cancel an order that has not been delivered yet
pub async fn cancel_order(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    viewer: Viewer,
    payload: Option<Json<CancelOrderRequest>>,
) -> ApiResult<OrderView> {
    let reason = payload.and_then(|Json(p)| p.reason);
    let order = state
        .services
        .orders
        .cancel_order(&viewer.user_id, id, reason)
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        view(order, &viewer),
        "Order cancelled",
    )))
}

/// Request a return; multipart with a `reason` field and optional `images`
pub async fn request_return(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    viewer: Viewer,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<OrderView> {
    let mut multipart = multipart?;
    let mut reason = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("reason") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServiceError::BadRequest(format!("Invalid reason: {}", e)))?;
                reason = Some(text);
            }
            Some("images") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("image-{}", attachments.len() + 1));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::BadRequest(format!("Invalid image: {}", e)))?;
                debug!(%file_name, size = bytes.len(), "Received return attachment");
                attachments.push(file_name);
            }
            _ => {}
        }
    }

    let order = state
        .services
        .orders
        .request_return(
            &viewer.user_id,
            id,
            reason.unwrap_or_default(),
            attachments,
        )
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        view(order, &viewer),
        "Return requested",
    )))
}

/// Retry a failed payment with the wallet or cash on delivery
pub async fn retry_payment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    viewer: Viewer,
    ApiJson(payload): ApiJson<RetryPaymentRequest>,
) -> ApiResult<OrderView> {
    let order = state
        .services
        .orders
        .retry_payment(&viewer.user_id, id, payload.payment_method)
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        view(order, &viewer),
        "Payment updated",
    )))
}
