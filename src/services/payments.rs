use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ServiceError,
    events::Event,
    metrics::PAYMENT_VERIFICATIONS,
    models::{Order, OrderStatus, PaymentMethod, PaymentStatus},
    services::orders::OrderService,
};

type HmacSha256 = Hmac<Sha256>;

/// Gateway order handed to the storefront to open the hosted checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrder {
    pub order_id: Uuid,
    pub gateway_order_id: String,
    /// Amount in the currency's minor unit (paise for INR).
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1))]
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailureReport {
    pub order_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Signs a gateway payment the way the gateway does: HMAC-SHA256 over
/// `"{gateway_order_id}|{payment_id}"`, hex encoded.
pub fn sign_gateway_payment(secret: &str, gateway_order_id: &str, payment_id: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length
        Err(_) => return String::new(),
    };
    mac.update(format!("{}|{}", gateway_order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn signature_matches(secret: &str, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{}|{}", gateway_order_id, payment_id).as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Creates gateway orders and settles them from signed checkout callbacks.
#[derive(Clone)]
pub struct GatewayService {
    orders: OrderService,
    key_id: String,
    key_secret: String,
    currency: String,
}

impl GatewayService {
    pub fn new(
        orders: OrderService,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            currency: currency.into(),
        }
    }

    /// Opens a fresh gateway order for an unpaid order. Called both for the
    /// first gateway attempt and for retries after a failure.
    #[instrument(skip(self))]
    pub async fn create_gateway_order(
        &self,
        user_id: &str,
        order_id: Uuid,
    ) -> Result<GatewayOrder, ServiceError> {
        let gateway_order_id = format!("order_{}", &Uuid::new_v4().simple().to_string()[..14]);

        let order = self.orders.apply(order_id, Some(user_id), |order| {
            if !order.is_unpaid() {
                return Err(ServiceError::Conflict(format!(
                    "Order {} is already paid",
                    order.id
                )));
            }
            if order.order_status.is_terminal() {
                return Err(ServiceError::InvalidStatus(format!(
                    "Cannot take payment for a {} order",
                    order.order_status
                )));
            }
            order.gateway_order_id = Some(gateway_order_id.clone());
            order.payment_method = PaymentMethod::Razorpay;
            Ok(())
        })?;

        let amount = to_minor_units(order.total_amount)?;
        info!(order_id = %order_id, %gateway_order_id, amount, "Gateway order created");

        Ok(GatewayOrder {
            order_id,
            gateway_order_id,
            amount,
            currency: self.currency.clone(),
            key_id: self.key_id.clone(),
        })
    }

    /// Verifies the checkout signature. A bad signature marks the payment
    /// failed and is reported as an error.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn verify_payment(
        &self,
        user_id: &str,
        request: VerifyPaymentRequest,
    ) -> Result<Order, ServiceError> {
        request.validate()?;

        let valid = signature_matches(
            &self.key_secret,
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
        );

        let order = self.orders.apply(request.order_id, Some(user_id), |order| {
            if order.order_status.is_terminal() {
                return Err(ServiceError::InvalidStatus(format!(
                    "Cannot take payment for a {} order",
                    order.order_status
                )));
            }
            if order.gateway_order_id.as_deref() != Some(request.razorpay_order_id.as_str()) {
                return Err(ServiceError::BadRequest(
                    "Gateway order id does not match this order".to_string(),
                ));
            }
            if order.payment_status == PaymentStatus::Paid {
                return Err(ServiceError::Conflict(format!(
                    "Order {} is already paid",
                    order.id
                )));
            }
            if valid {
                order.payment_status = PaymentStatus::Paid;
                order.payment_method = PaymentMethod::Razorpay;
                order.gateway_payment_id = Some(request.razorpay_payment_id.clone());
                if order.order_status == OrderStatus::Pending {
                    order.order_status = OrderStatus::Confirmed;
                }
            } else {
                order.payment_status = PaymentStatus::Failed;
            }
            Ok(())
        })?;

        let events = self.orders.events();
        if valid {
            PAYMENT_VERIFICATIONS.with_label_values(&["success"]).inc();
            info!("Gateway payment verified");
            events
                .publish(Event::PaymentCaptured {
                    order_id: order.id,
                    method: PaymentMethod::Razorpay,
                })
                .await;
            Ok(order)
        } else {
            PAYMENT_VERIFICATIONS.with_label_values(&["invalid_signature"]).inc();
            warn!("Gateway payment signature mismatch");
            events
                .publish(Event::PaymentFailed {
                    order_id: order.id,
                    reason: "signature verification failed".to_string(),
                })
                .await;
            Err(ServiceError::PaymentFailed(
                "Payment signature verification failed".to_string(),
            ))
        }
    }

    /// Records a failure reported by the hosted checkout (dismissed, declined).
    #[instrument(skip(self, report), fields(order_id = %report.order_id))]
    pub async fn record_failure(
        &self,
        user_id: &str,
        report: PaymentFailureReport,
    ) -> Result<Order, ServiceError> {
        let reason = report
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "payment was not completed".to_string());

        let order = self.orders.apply(report.order_id, Some(user_id), |order| {
            if order.payment_status == PaymentStatus::Paid {
                return Err(ServiceError::Conflict(format!(
                    "Order {} is already paid",
                    order.id
                )));
            }
            if order.order_status.is_terminal() {
                return Err(ServiceError::InvalidStatus(format!(
                    "Cannot record a payment failure for a {} order",
                    order.order_status
                )));
            }
            if order.payment_method != PaymentMethod::Razorpay || order.gateway_order_id.is_none() {
                return Err(ServiceError::BadRequest(
                    "No gateway checkout is open for this order".to_string(),
                ));
            }
            order.payment_status = PaymentStatus::Failed;
            Ok(())
        })?;

        PAYMENT_VERIFICATIONS.with_label_values(&["reported_failure"]).inc();
        info!(%reason, "Gateway payment failure recorded");
        self.orders
            .events()
            .publish(Event::PaymentFailed {
                order_id: order.id,
                reason,
            })
            .await;

        Ok(order)
    }
}

/// Converts a rupee amount to paise for the gateway.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.round().to_i64())
        .ok_or_else(|| {
            error!(%amount, "Order total does not fit gateway amount");
            ServiceError::InternalError("order total out of range".to_string())
        })
}
