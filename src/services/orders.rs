use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{ORDERS_PLACED, ORDER_CANCELLATIONS, ORDER_RETURNS, ORDER_STATUS_UPDATES, PAYMENT_RETRIES},
    models::{order::checked_subtotal, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus},
    services::{coupons::CouponService, order_status, wallet::WalletService},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 100, message = "an order holds between 1 and 100 items"))]
    pub items: Vec<OrderItem>,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

impl CheckoutRequest {
    fn validate_all(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }
}

/// Owns every order and is the sole authority on its lifecycle.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<DashMap<Uuid, Order>>,
    wallets: WalletService,
    coupons: CouponService,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(
        wallets: WalletService,
        coupons: CouponService,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            orders: Arc::new(DashMap::new()),
            wallets,
            coupons,
            event_sender,
        }
    }

    pub(crate) fn events(&self) -> &EventSender {
        &self.event_sender
    }

    /// Runs `mutate` against a copy of the order and commits it only on success,
    /// so a rejected action leaves the stored order untouched.
    ///
    /// When `owner` is given, orders belonging to other users are reported as
    /// missing.
    pub(crate) fn apply<F>(
        &self,
        order_id: Uuid,
        owner: Option<&str>,
        mutate: F,
    ) -> Result<Order, ServiceError>
    where
        F: FnOnce(&mut Order) -> Result<(), ServiceError>,
    {
        let mut entry = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if let Some(user_id) = owner {
            if entry.user_id != user_id {
                return Err(ServiceError::NotFound(format!(
                    "Order {} not found",
                    order_id
                )));
            }
        }

        let mut draft = entry.clone();
        mutate(&mut draft)?;
        draft.touch();
        *entry = draft.clone();
        Ok(draft)
    }

    /// Places an order, applying an optional coupon and settling wallet payments
    /// immediately.
    #[instrument(skip(self, request), fields(items = request.items.len(), method = %request.payment_method))]
    pub async fn checkout(
        &self,
        user_id: &str,
        request: CheckoutRequest,
    ) -> Result<Order, ServiceError> {
        request.validate_all()?;

        let subtotal = checked_subtotal(&request.items).ok_or_else(|| {
            ServiceError::ValidationError("order total is too large".to_string())
        })?;
        let coupon_code = request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_ascii_uppercase);

        let discount = match coupon_code.as_deref() {
            Some(code) => self.coupons.redeem(code, user_id, subtotal, Utc::now())?,
            None => Decimal::ZERO,
        };

        let mut order = Order::new(
            user_id,
            request.items,
            discount,
            coupon_code.clone(),
            request.payment_method,
        );

        let settled_now = match order.payment_method {
            PaymentMethod::Wallet => {
                if let Err(e) = self.wallets.debit(
                    user_id,
                    order.total_amount,
                    &format!("Payment for order {}", order.id),
                    Some(order.id),
                ) {
                    if let Some(code) = coupon_code.as_deref() {
                        self.coupons.release(code, user_id);
                    }
                    return Err(e);
                }
                true
            }
            _ => order.total_amount.is_zero(),
        };
        if settled_now {
            order.payment_status = PaymentStatus::Paid;
        }

        self.orders.insert(order.id, order.clone());

        ORDERS_PLACED
            .with_label_values(&[&order.payment_method.to_string()])
            .inc();
        info!(order_id = %order.id, total = %order.total_amount, "Order placed");

        self.event_sender
            .publish(Event::OrderPlaced {
                order_id: order.id,
                user_id: user_id.to_string(),
                total: order.total_amount,
                method: order.payment_method,
            })
            .await;
        if settled_now {
            self.event_sender
                .publish(Event::PaymentCaptured {
                    order_id: order.id,
                    method: order.payment_method,
                })
                .await;
        }

        Ok(order)
    }

    pub fn get_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.orders
            .get(&order_id)
            .map(|o| o.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Fetches an order on behalf of its owner; other users' orders are not found.
    pub fn get_user_order(&self, user_id: &str, order_id: Uuid) -> Result<Order, ServiceError> {
        let order = self.get_order(order_id)?;
        if order.user_id != user_id {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }
        Ok(order)
    }

    /// Newest first.
    pub fn list_user_orders(&self, user_id: &str) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .map(|o| o.clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Newest first.
    pub fn list_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.iter().map(|o| o.clone()).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Customer cancellation. Paid orders are refunded to the wallet.
    #[instrument(skip(self, reason))]
    pub async fn cancel_order(
        &self,
        user_id: &str,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<Order, ServiceError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "Customer request".to_string());

        let updated = self.apply(order_id, Some(user_id), |order| {
            if !order.order_status.is_cancellable() {
                return Err(ServiceError::InvalidStatus(format!(
                    "Order cannot be cancelled once it is {}",
                    order.order_status
                )));
            }
            order_status::ensure_transition(order.order_status, OrderStatus::Cancelled)?;
            order.order_status = OrderStatus::Cancelled;
            order.cancellation_reason = Some(reason.clone());
            Ok(())
        })?;

        let refunded = self.refund_if_paid(&updated, "Refund for cancelled order").await;

        ORDER_CANCELLATIONS.inc();
        info!(order_id = %order_id, reason = %reason, "Order cancelled");
        self.event_sender
            .publish(Event::OrderCancelled { order_id, refunded })
            .await;

        Ok(updated)
    }

    /// Moves a delivered order to `return_requested`.
    #[instrument(skip(self, reason, attachments), fields(attachments = attachments.len()))]
    pub async fn request_return(
        &self,
        user_id: &str,
        order_id: Uuid,
        reason: String,
        attachments: Vec<String>,
    ) -> Result<Order, ServiceError> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "a reason is required to request a return".to_string(),
            ));
        }

        let updated = self.apply(order_id, Some(user_id), |order| {
            if order.order_status != OrderStatus::Delivered {
                return Err(ServiceError::InvalidStatus(format!(
                    "Only delivered orders can be returned (order is {})",
                    order.order_status
                )));
            }
            order_status::ensure_transition(order.order_status, OrderStatus::ReturnRequested)?;
            order.order_status = OrderStatus::ReturnRequested;
            order.return_reason = Some(reason);
            order.return_attachments = attachments;
            Ok(())
        })?;

        ORDER_RETURNS.inc();
        info!(order_id = %order_id, "Return requested");
        self.event_sender
            .publish(Event::ReturnRequested(order_id))
            .await;

        Ok(updated)
    }

    /// Administrative status change, validated against the transition table.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<Order, ServiceError> {
        let mut old_status = None;
        let updated = self
            .apply(order_id, None, |order| {
                order_status::ensure_transition(order.order_status, new_status)?;
                old_status = Some(order.order_status);
                order.order_status = new_status;

                // Cash is collected by the courier on delivery
                if new_status == OrderStatus::Delivered
                    && order.payment_method == PaymentMethod::Cod
                    && order.payment_status == PaymentStatus::Pending
                {
                    order.payment_status = PaymentStatus::Paid;
                }
                Ok(())
            })
            .map_err(|e| {
                error!("Failed to update order {} status: {}", order_id, e);
                e
            })?;

        let old_status = old_status.unwrap_or(new_status);
        ORDER_STATUS_UPDATES
            .with_label_values(&[&new_status.to_string()])
            .inc();
        info!(
            "Order {} status updated from '{}' to '{}'",
            order_id, old_status, new_status
        );

        match new_status {
            OrderStatus::Cancelled => {
                self.refund_if_paid(&updated, "Refund for cancelled order").await;
            }
            OrderStatus::Returned => {
                self.refund_if_paid(&updated, "Refund for returned order").await;
            }
            _ => {}
        }

        self.event_sender
            .publish(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        Ok(updated)
    }

    /// Re-attempts payment for an order whose previous attempt failed.
    ///
    /// `wallet` settles immediately; `cod` switches the order to cash on
    /// delivery. Gateway retries go through [`super::payments::GatewayService`].
    #[instrument(skip(self))]
    pub async fn retry_payment(
        &self,
        user_id: &str,
        order_id: Uuid,
        method: PaymentMethod,
    ) -> Result<Order, ServiceError> {
        let wallets = self.wallets.clone();
        let updated = self.apply(order_id, Some(user_id), |order| {
            if order.payment_status != PaymentStatus::Failed {
                return Err(ServiceError::Conflict(format!(
                    "Payment for order {} is {}, not failed",
                    order.id, order.payment_status
                )));
            }
            if order.order_status.is_terminal() {
                return Err(ServiceError::InvalidStatus(format!(
                    "Cannot retry payment for a {} order",
                    order.order_status
                )));
            }

            match method {
                PaymentMethod::Razorpay => Err(ServiceError::BadRequest(
                    "Gateway payments are retried by creating a new gateway order".to_string(),
                )),
                PaymentMethod::Cod => {
                    order.payment_method = PaymentMethod::Cod;
                    order.payment_status = PaymentStatus::Pending;
                    Ok(())
                }
                PaymentMethod::Wallet => {
                    // Debit last: any earlier rejection must not touch the balance
                    wallets.debit(
                        user_id,
                        order.total_amount,
                        &format!("Payment for order {}", order.id),
                        Some(order.id),
                    )?;
                    order.payment_method = PaymentMethod::Wallet;
                    order.payment_status = PaymentStatus::Paid;
                    Ok(())
                }
            }
        });

        let updated = match updated {
            Ok(order) => order,
            Err(e) => {
                warn!(order_id = %order_id, method = %method, "Payment retry rejected: {}", e);
                return Err(e);
            }
        };

        PAYMENT_RETRIES
            .with_label_values(&[&method.to_string()])
            .inc();
        info!(order_id = %order_id, method = %method, "Payment retried");

        self.event_sender
            .publish(Event::PaymentMethodChanged { order_id, method })
            .await;
        if updated.payment_status == PaymentStatus::Paid {
            self.event_sender
                .publish(Event::PaymentCaptured { order_id, method })
                .await;
        }

        Ok(updated)
    }

    async fn refund_if_paid(&self, order: &Order, reason: &str) -> Option<Decimal> {
        if order.payment_status != PaymentStatus::Paid || order.total_amount <= Decimal::ZERO {
            return None;
        }

        match self
            .wallets
            .credit(&order.user_id, order.total_amount, reason, Some(order.id))
        {
            Ok(_) => {
                self.event_sender
                    .publish(Event::WalletCredited {
                        user_id: order.user_id.clone(),
                        amount: order.total_amount,
                        order_id: Some(order.id),
                    })
                    .await;
                Some(order.total_amount)
            }
            Err(e) => {
                error!(order_id = %order.id, "Failed to refund order: {}", e);
                None
            }
        }
    }
}
