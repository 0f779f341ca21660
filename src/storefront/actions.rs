use serde::{Deserialize, Serialize};

use crate::models::{Order, OrderStatus, PaymentStatus, ViewerRole};
use crate::storefront::status_advance::StatusAdvance;

/// Buttons shown next to an order.
///
/// A projection of the order's state for display only; the service decides
/// whether an action is actually legal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderActions {
    pub cancel: bool,
    #[serde(rename = "return")]
    pub request_return: bool,
    pub retry_payment: bool,
    pub download_invoice: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance: Option<StatusAdvance>,
}

impl OrderActions {
    pub fn for_order(status: OrderStatus, payment: PaymentStatus, role: ViewerRole) -> Self {
        if role == ViewerRole::Admin {
            return Self {
                advance: StatusAdvance::for_status(status),
                ..Self::default()
            };
        }

        Self {
            cancel: status.is_cancellable()
                && (payment != PaymentStatus::Failed || status == OrderStatus::Pending),
            request_return: status == OrderStatus::Delivered,
            retry_payment: payment == PaymentStatus::Failed,
            download_invoice: payment == PaymentStatus::Paid,
            advance: None,
        }
    }

    pub fn any(&self) -> bool {
        self.cancel
            || self.request_return
            || self.retry_payment
            || self.download_invoice
            || self.advance.is_some()
    }
}

/// An order as the storefront renders it: the order plus the viewer's actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub actions: OrderActions,
}

impl OrderView {
    pub fn new(order: Order, role: ViewerRole) -> Self {
        let actions = OrderActions::for_order(order.order_status, order.payment_status, role);
        Self { order, actions }
    }
}
