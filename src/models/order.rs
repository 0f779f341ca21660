use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Lifecycle stage of an order.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    ReturnRequested,
    Returned,
}

impl OrderStatus {
    /// Statuses from which the customer may still cancel.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Shipped)
    }

    /// Terminal statuses never accept payment or further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }
}

/// State of the payment attempt attached to an order.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PaymentMethod {
    Cod,
    Razorpay,
    Wallet,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[validate(length(min = 1, message = "productId is required"))]
    pub product_id: String,

    #[serde(default)]
    pub product_name: String,

    #[validate(range(min = 1, max = 10000, message = "quantity must be between 1 and 10000"))]
    pub quantity: u32,

    #[validate(custom = "validate_positive_price")]
    pub price: Decimal,
}

impl OrderItem {
    /// `None` when the line does not fit a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Sum of every line, or `None` on overflow.
pub fn checked_subtotal(items: &[OrderItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_total()?))
}

/// Largest unit price accepted at checkout.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

fn validate_positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || price.is_zero() {
        let mut err = ValidationError::new("price");
        err.message = Some("price must be greater than zero".into());
        return Err(err);
    }
    if *price > MAX_UNIT_PRICE {
        let mut err = ValidationError::new("price");
        err.message = Some(format!("price must not exceed {}", MAX_UNIT_PRICE).into());
        return Err(err);
    }
    Ok(())
}

/// A placed order. Orders are never deleted, only moved between statuses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub return_attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        user_id: impl Into<String>,
        items: Vec<OrderItem>,
        discount: Decimal,
        coupon_code: Option<String>,
        payment_method: PaymentMethod,
    ) -> Self {
        let subtotal = items
            .iter()
            .fold(Decimal::ZERO, |acc, item| {
                acc.saturating_add(item.price.saturating_mul(Decimal::from(item.quantity)))
            })
            .round_dp(2);
        let discount = discount.min(subtotal).round_dp(2);
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            items,
            subtotal,
            discount,
            total_amount: subtotal - discount,
            coupon_code,
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method,
            gateway_order_id: None,
            gateway_payment_id: None,
            cancellation_reason: None,
            return_reason: None,
            return_attachments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_unpaid(&self) -> bool {
        self.payment_status != PaymentStatus::Paid
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
