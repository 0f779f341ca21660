use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// Reasons a coupon cannot be applied to a cart.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CouponRejection {
    #[error("coupon is no longer active")]
    Inactive,
    #[error("coupon is not valid yet")]
    NotYetValid,
    #[error("coupon has expired")]
    Expired,
    #[error("minimum order amount for this coupon is {0}")]
    BelowMinimum(Decimal),
    #[error("coupon usage limit reached")]
    UsageExhausted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redeemable_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub used_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_user_limit: Option<u32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Coupon {
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    pub fn has_remaining_uses(&self) -> bool {
        self.usage_limit
            .map(|limit| self.used_count < limit)
            .unwrap_or(true)
    }

    /// Checks every rule that does not depend on who is redeeming.
    pub fn check_applicable(
        &self,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), CouponRejection> {
        if !self.active {
            return Err(CouponRejection::Inactive);
        }
        if now < self.valid_from {
            return Err(CouponRejection::NotYetValid);
        }
        if now > self.valid_until {
            return Err(CouponRejection::Expired);
        }
        if subtotal < self.min_amount {
            return Err(CouponRejection::BelowMinimum(self.min_amount));
        }
        if !self.has_remaining_uses() {
            return Err(CouponRejection::UsageExhausted);
        }
        Ok(())
    }

    /// Discount granted on `subtotal`, never more than the subtotal itself.
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let pct = subtotal * self.discount_value / Decimal::ONE_HUNDRED;
                match self.max_redeemable_amount {
                    Some(cap) => pct.min(cap),
                    None => pct,
                }
            }
            DiscountType::Fixed => self.discount_value,
        };
        raw.max(Decimal::ZERO).min(subtotal).round_dp(2)
    }
}
