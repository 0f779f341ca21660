use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    errors::ServiceError,
    models::{Coupon, CouponRejection, DiscountType},
};

/// Coupon catalog plus per-user redemption counts.
#[derive(Clone, Default)]
pub struct CouponService {
    coupons: Arc<DashMap<String, Coupon>>,
    redemptions: Arc<DashMap<(String, String), u32>>,
}

impl CouponService {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }

    pub fn upsert(&self, mut coupon: Coupon) {
        coupon.code = Self::normalize(&coupon.code);
        self.coupons.insert(coupon.code.clone(), coupon);
    }

    /// Coupons a shopper can currently see: active, in window, not exhausted.
    pub fn list_offered(&self, now: DateTime<Utc>) -> Vec<Coupon> {
        let mut offered: Vec<Coupon> = self
            .coupons
            .iter()
            .filter(|c| c.active && c.is_within_window(now) && c.has_remaining_uses())
            .map(|c| c.clone())
            .collect();
        offered.sort_by(|a, b| a.code.cmp(&b.code));
        offered
    }

    /// Validates `code` for `user_id` and consumes one use, returning the
    /// discount on `subtotal`.
    ///
    /// The coupon entry stays locked from the checks through the increment.
    #[instrument(skip(self))]
    pub fn redeem(
        &self,
        code: &str,
        user_id: &str,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Decimal, ServiceError> {
        let code = Self::normalize(code);
        let mut coupon = self
            .coupons
            .get_mut(&code)
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", code)))?;

        coupon.check_applicable(subtotal, now)?;

        let mut used_by_user = self
            .redemptions
            .entry((code.clone(), user_id.to_string()))
            .or_insert(0);
        if let Some(limit) = coupon.per_user_limit {
            if *used_by_user >= limit {
                return Err(CouponRejection::UsageExhausted.into());
            }
        }

        *used_by_user += 1;
        coupon.used_count += 1;
        info!(%code, %user_id, "coupon redeemed");
        Ok(coupon.discount_for(subtotal))
    }

    /// Gives back a use taken by [`CouponService::redeem`] when the checkout
    /// that took it failed.
    pub fn release(&self, code: &str, user_id: &str) {
        let code = Self::normalize(code);
        if let Some(mut coupon) = self.coupons.get_mut(&code) {
            coupon.used_count = coupon.used_count.saturating_sub(1);
            if let Some(mut used) = self.redemptions.get_mut(&(code.clone(), user_id.to_string())) {
                *used = used.saturating_sub(1);
            }
        }
        info!(%code, %user_id, "coupon use released");
    }

    /// Starter catalog used by development deployments.
    pub fn seed_defaults(&self) {
        let now = Utc::now();
        self.upsert(Coupon {
            code: "WELCOME10".into(),
            description: Some("10% off your first order".into()),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            min_amount: dec!(500),
            max_redeemable_amount: Some(dec!(250)),
            usage_limit: Some(1000),
            used_count: 0,
            per_user_limit: Some(1),
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(90),
            active: true,
        });
        self.upsert(Coupon {
            code: "FLAT100".into(),
            description: Some("Flat 100 off orders above 1000".into()),
            discount_type: DiscountType::Fixed,
            discount_value: dec!(100),
            min_amount: dec!(1000),
            max_redeemable_amount: None,
            usage_limit: None,
            used_count: 0,
            per_user_limit: Some(3),
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(30),
            active: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn redeem_is_case_insensitive_and_enforces_per_user_limit() {
        let coupons = CouponService::new();
        coupons.seed_defaults();
        let now = Utc::now();

        let discount = coupons.redeem("welcome10", "u1", dec!(1000), now).unwrap();
        assert_eq!(discount, dec!(100));

        assert_matches!(
            coupons.redeem("WELCOME10", "u1", dec!(1000), now),
            Err(ServiceError::CouponRejected(CouponRejection::UsageExhausted))
        );
        assert!(coupons.redeem("WELCOME10", "u2", dec!(1000), now).is_ok());
    }

    #[test]
    fn released_use_can_be_redeemed_again() {
        let coupons = CouponService::new();
        coupons.seed_defaults();
        let now = Utc::now();

        coupons.redeem("WELCOME10", "u1", dec!(1000), now).unwrap();
        coupons.release("WELCOME10", "u1");
        assert!(coupons.redeem("WELCOME10", "u1", dec!(1000), now).is_ok());
    }

    #[test]
    fn concurrent_redemptions_respect_the_usage_limit() {
        let coupons = CouponService::new();
        let now = Utc::now();
        coupons.upsert(Coupon {
            code: "LIMITED".into(),
            description: None,
            discount_type: DiscountType::Fixed,
            discount_value: dec!(10),
            min_amount: Decimal::ZERO,
            max_redeemable_amount: None,
            usage_limit: Some(5),
            used_count: 0,
            per_user_limit: Some(1),
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            active: true,
        });

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let coupons = coupons.clone();
                let user = if i % 2 == 0 { "shared".to_string() } else { format!("u{}", i) };
                std::thread::spawn(move || coupons.redeem("LIMITED", &user, dec!(100), now).is_ok())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(granted, 5);
        assert_eq!(coupons.list_offered(now).len(), 0);
        assert_matches!(
            coupons.redeem("LIMITED", "late", dec!(100), now),
            Err(ServiceError::CouponRejected(CouponRejection::UsageExhausted))
        );
    }

    #[test]
    fn unknown_code_is_not_found() {
        let coupons = CouponService::new();
        assert_matches!(
            coupons.redeem("NOPE", "u1", dec!(10), Utc::now()),
            Err(ServiceError::NotFound(_))
        );
    }

    #[test]
    fn offered_list_hides_expired_coupons() {
        let coupons = CouponService::new();
        coupons.seed_defaults();
        assert_eq!(coupons.list_offered(Utc::now()).len(), 2);
        assert_eq!(
            coupons.list_offered(Utc::now() + Duration::days(60)).len(),
            1
        );
    }
}
