//! Coupon validation and discount arithmetic.
//!
//! Validation is read-only; marking a coupon as used is a separate,
//! mutating call owned by the HTTP layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            other => Err(format!("invalid discount type: {other}")),
        }
    }
}

/// Everything validation needs to know about a coupon, detached from how
/// the record is stored.
#[derive(Clone, Debug)]
pub struct CouponTerms {
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub per_user_limit: i32,
    pub min_order_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CouponRejection {
    #[error("this coupon is no longer active")]
    Inactive,
    #[error("this coupon has expired")]
    Expired,
    #[error("this coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("you have already used this coupon")]
    PerUserLimitReached,
    #[error("minimum order amount of {0} required for this coupon")]
    BelowMinimum(Decimal),
}

/// Side-effect-free eligibility check. `user_uses` is how many times the
/// calling user already appears in the coupon's used-by list.
pub fn validate(
    terms: &CouponTerms,
    now: DateTime<Utc>,
    user_uses: i32,
    order_amount: Decimal,
) -> Result<(), CouponRejection> {
    if !terms.is_active {
        return Err(CouponRejection::Inactive);
    }
    if terms.expires_at < now {
        return Err(CouponRejection::Expired);
    }
    if let Some(limit) = terms.usage_limit {
        if terms.used_count >= limit {
            return Err(CouponRejection::UsageLimitReached);
        }
    }
    if user_uses >= terms.per_user_limit {
        return Err(CouponRejection::PerUserLimitReached);
    }
    if order_amount < terms.min_order_amount {
        return Err(CouponRejection::BelowMinimum(terms.min_order_amount));
    }
    Ok(())
}

/// Discount for a given order amount, rounded to 2 dp. Percentage coupons
/// are clipped to `max_discount` when set; no coupon ever discounts more
/// than the order itself.
pub fn discount(
    discount_type: DiscountType,
    value: Decimal,
    max_discount: Option<Decimal>,
    order_amount: Decimal,
) -> Decimal {
    let raw = match discount_type {
        DiscountType::Percentage => {
            let pct = order_amount * value / Decimal::from(100);
            match max_discount {
                Some(cap) => pct.min(cap),
                None => pct,
            }
        }
        DiscountType::Fixed => value,
    };
    raw.min(order_amount).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn terms() -> CouponTerms {
        CouponTerms {
            is_active: true,
            expires_at: Utc::now() + Duration::days(7),
            usage_limit: None,
            used_count: 0,
            per_user_limit: 1,
            min_order_amount: dec!(500),
        }
    }

    #[test]
    fn save10_scenario() {
        // 10% off a 1000 order with a 500 minimum and no cap.
        let t = terms();
        assert!(validate(&t, Utc::now(), 0, dec!(1000)).is_ok());
        let d = discount(DiscountType::Percentage, dec!(10), None, dec!(1000));
        assert_eq!(d, dec!(100.00));
    }

    #[test]
    fn percentage_respects_cap() {
        let d = discount(DiscountType::Percentage, dec!(50), Some(dec!(120)), dec!(1000));
        assert_eq!(d, dec!(120));
    }

    #[test]
    fn discount_never_exceeds_order_amount() {
        let d = discount(DiscountType::Fixed, dec!(300), None, dec!(200));
        assert_eq!(d, dec!(200));
        let d = discount(DiscountType::Percentage, dec!(150), None, dec!(80));
        assert_eq!(d, dec!(80));
    }

    #[test]
    fn fixed_discount_is_flat() {
        let d = discount(DiscountType::Fixed, dec!(75), Some(dec!(10)), dec!(500));
        // The cap only applies to percentage coupons.
        assert_eq!(d, dec!(75));
    }

    #[test]
    fn rounding_is_two_places() {
        let d = discount(DiscountType::Percentage, dec!(7), None, dec!(99.99));
        assert_eq!(d, dec!(7.00));
    }

    #[test]
    fn rejects_inactive_expired_and_exhausted() {
        let now = Utc::now();
        let mut t = terms();
        t.is_active = false;
        assert_eq!(validate(&t, now, 0, dec!(1000)), Err(CouponRejection::Inactive));

        let mut t = terms();
        t.expires_at = now - Duration::hours(1);
        assert_eq!(validate(&t, now, 0, dec!(1000)), Err(CouponRejection::Expired));

        let mut t = terms();
        t.usage_limit = Some(5);
        t.used_count = 5;
        assert_eq!(validate(&t, now, 0, dec!(1000)), Err(CouponRejection::UsageLimitReached));
    }

    #[test]
    fn per_user_limit_counts_prior_uses() {
        let t = terms();
        assert_eq!(
            validate(&t, Utc::now(), 1, dec!(1000)),
            Err(CouponRejection::PerUserLimitReached)
        );
    }

    #[test]
    fn minimum_order_amount_enforced() {
        let t = terms();
        assert_eq!(
            validate(&t, Utc::now(), 0, dec!(499.99)),
            Err(CouponRejection::BelowMinimum(dec!(500)))
        );
    }
}
