use chrono::{DateTime, Utc};
use common_money::Money;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::models::Coupon;
use crate::store::{Store, StoreError};

static PERCENT_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid percent pattern"));

/// Why a coupon contributed no discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponRejection {
    CouponNotFound,
    CouponDisabled,
    MinOrderNotMet,
    CouponExpired,
}

impl CouponRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponRejection::CouponNotFound => "coupon_not_found",
            CouponRejection::CouponDisabled => "coupon_disabled",
            CouponRejection::MinOrderNotMet => "min_order_not_met",
            CouponRejection::CouponExpired => "coupon_expired",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            CouponRejection::CouponNotFound => "Coupon not found",
            CouponRejection::CouponDisabled => "Coupon is disabled",
            CouponRejection::MinOrderNotMet => "Order amount does not meet the minimum requirement",
            CouponRejection::CouponExpired => "Coupon expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouponOutcome {
    pub amount: Money,
    pub reason: Option<CouponRejection>,
    pub coupon: Option<Coupon>,
}

impl CouponOutcome {
    fn rejected(reason: CouponRejection, coupon: Option<Coupon>) -> Self {
        Self {
            amount: Money::ZERO,
            reason: Some(reason),
            coupon,
        }
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn is_expired(coupon: &Coupon, now: DateTime<Utc>) -> bool {
    coupon.expiry_date.map(|exp| exp < now).unwrap_or(false)
}

/// Explicit percent, else the first "<n>%" found in the free-text discount.
pub fn coupon_percent(coupon: &Coupon) -> Option<f64> {
    coupon.percent.filter(|p| p.is_finite()).or_else(|| {
        let text = coupon.discount.as_deref()?;
        let caps = PERCENT_IN_TEXT.captures(text)?;
        caps.get(1)?.as_str().parse::<f64>().ok()
    })
}

/// Apply the coupon rules to `subtotal`. Checks short-circuit in order:
/// existence, enablement, minimum order, expiry.
pub fn evaluate(coupon: Option<Coupon>, subtotal: Money, now: DateTime<Utc>) -> CouponOutcome {
    let Some(coupon) = coupon else {
        return CouponOutcome::rejected(CouponRejection::CouponNotFound, None);
    };
    if !coupon.enabled {
        return CouponOutcome::rejected(CouponRejection::CouponDisabled, Some(coupon));
    }
    if subtotal < coupon.min_order {
        return CouponOutcome::rejected(CouponRejection::MinOrderNotMet, Some(coupon));
    }
    if is_expired(&coupon, now) {
        return CouponOutcome::rejected(CouponRejection::CouponExpired, Some(coupon));
    }

    let computed = match coupon_percent(&coupon) {
        Some(percent) => {
            let raw = subtotal.percent(percent).non_negative();
            match coupon.max_value {
                Some(cap) => raw.min(cap.non_negative()),
                None => raw,
            }
        }
        None => coupon.amount.map(Money::non_negative).unwrap_or(Money::ZERO),
    };

    CouponOutcome {
        amount: computed.min(subtotal.non_negative()),
        reason: None,
        coupon: Some(coupon),
    }
}

/// Look the code up and evaluate it. Read-only.
pub async fn resolve(
    store: &dyn Store,
    code: &str,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<CouponOutcome, StoreError> {
    let code = normalize_code(code);
    let coupon = store.find_coupon(&code).await?;
    let outcome = evaluate(coupon, subtotal, now);
    debug!(
        code = %code,
        subtotal = %subtotal,
        amount = %outcome.amount,
        reason = outcome.reason.map(|r| r.as_str()),
        "resolved coupon"
    );
    Ok(outcome)
}

/// Read-only status snapshot for `GET /coupon/status/:code`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CouponStatus {
    pub code: String,
    pub enabled: bool,
    pub expired: bool,
    pub meets_min_order: Option<bool>,
    pub min_order: Money,
    pub expiry_date: Option<DateTime<Utc>>,
    pub valid: bool,
}

pub fn status(coupon: &Coupon, price: Option<Money>, now: DateTime<Utc>) -> CouponStatus {
    let expired = is_expired(coupon, now);
    let meets_min_order = price.map(|p| p >= coupon.min_order);
    CouponStatus {
        code: coupon.code.clone(),
        enabled: coupon.enabled,
        expired,
        meets_min_order,
        min_order: coupon.min_order,
        expiry_date: coupon.expiry_date,
        valid: coupon.enabled && !expired && meets_min_order.unwrap_or(true),
    }
}
