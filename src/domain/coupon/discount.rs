//! Coupon entity and discount engine.
//!
//! # Evaluation Order
//!
//! A coupon yields zero discount as soon as one check fails:
//!
//! 1. Coupon is active
//! 2. Order meets the minimum amount (if set)
//! 3. Uses remain under the cap (if set)
//! 4. "Now" falls within `[starts_at, expires_at]` (either bound optional)
//!
//! The resulting discount is always capped at the order amount.

use crate::domain::foundation::{CouponId, CourseId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How the discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` is a percentage of the order amount.
    Percentage,
    /// `value` is an absolute amount.
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            other => Err(ValidationError::invalid_format(
                "discount_type",
                format!("unknown discount type '{}'", other),
            )),
        }
    }
}

/// Why a coupon produced no discount.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CouponIneligibility {
    #[error("coupon is inactive")]
    Inactive,

    #[error("order amount {order_amount} is below the minimum of {minimum}")]
    BelowMinimumOrder { order_amount: f64, minimum: f64 },

    #[error("coupon has reached its maximum of {max_uses} uses")]
    Exhausted { max_uses: i32 },

    #[error("coupon has reached its maximum of {max_uses} uses for this user")]
    UserLimitReached { max_uses: i32 },

    #[error("coupon is not valid yet")]
    NotStarted,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon does not apply to this course")]
    CourseNotCovered,

    #[error("order amount is zero")]
    EmptyOrder,
}

/// A discount instrument with usage and validity constraints.
///
/// # Invariants
///
/// - `current_uses <= max_uses` when `max_uses` is set
/// - A computed discount never exceeds the order amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Normalized to uppercase.
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub max_discount_amount: Option<f64>,
    pub min_order_amount: Option<f64>,
    pub max_uses: Option<i32>,
    pub max_uses_per_user: Option<i32>,
    pub current_uses: i32,
    /// `None` applies to every course.
    pub course_ids: Option<Vec<CourseId>>,
    pub starts_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Coupon {
    /// Creates an active, unrestricted coupon.
    ///
    /// # Errors
    ///
    /// Returns error if the code is blank or the value is not positive.
    pub fn new(
        code: &str,
        discount_type: DiscountType,
        discount_value: f64,
    ) -> Result<Self, ValidationError> {
        let code = normalize_code(code)?;
        if !(discount_value.is_finite() && discount_value > 0.0) {
            return Err(ValidationError::not_positive("discount_value", discount_value));
        }
        let now = Timestamp::now();
        Ok(Self {
            id: CouponId::new(),
            code,
            discount_type,
            discount_value,
            max_discount_amount: None,
            min_order_amount: None,
            max_uses: None,
            max_uses_per_user: None,
            current_uses: 0,
            course_ids: None,
            starts_at: None,
            expires_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Discount for `order_amount` evaluated now.
    pub fn calculate_discount(&self, order_amount: f64) -> f64 {
        self.calculate_discount_at(order_amount, Timestamp::now())
    }

    /// Discount for `order_amount` evaluated at `now`. Zero when ineligible.
    pub fn calculate_discount_at(&self, order_amount: f64, now: Timestamp) -> f64 {
        match self.check_eligibility(order_amount, now) {
            Ok(()) => self.raw_discount(order_amount),
            Err(_) => 0.0,
        }
    }

    /// Runs the eligibility checks in order, reporting the first failure.
    pub fn check_eligibility(
        &self,
        order_amount: f64,
        now: Timestamp,
    ) -> Result<(), CouponIneligibility> {
        if !(order_amount.is_finite() && order_amount > 0.0) {
            return Err(CouponIneligibility::EmptyOrder);
        }
        if !self.is_active {
            return Err(CouponIneligibility::Inactive);
        }
        if let Some(minimum) = self.min_order_amount {
            if order_amount < minimum {
                return Err(CouponIneligibility::BelowMinimumOrder {
                    order_amount,
                    minimum,
                });
            }
        }
        if let Some(max_uses) = self.max_uses {
            if self.current_uses >= max_uses {
                return Err(CouponIneligibility::Exhausted { max_uses });
            }
        }
        if let Some(starts_at) = self.starts_at {
            if now.is_before(&starts_at) {
                return Err(CouponIneligibility::NotStarted);
            }
        }
        if let Some(expires_at) = self.expires_at {
            if now.is_after(&expires_at) {
                return Err(CouponIneligibility::Expired);
            }
        }
        Ok(())
    }

    /// Checks the per-user cap against the uses `user_uses` already holds.
    pub fn check_user_limit(&self, user_uses: i64) -> Result<(), CouponIneligibility> {
        match self.max_uses_per_user {
            Some(max_uses) if user_uses >= i64::from(max_uses) => {
                Err(CouponIneligibility::UserLimitReached { max_uses })
            }
            _ => Ok(()),
        }
    }

    /// Whether the coupon's course scope includes `course_id`.
    ///
    /// Orders without a course only match unscoped coupons.
    pub fn applies_to_course(&self, course_id: Option<&CourseId>) -> bool {
        match (&self.course_ids, course_id) {
            (None, _) => true,
            (Some(ids), Some(course_id)) => ids.contains(course_id),
            (Some(_), None) => false,
        }
    }

    fn raw_discount(&self, order_amount: f64) -> f64 {
        let discount = match self.discount_type {
            DiscountType::Percentage => {
                let pct = order_amount * self.discount_value / 100.0;
                match self.max_discount_amount {
                    Some(cap) => pct.min(cap),
                    None => pct,
                }
            }
            DiscountType::Fixed => self.discount_value,
        };
        discount.clamp(0.0, order_amount)
    }
}

/// Trims and uppercases a coupon code.
pub fn normalize_code(code: &str) -> Result<String, ValidationError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty_field("coupon_code"));
    }
    Ok(trimmed.to_uppercase())
}

/// Encodes a course scope as the JSON array string stored in `course_ids`.
pub fn encode_course_ids(course_ids: Option<&[CourseId]>) -> Option<String> {
    course_ids.map(|ids| {
        let values: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        serde_json::Value::from(values).to_string()
    })
}

/// Decodes the stored `course_ids` column. `None`, empty or `null` means all courses.
pub fn decode_course_ids(raw: Option<&str>) -> Result<Option<Vec<CourseId>>, ValidationError> {
    let raw = match raw.map(str::trim) {
        None | Some("") | Some("null") => return Ok(None),
        Some(raw) => raw,
    };
    let values: Vec<String> = serde_json::from_str(raw)
        .map_err(|e| ValidationError::invalid_format("course_ids", e.to_string()))?;
    values
        .iter()
        .map(|v| {
            v.parse::<CourseId>()
                .map_err(|e| ValidationError::invalid_format("course_ids", e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
