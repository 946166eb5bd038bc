//! Record of a coupon applied to a payment.

use crate::domain::foundation::{
    CouponId, CouponUsageId, EnrollmentId, PaymentId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

/// Immutable, one per payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponUsage {
    pub id: CouponUsageId,
    pub coupon_id: CouponId,
    pub payment_id: PaymentId,
    pub enrollment_id: Option<EnrollmentId>,
    pub user_id: Option<UserId>,
    pub discount_amount: f64,
    pub created_at: Timestamp,
}

impl CouponUsage {
    pub fn new(
        coupon_id: CouponId,
        payment_id: PaymentId,
        enrollment_id: Option<EnrollmentId>,
        user_id: Option<UserId>,
        discount_amount: f64,
    ) -> Self {
        Self {
            id: CouponUsageId::new(),
            coupon_id,
            payment_id,
            enrollment_id,
            user_id,
            discount_amount,
            created_at: Timestamp::now(),
        }
    }
}
