//! CouponRepository port.
//!
//! Read side only. Uses are reserved by the ledger when it records a
//! discounted payment, and released when that payment is cancelled or fails.

use async_trait::async_trait;

use crate::domain::coupon::{Coupon, CouponUsage};
use crate::domain::foundation::{CouponId, DomainError, PaymentId, UserId};

#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Find by code. The code is normalized before lookup.
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError>;

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError>;

    /// Usage recorded for a payment, if any.
    async fn find_usage_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<CouponUsage>, DomainError>;

    /// Uses of `coupon_id` currently held by `user_id`.
    async fn count_user_usages(
        &self,
        coupon_id: &CouponId,
        user_id: &UserId,
    ) -> Result<i64, DomainError>;
}
