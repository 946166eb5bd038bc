//! In-memory coupon store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::coupon::{normalize_code, Coupon, CouponUsage};
use crate::domain::foundation::{CouponId, DomainError, ErrorCode, PaymentId, Timestamp, UserId};
use crate::ports::CouponRepository;

#[derive(Default)]
struct CouponState {
    coupons: HashMap<CouponId, Coupon>,
    usages: Vec<CouponUsage>,
}

/// Coupons and their usages held in memory.
#[derive(Default)]
pub struct InMemoryCouponRepository {
    state: Mutex<CouponState>,
}

impl InMemoryCouponRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a coupon.
    pub async fn insert(&self, coupon: Coupon) {
        self.state.lock().await.coupons.insert(coupon.id, coupon);
    }

    /// Records a usage and increments the coupon's counter.
    ///
    /// Fails without side effects when the coupon is unknown, exhausted,
    /// at its per-user cap or already used by the same payment.
    pub(crate) async fn consume(&self, usage: &CouponUsage) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;

        if state.usages.iter().any(|u| u.payment_id == usage.payment_id) {
            return Err(DomainError::new(
                ErrorCode::DuplicateEvent,
                format!("payment {} already used a coupon", usage.payment_id),
            ));
        }
        let coupon = state.coupons.get(&usage.coupon_id).ok_or_else(|| {
            DomainError::new(ErrorCode::CouponNotFound, "coupon not found")
                .with_detail("coupon_id", usage.coupon_id.to_string())
        })?;
        if let Some(max_uses) = coupon.max_uses {
            if coupon.current_uses >= max_uses {
                return Err(exhausted(&coupon.code, "has no uses left"));
            }
        }
        if let Some(user_id) = &usage.user_id {
            let held = state
                .usages
                .iter()
                .filter(|u| u.coupon_id == usage.coupon_id && u.user_id.as_ref() == Some(user_id))
                .count() as i64;
            if coupon.check_user_limit(held).is_err() {
                return Err(exhausted(&coupon.code, "has no uses left for this user"));
            }
        }

        if let Some(coupon) = state.coupons.get_mut(&usage.coupon_id) {
            coupon.current_uses += 1;
            coupon.updated_at = Timestamp::now();
        }
        state.usages.push(usage.clone());
        Ok(())
    }

    /// Drops the payment's usage and gives the use back. No-op without one.
    pub(crate) async fn release(&self, payment_id: &PaymentId) {
        let mut state = self.state.lock().await;
        let Some(index) = state.usages.iter().position(|u| &u.payment_id == payment_id) else {
            return;
        };
        let usage = state.usages.remove(index);
        if let Some(coupon) = state.coupons.get_mut(&usage.coupon_id) {
            coupon.current_uses = (coupon.current_uses - 1).max(0);
            coupon.updated_at = Timestamp::now();
        }
    }
}

fn exhausted(code: &str, reason: &str) -> DomainError {
    DomainError::new(
        ErrorCode::ValidationFailed,
        format!("coupon {} {}", code, reason),
    )
    .with_detail("field", "coupon_code")
}

#[async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError> {
        let Ok(code) = normalize_code(code) else {
            return Ok(None);
        };
        let state = self.state.lock().await;
        Ok(state.coupons.values().find(|c| c.code == code).cloned())
    }

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError> {
        Ok(self.state.lock().await.coupons.get(id).cloned())
    }

    async fn find_usage_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<CouponUsage>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .usages
            .iter()
            .find(|u| &u.payment_id == payment_id)
            .cloned())
    }

    async fn count_user_usages(
        &self,
        coupon_id: &CouponId,
        user_id: &UserId,
    ) -> Result<i64, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .usages
            .iter()
            .filter(|u| &u.coupon_id == coupon_id && u.user_id.as_ref() == Some(user_id))
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coupon::DiscountType;

    fn usage(coupon: &Coupon) -> CouponUsage {
        CouponUsage::new(coupon.id, PaymentId::new(), None, None, 10.0)
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let repo = InMemoryCouponRepository::new();
        repo.insert(Coupon::new("WELCOME", DiscountType::Fixed, 10.0).unwrap())
            .await;

        assert!(repo.find_by_code(" welcome ").await.unwrap().is_some());
        assert!(repo.find_by_code("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn consume_stops_at_max_uses() {
        let repo = InMemoryCouponRepository::new();
        let mut coupon = Coupon::new("ONCE", DiscountType::Fixed, 10.0).unwrap();
        coupon.max_uses = Some(1);
        repo.insert(coupon.clone()).await;

        repo.consume(&usage(&coupon)).await.unwrap();
        assert!(repo.consume(&usage(&coupon)).await.is_err());

        let stored = repo.find_by_id(&coupon.id).await.unwrap().unwrap();
        assert_eq!(stored.current_uses, 1);
    }

    #[tokio::test]
    async fn one_usage_per_payment() {
        let repo = InMemoryCouponRepository::new();
        let coupon = Coupon::new("MANY", DiscountType::Fixed, 10.0).unwrap();
        repo.insert(coupon.clone()).await;

        let first = usage(&coupon);
        repo.consume(&first).await.unwrap();
        assert!(repo.consume(&first).await.is_err());
        assert_eq!(
            repo.find_usage_by_payment(&first.payment_id).await.unwrap(),
            Some(first)
        );
    }

    #[tokio::test]
    async fn consume_stops_at_per_user_cap() {
        let repo = InMemoryCouponRepository::new();
        let mut coupon = Coupon::new("PERUSER", DiscountType::Fixed, 10.0).unwrap();
        coupon.max_uses_per_user = Some(1);
        repo.insert(coupon.clone()).await;

        let ana = UserId::new("user-ana").unwrap();
        let bia = UserId::new("user-bia").unwrap();
        let for_user = |user: &UserId| {
            CouponUsage::new(coupon.id, PaymentId::new(), None, Some(user.clone()), 10.0)
        };

        repo.consume(&for_user(&ana)).await.unwrap();
        let err = repo.consume(&for_user(&ana)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        repo.consume(&for_user(&bia)).await.unwrap();

        assert_eq!(repo.count_user_usages(&coupon.id, &ana).await.unwrap(), 1);
        let stored = repo.find_by_id(&coupon.id).await.unwrap().unwrap();
        assert_eq!(stored.current_uses, 2);
    }

    #[tokio::test]
    async fn release_gives_the_use_back() {
        let repo = InMemoryCouponRepository::new();
        let mut coupon = Coupon::new("ONCE", DiscountType::Fixed, 10.0).unwrap();
        coupon.max_uses = Some(1);
        repo.insert(coupon.clone()).await;

        let first = usage(&coupon);
        repo.consume(&first).await.unwrap();
        repo.release(&first.payment_id).await;
        repo.release(&first.payment_id).await;

        assert_eq!(repo.find_usage_by_payment(&first.payment_id).await.unwrap(), None);
        assert_eq!(repo.find_by_id(&coupon.id).await.unwrap().unwrap().current_uses, 0);
        repo.consume(&usage(&coupon)).await.unwrap();
    }
}
