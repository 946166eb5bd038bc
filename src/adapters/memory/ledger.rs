//! In-memory payment ledger.
//!
//! A single mutex serializes every write, which gives the same guarantees as
//! the row lock the Postgres ledger takes: checks and writes happen as one
//! unit, and a failed check leaves nothing behind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::InMemoryCouponRepository;
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, RevenueSplitId};
use crate::domain::payment::{Payment, PaymentTransaction};
use crate::domain::revenue::{RevenueSplit, RevenueSplitStatus};
use crate::ports::{
    LedgerWrite, NewLedgerEntry, PaymentLedger, RevenueSplitRepository, TransitionOutcome,
};

#[derive(Default)]
struct LedgerState {
    payments: HashMap<PaymentId, Payment>,
    /// Append-only, in insertion order.
    transactions: Vec<PaymentTransaction>,
    splits: HashMap<RevenueSplitId, RevenueSplit>,
}

impl LedgerState {
    fn has_key(&self, payment_id: &PaymentId, key: &str) -> bool {
        self.transactions
            .iter()
            .any(|t| &t.payment_id == payment_id && t.idempotency_key.as_deref() == Some(key))
    }

    fn check_split(&self, split: Option<&RevenueSplit>) -> Result<(), DomainError> {
        match split {
            Some(split) if self.splits.values().any(|s| s.payment_id == split.payment_id) => {
                Err(DomainError::database(format!(
                    "payment {} already has a revenue split",
                    split.payment_id
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Payments, audit trail and revenue splits held in memory.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    coupons: Arc<InMemoryCouponRepository>,
}

impl InMemoryLedger {
    /// Coupon usages are recorded in `coupons` as part of each write.
    pub fn new(coupons: Arc<InMemoryCouponRepository>) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            coupons,
        }
    }

    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }

    async fn consume_coupon(
        &self,
        usage: Option<&crate::domain::coupon::CouponUsage>,
    ) -> Result<(), DomainError> {
        match usage {
            Some(usage) => self.coupons.consume(usage).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentLedger for InMemoryLedger {
    async fn create(&self, entry: NewLedgerEntry) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        let payment = entry.payment;

        if state.payments.contains_key(&payment.id) {
            return Err(DomainError::database(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        if let (Some(gateway), Some(gateway_payment_id)) =
            (&payment.gateway, &payment.gateway_payment_id)
        {
            let taken = state.payments.values().any(|p| {
                p.gateway.as_ref() == Some(gateway)
                    && p.gateway_payment_id.as_ref() == Some(gateway_payment_id)
            });
            if taken {
                return Err(DomainError::database(format!(
                    "gateway payment {}:{} already recorded",
                    gateway, gateway_payment_id
                )));
            }
        }
        state.check_split(entry.revenue_split.as_ref())?;
        self.consume_coupon(entry.coupon_usage.as_ref()).await?;

        state.transactions.push(entry.transaction);
        if let Some(split) = entry.revenue_split {
            state.splits.insert(split.id, split);
        }
        state.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.state.lock().await.payments.get(id).cloned())
    }

    async fn find_by_gateway_id(
        &self,
        gateway: &str,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .find(|p| {
                p.gateway.as_deref() == Some(gateway)
                    && p.gateway_payment_id.as_deref() == Some(gateway_payment_id)
            })
            .cloned())
    }

    async fn find_transaction_by_key(
        &self,
        payment_id: &PaymentId,
        idempotency_key: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| {
                &t.payment_id == payment_id && t.idempotency_key.as_deref() == Some(idempotency_key)
            })
            .cloned())
    }

    async fn record_transition(
        &self,
        write: LedgerWrite,
    ) -> Result<TransitionOutcome, DomainError> {
        let mut state = self.state.lock().await;
        let payment_id = write.payment.id;

        let stored_version = state
            .payments
            .get(&payment_id)
            .map(|p| p.version)
            .ok_or_else(|| {
                DomainError::new(ErrorCode::PaymentNotFound, "payment not found")
                    .with_detail("payment_id", payment_id.to_string())
            })?;

        if let Some(key) = write.transaction.idempotency_key.as_deref() {
            if state.has_key(&payment_id, key) {
                return Ok(TransitionOutcome::Duplicate);
            }
        }
        if stored_version != write.expected_version {
            return Ok(TransitionOutcome::VersionConflict);
        }
        state.check_split(write.revenue_split.as_ref())?;
        if write.release_coupon {
            self.coupons.release(&payment_id).await;
        }

        let mut payment = write.payment;
        payment.version = write.expected_version + 1;
        state.payments.insert(payment_id, payment);
        state.transactions.push(write.transaction);
        if let Some(split) = write.revenue_split {
            state.splits.insert(split.id, split);
        }
        Ok(TransitionOutcome::Applied)
    }

    async fn list_transactions(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<PaymentTransaction>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| &t.payment_id == payment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RevenueSplitRepository for InMemoryLedger {
    async fn find_split(&self, id: &RevenueSplitId) -> Result<Option<RevenueSplit>, DomainError> {
        Ok(self.state.lock().await.splits.get(id).cloned())
    }

    async fn find_split_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<RevenueSplit>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .splits
            .values()
            .find(|s| &s.payment_id == payment_id)
            .cloned())
    }

    async fn update_split_status(
        &self,
        split: &RevenueSplit,
        expected: RevenueSplitStatus,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;
        match state.splits.get_mut(&split.id) {
            Some(stored) if stored.status == expected => {
                stored.status = split.status;
                stored.processed_at = split.processed_at;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DomainError::new(
                ErrorCode::RevenueSplitNotFound,
                "revenue split not found",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coupon::{Coupon, CouponUsage, DiscountType};
    use crate::domain::payment::{EventSource, Payer, PaymentMethod, PaymentStatus};
    use crate::ports::CouponRepository;

    fn ledger() -> (InMemoryLedger, Arc<InMemoryCouponRepository>) {
        let coupons = Arc::new(InMemoryCouponRepository::new());
        (InMemoryLedger::new(coupons.clone()), coupons)
    }

    fn payment() -> Payment {
        let payer = Payer::new("Ana", None, "123").unwrap();
        let mut payment = Payment::new(payer, 50.0, 0.0, 0.5, PaymentMethod::Pix).unwrap();
        payment.issue("sandbox", "pay_1".into(), "cus_1".into(), PaymentStatus::AwaitingPayment);
        payment
    }

    async fn seeded() -> (InMemoryLedger, Arc<InMemoryCouponRepository>, Payment) {
        let (ledger, coupons) = ledger();
        let payment = payment();
        ledger
            .create(NewLedgerEntry {
                payment: payment.clone(),
                transaction: PaymentTransaction::initial(
                    payment.id,
                    payment.status,
                    EventSource::Api,
                    "payment_created",
                ),
                coupon_usage: None,
                revenue_split: None,
            })
            .await
            .unwrap();
        (ledger, coupons, payment)
    }

    fn confirm(payment: &Payment, key: &str) -> LedgerWrite {
        let mut updated = payment.clone();
        updated.apply_transition(PaymentStatus::Confirmed, None).unwrap();
        LedgerWrite {
            payment: updated,
            expected_version: payment.version,
            transaction: PaymentTransaction::transition(
                payment.id,
                payment.status,
                PaymentStatus::Confirmed,
                EventSource::Webhook,
                "payment_confirmed",
            )
            .with_idempotency_key(key),
            release_coupon: false,
            revenue_split: None,
        }
    }

    #[tokio::test]
    async fn transition_bumps_version_and_appends() {
        let (ledger, _, payment) = seeded().await;

        let outcome = ledger.record_transition(confirm(&payment, "k1")).await.unwrap();

        assert_eq!(outcome, TransitionOutcome::Applied);
        let stored = ledger.find_by_id(&payment.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, PaymentStatus::Confirmed);
        assert_eq!(ledger.list_transactions(&payment.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn repeated_key_is_duplicate() {
        let (ledger, _, payment) = seeded().await;
        ledger.record_transition(confirm(&payment, "k1")).await.unwrap();

        let outcome = ledger.record_transition(confirm(&payment, "k1")).await.unwrap();

        assert_eq!(outcome, TransitionOutcome::Duplicate);
        assert_eq!(ledger.list_transactions(&payment.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stale_version_is_conflict() {
        let (ledger, _, payment) = seeded().await;
        ledger.record_transition(confirm(&payment, "k1")).await.unwrap();

        let outcome = ledger.record_transition(confirm(&payment, "k2")).await.unwrap();

        assert_eq!(outcome, TransitionOutcome::VersionConflict);
    }

    #[tokio::test]
    async fn exhausted_coupon_rolls_back_whole_entry() {
        let (ledger, coupons) = ledger();
        let mut coupon = Coupon::new("GONE", DiscountType::Fixed, 5.0).unwrap();
        coupon.max_uses = Some(0);
        coupons.insert(coupon.clone()).await;

        let payment = payment();
        let err = ledger
            .create(NewLedgerEntry {
                transaction: PaymentTransaction::initial(
                    payment.id,
                    payment.status,
                    EventSource::Api,
                    "payment_created",
                ),
                coupon_usage: Some(CouponUsage::new(coupon.id, payment.id, None, None, 5.0)),
                payment: payment.clone(),
                revenue_split: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert!(ledger.find_by_id(&payment.id).await.unwrap().is_none());
        assert!(ledger.list_transactions(&payment.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelling_transition_releases_coupon() {
        let (ledger, coupons) = ledger();
        let mut coupon = Coupon::new("ONCE", DiscountType::Fixed, 5.0).unwrap();
        coupon.max_uses = Some(1);
        coupons.insert(coupon.clone()).await;

        let payment = payment();
        ledger
            .create(NewLedgerEntry {
                transaction: PaymentTransaction::initial(
                    payment.id,
                    payment.status,
                    EventSource::Api,
                    "payment_created",
                ),
                coupon_usage: Some(CouponUsage::new(coupon.id, payment.id, None, None, 5.0)),
                payment: payment.clone(),
                revenue_split: None,
            })
            .await
            .unwrap();
        assert_eq!(coupons.find_by_id(&coupon.id).await.unwrap().unwrap().current_uses, 1);

        let mut cancelled = payment.clone();
        cancelled.apply_transition(PaymentStatus::Cancelled, None).unwrap();
        let outcome = ledger
            .record_transition(LedgerWrite {
                payment: cancelled,
                expected_version: payment.version,
                transaction: PaymentTransaction::transition(
                    payment.id,
                    payment.status,
                    PaymentStatus::Cancelled,
                    EventSource::Manual,
                    "payment_cancelled",
                ),
                release_coupon: true,
                revenue_split: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Applied);
        assert_eq!(coupons.find_by_id(&coupon.id).await.unwrap().unwrap().current_uses, 0);
        assert!(coupons.find_usage_by_payment(&payment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gateway_payment_id_is_unique() {
        let (ledger, _, _) = seeded().await;
        let duplicate = payment();
        let err = ledger
            .create(NewLedgerEntry {
                transaction: PaymentTransaction::initial(
                    duplicate.id,
                    duplicate.status,
                    EventSource::Api,
                    "payment_created",
                ),
                payment: duplicate,
                coupon_usage: None,
                revenue_split: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[tokio::test]
    async fn split_status_update_is_conditional() {
        let (ledger, _, payment) = seeded().await;
        let mut write = confirm(&payment, "k1");
        let split = RevenueSplit::for_payment(&write.payment, 70.0, 30.0);
        write.revenue_split = Some(split.clone());
        ledger.record_transition(write).await.unwrap();

        let mut settled = split.clone();
        settled.settle(RevenueSplitStatus::Processed).unwrap();
        assert!(ledger
            .update_split_status(&settled, RevenueSplitStatus::Pending)
            .await
            .unwrap());
        assert!(!ledger
            .update_split_status(&settled, RevenueSplitStatus::Pending)
            .await
            .unwrap());
    }
}
