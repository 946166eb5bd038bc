//! PaymentLedger port - Payments and their audit trail as one store.
//!
//! Every write goes through a single unit of work so the payment row, its
//! audit record and any derived rows (revenue split, coupon usage) commit or
//! roll back together.
//!
//! ## Coupons
//!
//! A discounted payment reserves its coupon use when it is created, so a
//! capped coupon can never be handed to more payers than it has uses. The
//! confirmation that follows never touches the coupon counters. A payment
//! that is cancelled or fails gives its use back.
//!
//! ## Concurrency
//!
//! Implementations serialize writes per payment (row lock or mutex) and
//! compare `expected_version` against the stored version before writing.
//! The idempotency key is unique per payment; a second write with the same
//! key is reported as `Duplicate` and changes nothing.

use async_trait::async_trait;

use crate::domain::coupon::CouponUsage;
use crate::domain::foundation::{DomainError, PaymentId};
use crate::domain::payment::{Payment, PaymentTransaction};
use crate::domain::revenue::RevenueSplit;

/// A new payment with its first audit record.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub payment: Payment,
    pub transaction: PaymentTransaction,
    /// Reserves a coupon use. Fails the whole entry when the coupon or the
    /// user has no uses left.
    pub coupon_usage: Option<CouponUsage>,
    pub revenue_split: Option<RevenueSplit>,
}

/// A status transition (or recorded anomaly) for an existing payment.
#[derive(Debug, Clone)]
pub struct LedgerWrite {
    /// Payment state after the transition.
    pub payment: Payment,
    /// Version the payment had when it was read.
    pub expected_version: i64,
    pub transaction: PaymentTransaction,
    /// Give back the coupon use reserved at checkout.
    pub release_coupon: bool,
    pub revenue_split: Option<RevenueSplit>,
}

/// Result of [`PaymentLedger::record_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Everything was written.
    Applied,
    /// The idempotency key was already recorded. Nothing was written.
    Duplicate,
    /// The payment changed since it was read. Nothing was written.
    VersionConflict,
}

/// Port for the payment ledger and its append-only audit trail.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Insert a new payment with its initial transaction and derived rows.
    async fn create(&self, entry: NewLedgerEntry) -> Result<(), DomainError>;

    /// Find a payment by our id.
    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError>;

    /// Find a payment by the gateway that issued it and the gateway's id.
    async fn find_by_gateway_id(
        &self,
        gateway: &str,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// Transaction already recorded for the payment under this idempotency key.
    async fn find_transaction_by_key(
        &self,
        payment_id: &PaymentId,
        idempotency_key: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError>;

    /// Apply a transition atomically.
    ///
    /// Writes the payment (bumping its version), appends the transaction,
    /// inserts the optional revenue split and, when asked, releases the
    /// payment's coupon use.
    async fn record_transition(&self, write: LedgerWrite)
        -> Result<TransitionOutcome, DomainError>;

    /// Transactions for a payment, oldest first.
    async fn list_transactions(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<PaymentTransaction>, DomainError>;
}
