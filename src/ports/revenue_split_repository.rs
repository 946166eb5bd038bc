//! RevenueSplitRepository port.
//!
//! Splits are inserted by the ledger together with the transition that
//! triggers them. This port covers reads and settlement.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId, RevenueSplitId};
use crate::domain::revenue::{RevenueSplit, RevenueSplitStatus};

#[async_trait]
pub trait RevenueSplitRepository: Send + Sync {
    async fn find_split(&self, id: &RevenueSplitId) -> Result<Option<RevenueSplit>, DomainError>;

    async fn find_split_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<RevenueSplit>, DomainError>;

    /// Persist a settled split.
    ///
    /// Only succeeds if the stored status is still `expected`; returns
    /// `false` otherwise.
    async fn update_split_status(
        &self,
        split: &RevenueSplit,
        expected: RevenueSplitStatus,
    ) -> Result<bool, DomainError>;
}
