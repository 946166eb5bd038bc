//! Append-only audit trail of payment status transitions.

use super::{EventSource, PaymentStatus};
use crate::domain::foundation::{PaymentId, PaymentTransactionId, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Event type recorded for rejected transitions.
pub const ERROR_EVENT_TYPE: &str = "error";

/// One status change of a payment. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: PaymentTransactionId,
    pub payment_id: PaymentId,

    /// `None` only for the first record of a payment.
    pub previous_status: Option<PaymentStatus>,
    pub new_status: PaymentStatus,

    pub source: EventSource,
    pub event_type: String,

    pub gateway_event_id: Option<String>,

    /// Deduplication key; unique per payment.
    pub idempotency_key: Option<String>,

    pub amount: Option<f64>,

    /// Exact bytes the gateway delivered. Never re-encoded, so the stored
    /// body still verifies against its signature.
    #[serde(skip)]
    pub raw_body: Option<Vec<u8>>,

    /// Parsed copy of `raw_body` for querying; `None` when it is not JSON.
    pub raw_payload: Option<serde_json::Value>,

    /// Request metadata (actor, remote address, attempted status for anomalies).
    pub metadata: serde_json::Value,

    pub created_at: Timestamp,
}

impl PaymentTransaction {
    /// First record of a payment.
    pub fn initial(
        payment_id: PaymentId,
        status: PaymentStatus,
        source: EventSource,
        event_type: impl Into<String>,
    ) -> Self {
        Self::build(payment_id, None, status, source, event_type.into())
    }

    /// A permitted status change.
    pub fn transition(
        payment_id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        source: EventSource,
        event_type: impl Into<String>,
    ) -> Self {
        Self::build(payment_id, Some(from), to, source, event_type.into())
    }

    /// A rejected status change.
    ///
    /// Records `current → current` so replaying the trail still reproduces
    /// the stored status; the attempted status goes in the metadata.
    pub fn anomaly(
        payment_id: PaymentId,
        current: PaymentStatus,
        attempted: PaymentStatus,
        source: EventSource,
        reason: impl Into<String>,
    ) -> Self {
        let mut tx = Self::build(
            payment_id,
            Some(current),
            current,
            source,
            ERROR_EVENT_TYPE.to_string(),
        );
        tx.metadata = serde_json::json!({
            "attempted_status": attempted.as_str(),
            "reason": reason.into(),
        });
        tx
    }

    fn build(
        payment_id: PaymentId,
        previous_status: Option<PaymentStatus>,
        new_status: PaymentStatus,
        source: EventSource,
        event_type: String,
    ) -> Self {
        Self {
            id: PaymentTransactionId::new(),
            payment_id,
            previous_status,
            new_status,
            source,
            event_type,
            gateway_event_id: None,
            idempotency_key: None,
            amount: None,
            raw_body: None,
            raw_payload: None,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Timestamp::now(),
        }
    }

    pub fn with_gateway_event_id(mut self, event_id: Option<String>) -> Self {
        self.gateway_event_id = event_id;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Keeps the delivered body verbatim alongside its parsed form.
    pub fn with_raw_body(mut self, body: &[u8]) -> Self {
        self.raw_payload = serde_json::from_slice(body).ok();
        self.raw_body = Some(body.to_vec());
        self
    }

    /// Merges `key: value` into the metadata object.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if let serde_json::Value::Object(map) = &mut self.metadata {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn is_anomaly(&self) -> bool {
        self.event_type == ERROR_EVENT_TYPE
    }
}

/// The audit trail does not form a continuous chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditTrailError {
    #[error("first transaction must not have a previous status, found {0}")]
    MissingOrigin(PaymentStatus),

    #[error("transaction {index} starts from {found:?}, expected {expected}")]
    BrokenChain {
        index: usize,
        expected: PaymentStatus,
        found: Option<PaymentStatus>,
    },
}

/// Reconstructs a payment's status by replaying its trail in order.
///
/// Returns `None` for an empty trail.
pub fn replay_status(
    transactions: &[PaymentTransaction],
) -> Result<Option<PaymentStatus>, AuditTrailError> {
    let mut current: Option<PaymentStatus> = None;

    for (index, tx) in transactions.iter().enumerate() {
        match (current, tx.previous_status) {
            (None, None) => {}
            (None, Some(found)) => return Err(AuditTrailError::MissingOrigin(found)),
            (Some(expected), found) if found != Some(expected) => {
                return Err(AuditTrailError::BrokenChain {
                    index,
                    expected,
                    found,
                });
            }
            _ => {}
        }
        current = Some(tx.new_status);
    }

    Ok(current)
}
