//! Canonical payment status state machine.
//!
//! Every provider status is translated into one of these values at the
//! adapter boundary. The string forms are stored verbatim in the ledger.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider-independent payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Created locally, not yet acknowledged by the gateway.
    Pending,

    /// Charge issued; waiting for the payer (PIX QR, boleto slip).
    AwaitingPayment,

    /// Gateway confirmed the payment. Funds not yet available.
    Confirmed,

    /// Funds received and available.
    Received,

    /// Due date passed without payment. Still payable.
    Overdue,

    /// Refund requested, waiting for the gateway to settle it.
    RefundRequested,

    /// Fully refunded.
    Refunded,

    /// Part of the gross amount was refunded.
    PartiallyRefunded,

    /// Payer disputed the charge with the issuer.
    Chargeback,

    /// Charge failed (declined card, expired slip).
    Failed,

    /// Cancelled before settlement.
    Cancelled,
}

impl PaymentStatus {
    /// All statuses in declaration order.
    pub const ALL: [PaymentStatus; 11] = [
        PaymentStatus::Pending,
        PaymentStatus::AwaitingPayment,
        PaymentStatus::Confirmed,
        PaymentStatus::Received,
        PaymentStatus::Overdue,
        PaymentStatus::RefundRequested,
        PaymentStatus::Refunded,
        PaymentStatus::PartiallyRefunded,
        PaymentStatus::Chargeback,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
    ];

    /// Storage and API literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::AwaitingPayment => "awaiting_payment",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Received => "received",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::RefundRequested => "refund_requested",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Chargeback => "chargeback",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    /// True once the gateway has settled the charge in the payer's favour.
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed | PaymentStatus::Received)
    }

    /// Statuses from which the charge may still be cancelled or fail.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Pending | PaymentStatus::AwaitingPayment | PaymentStatus::Overdue
        )
    }

    /// Statuses that accept a refund request.
    pub fn is_refundable(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Confirmed | PaymentStatus::Received | PaymentStatus::PartiallyRefunded
        )
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![AwaitingPayment, Confirmed, Received, Overdue, Failed, Cancelled],
            AwaitingPayment => vec![Confirmed, Received, Overdue, Failed, Cancelled],
            Overdue => vec![Confirmed, Received, Failed, Cancelled],
            Confirmed => vec![
                Received,
                RefundRequested,
                Refunded,
                PartiallyRefunded,
                Chargeback,
            ],
            Received => vec![RefundRequested, Refunded, PartiallyRefunded, Chargeback],
            RefundRequested => vec![Refunded, PartiallyRefunded],
            PartiallyRefunded => vec![RefundRequested, Refunded],
            Refunded | Chargeback | Failed | Cancelled => vec![],
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("status", format!("unknown payment status '{}'", s))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_are_stable() {
        let literals: Vec<&str> = PaymentStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            literals,
            vec![
                "pending",
                "awaiting_payment",
                "confirmed",
                "received",
                "overdue",
                "refund_requested",
                "refunded",
                "partially_refunded",
                "chargeback",
                "failed",
                "cancelled",
            ]
        );
    }

    #[test]
    fn parses_every_literal() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
        assert!("CONFIRMED".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn serde_uses_storage_literals() {
        let json = serde_json::to_string(&PaymentStatus::AwaitingPayment).unwrap();
        assert_eq!(json, "\"awaiting_payment\"");
    }

    #[test]
    fn open_payment_can_be_paid() {
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Confirmed));
        assert!(PaymentStatus::AwaitingPayment.can_transition_to(&PaymentStatus::Received));
        assert!(PaymentStatus::Overdue.can_transition_to(&PaymentStatus::Confirmed));
    }

    #[test]
    fn open_payment_can_be_cancelled_or_fail() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::AwaitingPayment,
            PaymentStatus::Overdue,
        ] {
            assert!(status.can_transition_to(&PaymentStatus::Cancelled));
            assert!(status.can_transition_to(&PaymentStatus::Failed));
        }
    }

    #[test]
    fn paid_payment_goes_through_refund_flow() {
        assert!(PaymentStatus::Confirmed.can_transition_to(&PaymentStatus::RefundRequested));
        assert!(PaymentStatus::RefundRequested.can_transition_to(&PaymentStatus::Refunded));
        assert!(
            PaymentStatus::RefundRequested.can_transition_to(&PaymentStatus::PartiallyRefunded)
        );
    }

    #[test]
    fn lapse_one_step_refund_and_second_refund_are_allowed() {
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Overdue));
        assert!(PaymentStatus::Confirmed.can_transition_to(&PaymentStatus::Refunded));
        assert!(
            PaymentStatus::PartiallyRefunded.can_transition_to(&PaymentStatus::RefundRequested)
        );
        assert!(!PaymentStatus::Refunded.can_transition_to(&PaymentStatus::RefundRequested));
    }

    #[test]
    fn paid_payment_can_be_charged_back() {
        assert!(PaymentStatus::Confirmed.can_transition_to(&PaymentStatus::Chargeback));
        assert!(PaymentStatus::Received.can_transition_to(&PaymentStatus::Chargeback));
    }

    #[test]
    fn paid_payment_cannot_be_cancelled() {
        assert!(!PaymentStatus::Confirmed.can_transition_to(&PaymentStatus::Cancelled));
        assert!(!PaymentStatus::Received.can_transition_to(&PaymentStatus::Failed));
    }

    #[test]
    fn cancelled_payment_cannot_be_confirmed() {
        let result = PaymentStatus::Cancelled.transition_to(PaymentStatus::Confirmed);
        assert!(result.is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(PaymentStatus::Refunded.is_terminal());
        assert!(PaymentStatus::Chargeback.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Cancelled.is_terminal());
        assert!(!PaymentStatus::PartiallyRefunded.is_terminal());
    }

    #[test]
    fn no_self_transitions() {
        for status in PaymentStatus::ALL {
            assert!(!status.can_transition_to(&status), "{} -> {}", status, status);
        }
    }
}
