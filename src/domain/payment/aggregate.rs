//! Payment ledger row.
//!
//! A Payment identifies one attempted or completed charge. It is mutated only
//! through the orchestrator and is never deleted.

use super::{PaymentMethod, PaymentStatus, WebhookEvent};
use crate::domain::foundation::{
    approx_eq, round_currency, CouponId, CourseId, EnrollmentId, PaymentId, StateMachine,
    Timestamp, UserId, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Who pays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub name: String,
    pub email: Option<String>,
    /// CPF/CNPJ or other tax document.
    pub document: String,
}

impl Payer {
    pub fn new(
        name: impl Into<String>,
        email: Option<String>,
        document: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let document = document.into();
        if name.trim().is_empty() {
            return Err(ValidationError::empty_field("payer_name"));
        }
        if document.trim().is_empty() {
            return Err(ValidationError::empty_field("payer_document"));
        }
        Ok(Self {
            name,
            email,
            document,
        })
    }
}

/// Payment aggregate.
///
/// # Invariants
///
/// - `net_amount == gross_amount - discount_amount - gateway_fee` (within a cent)
/// - `refunded_amount <= gross_amount - discount_amount`
/// - `status` changes only along [`PaymentStatus`] transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub enrollment_id: Option<EnrollmentId>,
    pub course_id: Option<CourseId>,
    pub instructor_id: Option<UserId>,
    pub payer: Payer,

    pub gross_amount: f64,
    pub discount_amount: f64,
    pub net_amount: f64,
    pub gateway_fee: f64,
    pub refunded_amount: f64,

    pub method: PaymentMethod,
    pub gateway: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub installments: Option<u32>,
    pub installment_value: Option<f64>,

    pub status: PaymentStatus,
    pub coupon_id: Option<CouponId>,

    pub due_date: Option<Timestamp>,
    pub paid_at: Option<Timestamp>,
    pub refunded_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    /// Optimistic concurrency counter, bumped by the ledger on every write.
    pub version: i64,
}

impl Payment {
    /// Creates a pending payment with rounded amounts.
    ///
    /// # Errors
    ///
    /// Returns error if any amount is negative or the discount exceeds the
    /// gross amount.
    pub fn new(
        payer: Payer,
        gross_amount: f64,
        discount_amount: f64,
        gateway_fee: f64,
        method: PaymentMethod,
    ) -> Result<Self, ValidationError> {
        if !(gross_amount.is_finite() && gross_amount > 0.0) {
            return Err(ValidationError::not_positive("gross_amount", gross_amount));
        }
        if !(discount_amount.is_finite() && discount_amount >= 0.0) || discount_amount > gross_amount
        {
            return Err(ValidationError::invalid_format(
                "discount_amount",
                format!("must be between 0 and {}", gross_amount),
            ));
        }
        if !(gateway_fee.is_finite() && gateway_fee >= 0.0) {
            return Err(ValidationError::invalid_format(
                "gateway_fee",
                "must not be negative",
            ));
        }

        let gross_amount = round_currency(gross_amount);
        let discount_amount = round_currency(discount_amount);
        let gateway_fee = round_currency(gateway_fee);
        let now = Timestamp::now();

        Ok(Self {
            id: PaymentId::new(),
            enrollment_id: None,
            course_id: None,
            instructor_id: None,
            payer,
            gross_amount,
            discount_amount,
            net_amount: round_currency(gross_amount - discount_amount - gateway_fee),
            gateway_fee,
            refunded_amount: 0.0,
            method,
            gateway: None,
            gateway_payment_id: None,
            gateway_customer_id: None,
            installments: None,
            installment_value: None,
            status: PaymentStatus::Pending,
            coupon_id: None,
            due_date: None,
            paid_at: None,
            refunded_at: None,
            cancelled_at: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Records the charge a gateway issued for this payment.
    ///
    /// Sets the initial status reported by the gateway; this is the first
    /// status of the payment, not a transition.
    pub fn issue(
        &mut self,
        gateway: &str,
        gateway_payment_id: String,
        gateway_customer_id: String,
        status: PaymentStatus,
    ) {
        let now = Timestamp::now();
        self.gateway = Some(gateway.to_string());
        self.gateway_payment_id = Some(gateway_payment_id);
        self.gateway_customer_id = Some(gateway_customer_id);
        self.status = status;
        if status.is_paid() {
            self.paid_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Amount the payer is actually charged.
    pub fn charge_amount(&self) -> f64 {
        round_currency(self.gross_amount - self.discount_amount)
    }

    /// Amount still available for refund. Only what was charged can go back.
    pub fn refundable_amount(&self) -> f64 {
        round_currency((self.charge_amount() - self.refunded_amount).max(0.0))
    }

    /// Status a webhook event would move this payment to.
    ///
    /// Uses the event's canonical status when present, otherwise the status
    /// implied by its type. A refund covering less than the charged amount
    /// resolves to `PartiallyRefunded`.
    pub fn target_status_for(&self, event: &WebhookEvent) -> Option<PaymentStatus> {
        let target = event.status.or_else(|| event.event_type.implied_status())?;
        if target == PaymentStatus::Refunded {
            if let Some(refunded) = event.refunded_amount {
                if round_currency(refunded) + f64::EPSILON < self.charge_amount() {
                    return Some(PaymentStatus::PartiallyRefunded);
                }
            }
        }
        Some(target)
    }

    /// Moves to `target`, stamping the lifecycle timestamps and any amounts
    /// the event carries.
    ///
    /// # Errors
    ///
    /// Returns error if the transition is not allowed.
    pub fn apply_transition(
        &mut self,
        target: PaymentStatus,
        event: Option<&WebhookEvent>,
    ) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(target)?;
        let now = Timestamp::now();

        match target {
            PaymentStatus::Confirmed | PaymentStatus::Received => {
                if self.paid_at.is_none() {
                    self.paid_at = Some(event.and_then(|e| e.paid_at).unwrap_or(now));
                }
            }
            PaymentStatus::Refunded => {
                self.refunded_amount = self.charge_amount();
                self.refunded_at = Some(now);
            }
            PaymentStatus::PartiallyRefunded => {
                if let Some(refunded) = event.and_then(|e| e.refunded_amount) {
                    self.refunded_amount = round_currency(refunded.min(self.charge_amount()));
                }
                self.refunded_at = Some(now);
            }
            PaymentStatus::Cancelled => {
                self.cancelled_at = Some(now);
            }
            _ => {}
        }

        if let Some(event) = event {
            if self.gateway_customer_id.is_none() {
                self.gateway_customer_id = event.gateway_customer_id.clone();
            }
        }

        self.updated_at = now;
        Ok(())
    }

    /// Checks the amount invariants.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let expected_net = self.gross_amount - self.discount_amount - self.gateway_fee;
        if !approx_eq(self.net_amount, expected_net) {
            return Err(ValidationError::invalid_format(
                "net_amount",
                format!(
                    "{} does not equal gross - discount - fee ({})",
                    self.net_amount, expected_net
                ),
            ));
        }
        if self.refunded_amount > self.charge_amount() + f64::EPSILON {
            return Err(ValidationError::invalid_format(
                "refunded_amount",
                "exceeds charged amount",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::WebhookEventType;

    fn payer() -> Payer {
        Payer::new("Ana Souza", Some("ana@example.com".into()), "12345678900").unwrap()
    }

    fn pix_payment() -> Payment {
        Payment::new(payer(), 100.0, 10.0, 0.891, PaymentMethod::Pix).unwrap()
    }

    #[test]
    fn payer_requires_name_and_document() {
        assert!(Payer::new("", None, "123").is_err());
        assert!(Payer::new("Ana", None, " ").is_err());
    }

    #[test]
    fn new_payment_is_pending_with_consistent_net() {
        let payment = pix_payment();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.gateway_fee, 0.89);
        assert_eq!(payment.net_amount, 89.11);
        assert_eq!(payment.charge_amount(), 90.0);
        assert!(payment.check_invariants().is_ok());
    }

    #[test]
    fn new_payment_rejects_non_positive_gross() {
        assert!(Payment::new(payer(), 0.0, 0.0, 0.0, PaymentMethod::Pix).is_err());
        assert!(Payment::new(payer(), -1.0, 0.0, 0.0, PaymentMethod::Pix).is_err());
    }

    #[test]
    fn new_payment_rejects_discount_above_gross() {
        assert!(Payment::new(payer(), 50.0, 60.0, 0.0, PaymentMethod::Pix).is_err());
    }

    #[test]
    fn fully_discounted_payment_has_zero_net() {
        let payment = Payment::new(payer(), 80.0, 80.0, 0.0, PaymentMethod::Free).unwrap();
        assert_eq!(payment.net_amount, 0.0);
        assert_eq!(payment.charge_amount(), 0.0);
    }

    #[test]
    fn confirming_stamps_paid_at_from_event() {
        let mut payment = pix_payment();
        let paid_at = Timestamp::now().add_secs(-60);
        let event = WebhookEvent::new(
            WebhookEventType::PaymentConfirmed,
            "PAYMENT_CONFIRMED",
            "sandbox",
            "pay_1",
        )
        .with_paid_at(paid_at);

        payment
            .apply_transition(PaymentStatus::Confirmed, Some(&event))
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Confirmed);
        assert_eq!(payment.paid_at, Some(paid_at));
    }

    #[test]
    fn invalid_transition_leaves_payment_untouched() {
        let mut payment = pix_payment();
        payment.apply_transition(PaymentStatus::Cancelled, None).unwrap();
        let before = payment.clone();

        assert!(payment.apply_transition(PaymentStatus::Confirmed, None).is_err());
        assert_eq!(payment, before);
    }

    #[test]
    fn full_refund_returns_the_charged_amount() {
        let mut payment = pix_payment();
        payment.apply_transition(PaymentStatus::Confirmed, None).unwrap();
        assert_eq!(payment.refundable_amount(), 90.0);

        payment.apply_transition(PaymentStatus::Refunded, None).unwrap();

        assert_eq!(payment.refunded_amount, 90.0);
        assert_eq!(payment.refundable_amount(), 0.0);
        assert!(payment.refunded_at.is_some());
        assert!(payment.check_invariants().is_ok());
    }

    #[test]
    fn refund_of_whole_charge_is_full_despite_discount() {
        let mut payment = pix_payment();
        payment.apply_transition(PaymentStatus::Received, None).unwrap();
        let event = WebhookEvent::new(
            WebhookEventType::PaymentRefunded,
            "PAYMENT_REFUNDED",
            "sandbox",
            "pay_1",
        )
        .with_refunded_amount(90.0);

        assert_eq!(payment.target_status_for(&event), Some(PaymentStatus::Refunded));
    }

    #[test]
    fn refund_above_charge_is_an_invariant_violation() {
        let mut payment = pix_payment();
        payment.refunded_amount = 95.0;
        assert!(payment.check_invariants().is_err());
    }

    #[test]
    fn partial_refund_event_resolves_to_partially_refunded() {
        let mut payment = pix_payment();
        payment.apply_transition(PaymentStatus::Received, None).unwrap();
        let event = WebhookEvent::new(
            WebhookEventType::PaymentRefunded,
            "PAYMENT_REFUNDED",
            "sandbox",
            "pay_1",
        )
        .with_refunded_amount(30.0);

        let target = payment.target_status_for(&event);
        assert_eq!(target, Some(PaymentStatus::PartiallyRefunded));

        payment
            .apply_transition(PaymentStatus::PartiallyRefunded, Some(&event))
            .unwrap();
        assert_eq!(payment.refunded_amount, 30.0);
        assert_eq!(payment.refundable_amount(), 60.0);
    }

    #[test]
    fn explicit_event_status_wins_over_type() {
        let payment = pix_payment();
        let event = WebhookEvent::new(
            WebhookEventType::PaymentCreated,
            "PAYMENT_UPDATED",
            "sandbox",
            "pay_1",
        )
        .with_status(PaymentStatus::Overdue);

        assert_eq!(payment.target_status_for(&event), Some(PaymentStatus::Overdue));
    }

    #[test]
    fn unknown_event_has_no_target() {
        let payment = pix_payment();
        let event = WebhookEvent::new(WebhookEventType::Unknown, "PAYMENT_VIEWED", "sandbox", "p");
        assert_eq!(payment.target_status_for(&event), None);
    }

    #[test]
    fn invariants_catch_inconsistent_net() {
        let mut payment = pix_payment();
        payment.net_amount = 95.0;
        assert!(payment.check_invariants().is_err());
    }
}
