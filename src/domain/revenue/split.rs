//! Revenue split between instructor and platform.

use super::fees::{calculate_payment_fee, FeeCategory, FeeSchedule};
use crate::domain::foundation::{
    round_currency, EnrollmentId, PaymentId, RevenueSplitId, StateMachine, Timestamp, UserId,
    ValidationError,
};
use crate::domain::payment::{Payment, PaymentMethod};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result of [`calculate_revenue_split`]. Amounts are unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitCalculation {
    pub gross_amount: f64,
    pub payment_fee: f64,
    pub net_amount: f64,
    pub instructor_percent: f64,
    pub platform_percent: f64,
    pub instructor_amount: f64,
    pub platform_amount: f64,
    pub fee_description: String,
}

/// Splits the net amount (gross minus gateway fee) by each percentage.
///
/// Percentages are applied independently and are not required to sum to
/// 100; callers pass complementary values.
pub fn calculate_revenue_split(
    gross_amount: f64,
    method: &str,
    instructor_percent: f64,
    platform_percent: f64,
    fees: &FeeSchedule,
) -> SplitCalculation {
    let payment_fee = calculate_payment_fee(gross_amount, method, fees);
    let net_amount = gross_amount - payment_fee;

    SplitCalculation {
        gross_amount,
        payment_fee,
        net_amount,
        instructor_percent,
        platform_percent,
        instructor_amount: net_amount * instructor_percent / 100.0,
        platform_amount: net_amount * platform_percent / 100.0,
        fee_description: FeeCategory::for_method(method).description().to_string(),
    }
}

/// Settlement status of a revenue split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueSplitStatus {
    Pending,
    Processed,
    Failed,
}

impl RevenueSplitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueSplitStatus::Pending => "pending",
            RevenueSplitStatus::Processed => "processed",
            RevenueSplitStatus::Failed => "failed",
        }
    }
}

impl StateMachine for RevenueSplitStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use RevenueSplitStatus::*;
        matches!((self, target), (Pending, Processed) | (Pending, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use RevenueSplitStatus::*;
        match self {
            Pending => vec![Processed, Failed],
            Processed | Failed => vec![],
        }
    }
}

impl fmt::Display for RevenueSplitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevenueSplitStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RevenueSplitStatus::Pending),
            "processed" => Ok(RevenueSplitStatus::Processed),
            "failed" => Ok(RevenueSplitStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "revenue_split_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// Persisted distribution of one payment's net amount.
///
/// # Invariants
///
/// - `instructor_amount + platform_amount <= net_amount` (within a cent)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub id: RevenueSplitId,
    pub payment_id: PaymentId,
    pub enrollment_id: Option<EnrollmentId>,
    pub instructor_id: Option<UserId>,
    pub method: PaymentMethod,
    pub gross_amount: f64,
    pub net_amount: f64,
    /// Platform share.
    pub platform_fee: f64,
    /// Gateway fee.
    pub payment_fee: f64,
    pub instructor_amount: f64,
    pub platform_amount: f64,
    pub status: RevenueSplitStatus,
    pub processed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl RevenueSplit {
    /// Builds the pending split for a paid payment.
    ///
    /// The gross is what the payer was charged (gross minus discount). The
    /// gateway fee comes from the payment row so the split agrees with the
    /// ledger. Amounts are rounded for storage and the platform share absorbs
    /// rounding so the parts never exceed the net.
    pub fn for_payment(payment: &Payment, instructor_percent: f64, platform_percent: f64) -> Self {
        let gross_amount = payment.charge_amount();
        let payment_fee = payment.gateway_fee.min(gross_amount);
        let net_amount = round_currency(gross_amount - payment_fee);

        let instructor_amount = round_currency(net_amount * instructor_percent / 100.0);
        let platform_amount =
            round_currency(net_amount * platform_percent / 100.0).min(round_currency(
                (net_amount - instructor_amount).max(0.0),
            ));

        Self {
            id: RevenueSplitId::new(),
            payment_id: payment.id,
            enrollment_id: payment.enrollment_id,
            instructor_id: payment.instructor_id.clone(),
            method: payment.method,
            gross_amount,
            net_amount,
            platform_fee: platform_amount,
            payment_fee,
            instructor_amount,
            platform_amount,
            status: RevenueSplitStatus::Pending,
            processed_at: None,
            created_at: Timestamp::now(),
        }
    }

    /// Moves a pending split to `Processed` or `Failed`.
    pub fn settle(&mut self, outcome: RevenueSplitStatus) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(outcome)?;
        if outcome == RevenueSplitStatus::Processed {
            self.processed_at = Some(Timestamp::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::Payer;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn boleto_split_matches_reference_values() {
        let split = calculate_revenue_split(100.0, "boleto", 70.0, 30.0, &FeeSchedule::default());

        assert!(close(split.net_amount, 97.01), "net {}", split.net_amount);
        assert!(close(split.instructor_amount, 67.907));
        assert!(close(split.platform_amount, 29.103));
        assert_eq!(split.payment_fee, 2.99);
    }

    #[test]
    fn percentages_are_applied_independently() {
        let split = calculate_revenue_split(100.0, "crypto", 80.0, 40.0, &FeeSchedule::default());

        assert_eq!(split.net_amount, 100.0);
        assert!(close(split.instructor_amount, 80.0));
        assert!(close(split.platform_amount, 40.0));
        assert_eq!(split.fee_description, "Método de pagamento desconhecido");
    }

    #[test]
    fn split_for_payment_uses_charged_amount_and_ledger_fee() {
        let payer = Payer::new("Ana", None, "123").unwrap();
        let mut payment = Payment::new(payer, 120.0, 20.0, 2.99, PaymentMethod::Boleto).unwrap();
        payment.instructor_id = Some(UserId::new("instructor-1").unwrap());

        let split = RevenueSplit::for_payment(&payment, 70.0, 30.0);

        assert_eq!(split.gross_amount, 100.0);
        assert_eq!(split.net_amount, 97.01);
        assert_eq!(split.instructor_amount, 67.91);
        assert_eq!(split.platform_amount, 29.1);
        assert!(split.instructor_amount + split.platform_amount <= split.net_amount + 1e-9);
        assert_eq!(split.status, RevenueSplitStatus::Pending);
    }

    #[test]
    fn split_parts_never_exceed_net() {
        let payer = Payer::new("Ana", None, "123").unwrap();
        let payment = Payment::new(payer, 10.05, 0.0, 0.0, PaymentMethod::Pix).unwrap();

        let split = RevenueSplit::for_payment(&payment, 50.0, 50.0);

        assert!(split.instructor_amount + split.platform_amount <= split.net_amount + 1e-9);
    }

    #[test]
    fn pending_split_can_be_processed_once() {
        let payer = Payer::new("Ana", None, "123").unwrap();
        let payment = Payment::new(payer, 50.0, 0.0, 0.5, PaymentMethod::Pix).unwrap();
        let mut split = RevenueSplit::for_payment(&payment, 70.0, 30.0);

        split.settle(RevenueSplitStatus::Processed).unwrap();
        assert!(split.processed_at.is_some());
        assert!(split.settle(RevenueSplitStatus::Failed).is_err());
    }

    #[test]
    fn status_literals_parse() {
        assert_eq!(
            "processed".parse::<RevenueSplitStatus>(),
            Ok(RevenueSplitStatus::Processed)
        );
        assert!("paid".parse::<RevenueSplitStatus>().is_err());
    }
}
