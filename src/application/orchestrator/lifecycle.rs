//! Refunds, cancellation, audit reads and revenue split settlement.

use serde_json::json;

use super::gateway_ops::require_positive;
use super::{
    AuditReplay, ChangeResult, PaymentHistory, PaymentOrchestrator, RefundCommand, StatusChange,
};
use crate::domain::foundation::{round_currency, PaymentId, RevenueSplitId, MONEY_TOLERANCE};
use crate::domain::payment::{
    replay_status as replay_trail, EventSource, Payment, PaymentFlowError, PaymentStatus,
    PaymentTransaction,
};
use crate::domain::revenue::{
    calculate_revenue_split, RevenueSplit, RevenueSplitStatus, SplitCalculation,
};

impl PaymentOrchestrator {
    pub async fn find_payment(&self, id: &PaymentId) -> Result<Payment, PaymentFlowError> {
        self.load_payment(id).await
    }

    /// Requests a refund from the gateway, then records `refund_requested`.
    ///
    /// The final `refunded`/`partially_refunded` status arrives by webhook.
    /// A gateway failure leaves the ledger untouched.
    pub async fn refund_payment(&self, command: RefundCommand) -> Result<Payment, PaymentFlowError> {
        let payment = self.load_payment(&command.payment_id).await?;

        if !payment.status.is_refundable() {
            return Err(PaymentFlowError::InvalidTransition {
                from: payment.status,
                to: PaymentStatus::RefundRequested,
                audit_entry: None,
            });
        }

        let refundable = payment.refundable_amount();
        if refundable <= 0.0 {
            return Err(PaymentFlowError::validation("amount", "nothing left to refund"));
        }
        let amount = match command.amount {
            Some(amount) => {
                require_positive("amount", amount)?;
                if amount > refundable + MONEY_TOLERANCE / 2.0 {
                    return Err(PaymentFlowError::validation(
                        "amount",
                        format!("exceeds refundable amount {:.2}", refundable),
                    ));
                }
                round_currency(amount)
            }
            None => refundable,
        };

        let gateway_payment_id = payment.gateway_payment_id.clone().ok_or_else(|| {
            PaymentFlowError::validation("payment_id", "payment has no gateway charge to refund")
        })?;
        let gateway = self.gateway_for(&payment)?;
        let remote = gateway
            .refund_payment(&gateway_payment_id, command.amount.map(|_| amount))
            .await?;

        let mut metadata = vec![
            ("requested_amount", json!(amount)),
            ("gateway_status", json!(remote.status.as_str())),
        ];
        if let Some(reason) = command.reason {
            metadata.push(("reason", json!(reason)));
        }

        let change = StatusChange {
            source: EventSource::Manual,
            event_type: "refund_requested".to_string(),
            event: None,
            target: Some(PaymentStatus::RefundRequested),
            idempotency_key: None,
            amount: Some(amount),
            metadata,
        };
        self.finish_manual_change(payment, &change).await
    }

    /// Cancels an open payment with its gateway, then records `cancelled`.
    pub async fn cancel_payment(&self, id: &PaymentId) -> Result<Payment, PaymentFlowError> {
        let payment = self.load_payment(id).await?;

        if !payment.status.is_open() {
            return Err(PaymentFlowError::InvalidTransition {
                from: payment.status,
                to: PaymentStatus::Cancelled,
                audit_entry: None,
            });
        }

        if let Some(gateway_payment_id) = payment.gateway_payment_id.as_deref() {
            let gateway = self.gateway_for(&payment)?;
            gateway.cancel_payment(gateway_payment_id).await?;
        }

        let change = StatusChange {
            source: EventSource::Manual,
            event_type: "payment_cancelled".to_string(),
            event: None,
            target: Some(PaymentStatus::Cancelled),
            idempotency_key: None,
            amount: None,
            metadata: Vec::new(),
        };
        self.finish_manual_change(payment, &change).await
    }

    async fn finish_manual_change(
        &self,
        payment: Payment,
        change: &StatusChange<'_>,
    ) -> Result<Payment, PaymentFlowError> {
        let id = payment.id;
        match self.apply_change(payment, change).await? {
            ChangeResult::Applied { payment, .. } => Ok(payment),
            ChangeResult::Replayed | ChangeResult::Unchanged(_) | ChangeResult::NoTarget => {
                self.load_payment(&id).await
            }
        }
    }

    /// Audit trail of a payment, oldest first.
    pub async fn list_transactions(
        &self,
        id: &PaymentId,
    ) -> Result<Vec<PaymentTransaction>, PaymentFlowError> {
        self.load_payment(id).await?;
        Ok(self.ledger.list_transactions(id).await?)
    }

    pub async fn payment_history(&self, id: &PaymentId) -> Result<PaymentHistory, PaymentFlowError> {
        let payment = self.load_payment(id).await?;
        let transactions = self.ledger.list_transactions(id).await?;
        Ok(PaymentHistory {
            payment,
            transactions,
        })
    }

    /// Replays the audit trail and compares the result with the stored status.
    pub async fn replay_status(&self, id: &PaymentId) -> Result<AuditReplay, PaymentFlowError> {
        let payment = self.load_payment(id).await?;
        let transactions = self.ledger.list_transactions(id).await?;

        let (replayed_status, error) = match replay_trail(&transactions) {
            Ok(status) => (status, None),
            Err(err) => (None, Some(err.to_string())),
        };
        let consistent = replayed_status == Some(payment.status);
        if !consistent {
            tracing::warn!(
                payment_id = %payment.id,
                stored = %payment.status,
                replayed = ?replayed_status,
                "Audit trail does not reproduce stored status"
            );
        }

        Ok(AuditReplay {
            payment_id: payment.id,
            stored_status: payment.status,
            replayed_status,
            transaction_count: transactions.len(),
            consistent,
            error,
        })
    }

    /// Settles a pending revenue split as `processed` or `failed`.
    pub async fn settle_revenue_split(
        &self,
        id: &RevenueSplitId,
        outcome: RevenueSplitStatus,
    ) -> Result<RevenueSplit, PaymentFlowError> {
        let mut split = self
            .splits
            .find_split(id)
            .await?
            .ok_or_else(|| PaymentFlowError::not_found("revenue_split", id))?;

        if split.status != RevenueSplitStatus::Pending {
            return Err(PaymentFlowError::SplitAlreadySettled(split.status));
        }
        split.settle(outcome)?;

        if !self
            .splits
            .update_split_status(&split, RevenueSplitStatus::Pending)
            .await?
        {
            let current = self
                .splits
                .find_split(id)
                .await?
                .map(|s| s.status)
                .unwrap_or(outcome);
            return Err(PaymentFlowError::SplitAlreadySettled(current));
        }

        tracing::info!(
            split_id = %split.id,
            payment_id = %split.payment_id,
            status = %split.status,
            "Revenue split settled"
        );
        Ok(split)
    }

    /// Computes a split without persisting it.
    ///
    /// Uses the active gateway's fee schedule, or the fallback schedule when
    /// no gateway is registered. Omitted percentages take the defaults.
    pub fn simulate_revenue_split(
        &self,
        amount: f64,
        method: &str,
        instructor_percent: Option<f64>,
        platform_percent: Option<f64>,
    ) -> Result<SplitCalculation, PaymentFlowError> {
        require_positive("amount", amount)?;
        let instructor_percent =
            instructor_percent.unwrap_or(self.settings.default_instructor_percent);
        let platform_percent = platform_percent.unwrap_or(self.settings.default_platform_percent);
        for (field, value) in [
            ("instructor_percent", instructor_percent),
            ("platform_percent", platform_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(PaymentFlowError::validation(field, "must be between 0 and 100"));
            }
        }

        let fees = self
            .registry
            .active()
            .map(|gateway| gateway.fees())
            .unwrap_or(self.settings.fallback_fees);

        Ok(calculate_revenue_split(
            amount,
            method,
            instructor_percent,
            platform_percent,
            &fees,
        ))
    }
}
