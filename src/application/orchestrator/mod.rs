//! Payment lifecycle orchestrator.
//!
//! The only writer of payments. Every status change goes through
//! [`PaymentOrchestrator::apply_change`], which appends the audit record and
//! the derived rows in the same ledger unit of work and retries on version
//! conflicts.

mod checkout;
mod commands;
mod gateway_ops;
mod lifecycle;
mod webhooks;

use std::sync::Arc;

use crate::application::GatewayRegistry;
use crate::domain::foundation::{PaymentId, PaymentTransactionId, StateMachine};
use crate::domain::payment::{
    EventSource, Payment, PaymentFlowError, PaymentStatus, PaymentTransaction, WebhookEvent,
};
use crate::domain::revenue::{FeeSchedule, RevenueSplit};
use crate::ports::{
    CouponRepository, LedgerWrite, PaymentGateway, PaymentLedger, RevenueSplitRepository,
    TransitionOutcome,
};

pub use commands::{
    AuditReplay, CardPayment, CheckoutCommand, CheckoutResult, CreateCardChargeCommand,
    CreateChargeCommand, DiscountPreview, PaymentHistory, PaymentStatusView, RefundCommand,
    StatusSource, WebhookOutcome,
};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub default_instructor_percent: f64,
    pub default_platform_percent: f64,
    /// Used by split simulation when no gateway is registered.
    pub fallback_fees: FeeSchedule,
    /// Attempts before a version conflict is reported as retryable.
    pub max_transition_attempts: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            default_instructor_percent: 70.0,
            default_platform_percent: 30.0,
            fallback_fees: FeeSchedule::default(),
            max_transition_attempts: 3,
        }
    }
}

/// Coordinates gateways, the ledger and the pricing engines.
pub struct PaymentOrchestrator {
    registry: Arc<GatewayRegistry>,
    ledger: Arc<dyn PaymentLedger>,
    coupons: Arc<dyn CouponRepository>,
    splits: Arc<dyn RevenueSplitRepository>,
    settings: OrchestratorSettings,
}

/// A requested status change.
pub(crate) struct StatusChange<'a> {
    pub source: EventSource,
    pub event_type: String,
    pub event: Option<&'a WebhookEvent>,
    /// Fixed target; otherwise resolved from `event` against the current payment.
    pub target: Option<PaymentStatus>,
    /// Fixed key; otherwise derived from `event`.
    pub idempotency_key: Option<String>,
    pub amount: Option<f64>,
    pub metadata: Vec<(&'static str, serde_json::Value)>,
}

/// Result of [`PaymentOrchestrator::apply_change`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChangeResult {
    Applied {
        from: PaymentStatus,
        to: PaymentStatus,
        transaction_id: PaymentTransactionId,
        payment: Payment,
    },
    Replayed,
    Unchanged(PaymentStatus),
    NoTarget,
}

impl PaymentOrchestrator {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        ledger: Arc<dyn PaymentLedger>,
        coupons: Arc<dyn CouponRepository>,
        splits: Arc<dyn RevenueSplitRepository>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            ledger,
            coupons,
            splits,
            settings,
        }
    }

    pub fn registry(&self) -> &GatewayRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Gateway that issued `payment`, falling back to the active one.
    fn gateway_for(&self, payment: &Payment) -> Result<Arc<dyn PaymentGateway>, PaymentFlowError> {
        match payment.gateway.as_deref() {
            Some(name) => Ok(self.registry.get(name)?),
            None => Ok(self.registry.active()?),
        }
    }

    async fn load_payment(&self, id: &PaymentId) -> Result<Payment, PaymentFlowError> {
        self.ledger
            .find_by_id(id)
            .await?
            .ok_or_else(|| PaymentFlowError::not_found("payment", id))
    }

    /// Applies a status change with idempotency and bounded retries.
    ///
    /// Rejected transitions are appended as `error` audit records and
    /// returned as `InvalidTransition`.
    pub(crate) async fn apply_change(
        &self,
        mut payment: Payment,
        change: &StatusChange<'_>,
    ) -> Result<ChangeResult, PaymentFlowError> {
        let attempts = self.settings.max_transition_attempts.max(1);

        for attempt in 1..=attempts {
            let target = match change.target {
                Some(target) => target,
                None => match change.event.and_then(|e| payment.target_status_for(e)) {
                    Some(target) => target,
                    None => return Ok(ChangeResult::NoTarget),
                },
            };

            let key = change
                .idempotency_key
                .clone()
                .or_else(|| change.event.map(|e| e.idempotency_key(&payment.id, target)));

            if let Some(key) = key.as_deref() {
                if let Some(existing) = self.ledger.find_transaction_by_key(&payment.id, key).await? {
                    if existing.is_anomaly() {
                        return Err(PaymentFlowError::InvalidTransition {
                            from: existing.new_status,
                            to: target,
                            audit_entry: Some(existing.id),
                        });
                    }
                    tracing::debug!(
                        payment_id = %payment.id,
                        idempotency_key = %key,
                        "Transition already recorded, skipping"
                    );
                    return Ok(ChangeResult::Replayed);
                }
            }

            if target == payment.status {
                return Ok(ChangeResult::Unchanged(target));
            }

            let from = payment.status;
            let write = if from.can_transition_to(&target) {
                self.transition_write(&payment, target, change, key.as_deref())?
            } else {
                self.anomaly_write(&payment, target, change, key.as_deref())
            };
            let transaction_id = write.transaction.id;
            let is_anomaly = write.transaction.is_anomaly();
            let updated = write.payment.clone();

            match self.ledger.record_transition(write).await? {
                TransitionOutcome::Applied if is_anomaly => {
                    tracing::warn!(
                        payment_id = %payment.id,
                        from = %from,
                        to = %target,
                        source = %change.source,
                        "Rejected invalid payment transition"
                    );
                    return Err(PaymentFlowError::InvalidTransition {
                        from,
                        to: target,
                        audit_entry: Some(transaction_id),
                    });
                }
                TransitionOutcome::Applied => {
                    tracing::info!(
                        payment_id = %payment.id,
                        from = %from,
                        to = %target,
                        source = %change.source,
                        "Payment transition applied"
                    );
                    return Ok(ChangeResult::Applied {
                        from,
                        to: target,
                        transaction_id,
                        payment: updated,
                    });
                }
                TransitionOutcome::Duplicate => {
                    tracing::debug!(payment_id = %payment.id, "Concurrent delivery already recorded");
                    return Ok(ChangeResult::Replayed);
                }
                TransitionOutcome::VersionConflict => {
                    tracing::debug!(
                        payment_id = %payment.id,
                        attempt,
                        "Payment changed concurrently, reloading"
                    );
                    payment = self.load_payment(&payment.id).await?;
                }
            }
        }

        tracing::error!(payment_id = %payment.id, "Gave up after repeated version conflicts");
        Err(PaymentFlowError::Infrastructure(format!(
            "payment {} was modified concurrently",
            payment.id
        )))
    }

    fn transition_write(
        &self,
        payment: &Payment,
        target: PaymentStatus,
        change: &StatusChange<'_>,
        key: Option<&str>,
    ) -> Result<LedgerWrite, PaymentFlowError> {
        let mut updated = payment.clone();
        updated.apply_transition(target, change.event)?;
        updated.version = payment.version + 1;

        let becomes_paid = target.is_paid() && !payment.status.is_paid();
        let revenue_split = (becomes_paid && updated.charge_amount() > 0.0).then(|| {
            RevenueSplit::for_payment(
                &updated,
                self.settings.default_instructor_percent,
                self.settings.default_platform_percent,
            )
        });
        // The use reserved at checkout goes back to the coupon.
        let release_coupon = updated.coupon_id.is_some()
            && matches!(target, PaymentStatus::Cancelled | PaymentStatus::Failed);

        let transaction = self.decorate(
            PaymentTransaction::transition(
                payment.id,
                payment.status,
                target,
                change.source,
                change.event_type.clone(),
            ),
            change,
            key,
        );

        Ok(LedgerWrite {
            payment: updated,
            expected_version: payment.version,
            transaction,
            release_coupon,
            revenue_split,
        })
    }

    fn anomaly_write(
        &self,
        payment: &Payment,
        target: PaymentStatus,
        change: &StatusChange<'_>,
        key: Option<&str>,
    ) -> LedgerWrite {
        let transaction = self.decorate(
            PaymentTransaction::anomaly(
                payment.id,
                payment.status,
                target,
                change.source,
                format!(
                    "{} cannot move from {} to {}",
                    change.event_type, payment.status, target
                ),
            ),
            change,
            key,
        );

        let mut unchanged = payment.clone();
        unchanged.version = payment.version + 1;

        LedgerWrite {
            payment: unchanged,
            expected_version: payment.version,
            transaction,
            release_coupon: false,
            revenue_split: None,
        }
    }

    fn decorate(
        &self,
        mut transaction: PaymentTransaction,
        change: &StatusChange<'_>,
        key: Option<&str>,
    ) -> PaymentTransaction {
        if let Some(key) = key {
            transaction = transaction.with_idempotency_key(key);
        }
        if let Some(amount) = change.amount {
            transaction = transaction.with_amount(amount);
        }
        if let Some(event) = change.event {
            if !event.raw_payload.is_empty() {
                transaction = transaction.with_raw_body(&event.raw_payload);
            }
            transaction = transaction
                .with_gateway_event_id(event.event_id.clone())
                .with_metadata("gateway", event.gateway.as_str())
                .with_metadata("raw_event", event.raw_event.as_str());
            if let Some(raw_status) = &event.raw_status {
                transaction = transaction.with_metadata("raw_status", raw_status.as_str());
            }
        }
        for (name, value) in &change.metadata {
            transaction = transaction.with_metadata(name, value.clone());
        }
        transaction
    }
}
