//! Webhook verification and application.

use http::HeaderMap;

use super::{ChangeResult, PaymentOrchestrator, StatusChange, WebhookOutcome};
use crate::domain::payment::{EventSource, PaymentFlowError, WebhookEvent, WebhookEventType};

impl PaymentOrchestrator {
    /// Verifies, parses and applies a webhook delivered for `gateway_name`.
    ///
    /// The signature is checked before the body is parsed; a bad signature
    /// has no side effects.
    pub async fn handle_webhook(
        &self,
        gateway_name: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<WebhookOutcome, PaymentFlowError> {
        let gateway = self
            .registry
            .get(gateway_name)
            .map_err(|_| PaymentFlowError::not_found("gateway", gateway_name))?;

        if !gateway.validate_webhook_signature(headers, body) {
            tracing::warn!(gateway = %gateway_name, "Rejected webhook with invalid signature");
            return Err(PaymentFlowError::InvalidSignature);
        }

        let event = gateway.parse_webhook_event(headers, body).map_err(|e| {
            tracing::warn!(gateway = %gateway_name, error = %e, "Unparsable webhook payload");
            PaymentFlowError::validation("payload", e.message)
        })?;

        self.apply_webhook_event(event).await
    }

    /// Applies a canonical event to the ledger.
    ///
    /// Unknown events and events for payments we never issued are
    /// acknowledged and ignored. A replayed event is a no-op.
    pub async fn apply_webhook_event(
        &self,
        event: WebhookEvent,
    ) -> Result<WebhookOutcome, PaymentFlowError> {
        if event.event_type == WebhookEventType::Unknown && event.status.is_none() {
            tracing::info!(
                gateway = %event.gateway,
                raw_event = %event.raw_event,
                "Ignoring unsupported webhook event"
            );
            return Ok(WebhookOutcome::Ignored {
                reason: format!("unsupported event '{}'", event.raw_event),
            });
        }

        let payment = match self
            .ledger
            .find_by_gateway_id(&event.gateway, &event.gateway_payment_id)
            .await?
        {
            Some(payment) => payment,
            None => {
                tracing::warn!(
                    gateway = %event.gateway,
                    gateway_payment_id = %event.gateway_payment_id,
                    "Webhook for unknown payment"
                );
                return Ok(WebhookOutcome::Ignored {
                    reason: format!("unknown payment '{}'", event.gateway_payment_id),
                });
            }
        };
        let payment_id = payment.id;

        let change = StatusChange {
            source: EventSource::Webhook,
            event_type: if event.event_type == WebhookEventType::Unknown {
                event.raw_event.clone()
            } else {
                event.event_type.as_str().to_string()
            },
            event: Some(&event),
            target: None,
            idempotency_key: None,
            amount: event.amount,
            metadata: Vec::new(),
        };

        let result = self.apply_change(payment, &change).await.map_err(|err| {
            if let PaymentFlowError::Infrastructure(message) = &err {
                tracing::error!(payment_id = %payment_id, error = %message, "Webhook processing failed");
            }
            err
        })?;

        Ok(match result {
            ChangeResult::Applied {
                from,
                to,
                transaction_id,
                ..
            } => WebhookOutcome::Applied {
                payment_id,
                from,
                to,
                transaction_id,
            },
            ChangeResult::Replayed => WebhookOutcome::Replayed { payment_id },
            ChangeResult::Unchanged(status) => WebhookOutcome::Unchanged { payment_id, status },
            ChangeResult::NoTarget => WebhookOutcome::Ignored {
                reason: format!("event '{}' implies no status", event.raw_event),
            },
        })
    }
}
