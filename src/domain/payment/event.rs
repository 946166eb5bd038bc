//! Canonical webhook events.
//!
//! Gateways translate their notification payloads into [`WebhookEvent`] so
//! nothing past the normalizer ever sees provider vocabulary.

use super::{BillingType, PaymentStatus};
use crate::domain::foundation::{PaymentId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical webhook event types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    PaymentCreated,
    PaymentConfirmed,
    PaymentReceived,
    PaymentOverdue,
    PaymentRefunded,
    PaymentDeleted,
    PaymentFailed,
    PaymentChargeback,
    /// Event the gateway emits that has no canonical meaning. Parsed, logged, ignored.
    Unknown,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::PaymentCreated => "payment_created",
            WebhookEventType::PaymentConfirmed => "payment_confirmed",
            WebhookEventType::PaymentReceived => "payment_received",
            WebhookEventType::PaymentOverdue => "payment_overdue",
            WebhookEventType::PaymentRefunded => "payment_refunded",
            WebhookEventType::PaymentDeleted => "payment_deleted",
            WebhookEventType::PaymentFailed => "payment_failed",
            WebhookEventType::PaymentChargeback => "payment_chargeback",
            WebhookEventType::Unknown => "unknown",
        }
    }

    /// Parses a canonical literal; anything unrecognised becomes `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "payment_created" => WebhookEventType::PaymentCreated,
            "payment_confirmed" => WebhookEventType::PaymentConfirmed,
            "payment_received" => WebhookEventType::PaymentReceived,
            "payment_overdue" => WebhookEventType::PaymentOverdue,
            "payment_refunded" => WebhookEventType::PaymentRefunded,
            "payment_deleted" => WebhookEventType::PaymentDeleted,
            "payment_failed" => WebhookEventType::PaymentFailed,
            "payment_chargeback" => WebhookEventType::PaymentChargeback,
            _ => WebhookEventType::Unknown,
        }
    }

    /// Status implied by the event type alone.
    ///
    /// Refunds resolve to `Refunded` here; partial refunds are decided
    /// against the payment's gross amount.
    pub fn implied_status(&self) -> Option<PaymentStatus> {
        match self {
            WebhookEventType::PaymentCreated => Some(PaymentStatus::AwaitingPayment),
            WebhookEventType::PaymentConfirmed => Some(PaymentStatus::Confirmed),
            WebhookEventType::PaymentReceived => Some(PaymentStatus::Received),
            WebhookEventType::PaymentOverdue => Some(PaymentStatus::Overdue),
            WebhookEventType::PaymentRefunded => Some(PaymentStatus::Refunded),
            WebhookEventType::PaymentDeleted => Some(PaymentStatus::Cancelled),
            WebhookEventType::PaymentFailed => Some(PaymentStatus::Failed),
            WebhookEventType::PaymentChargeback => Some(PaymentStatus::Chargeback),
            WebhookEventType::Unknown => None,
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gateway notification translated into canonical terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Gateway's delivery/event id, used for deduplication when present.
    pub event_id: Option<String>,

    pub event_type: WebhookEventType,

    /// Event name exactly as the gateway sent it.
    pub raw_event: String,

    /// Registry name of the gateway that produced the event.
    pub gateway: String,

    pub gateway_payment_id: String,
    pub gateway_customer_id: Option<String>,

    /// Gross amount reported by the gateway.
    pub amount: Option<f64>,
    pub net_amount: Option<f64>,

    /// Cumulative refunded amount, for refund events.
    pub refunded_amount: Option<f64>,

    /// Canonical status, when the gateway reports one.
    pub status: Option<PaymentStatus>,

    /// Status exactly as the gateway sent it.
    pub raw_status: Option<String>,

    pub billing_type: Option<BillingType>,
    pub external_reference: Option<String>,
    pub paid_at: Option<Timestamp>,

    /// Original request body, kept for the audit trail.
    #[serde(skip)]
    pub raw_payload: Vec<u8>,
}

impl WebhookEvent {
    /// Creates an event with only the required fields populated.
    pub fn new(
        event_type: WebhookEventType,
        raw_event: impl Into<String>,
        gateway: impl Into<String>,
        gateway_payment_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: None,
            event_type,
            raw_event: raw_event.into(),
            gateway: gateway.into(),
            gateway_payment_id: gateway_payment_id.into(),
            gateway_customer_id: None,
            amount: None,
            net_amount: None,
            refunded_amount: None,
            status: None,
            raw_status: None,
            billing_type: None,
            external_reference: None,
            paid_at: None,
            raw_payload: Vec::new(),
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_paid_at(mut self, paid_at: Timestamp) -> Self {
        self.paid_at = Some(paid_at);
        self
    }

    pub fn with_refunded_amount(mut self, amount: f64) -> Self {
        self.refunded_amount = Some(amount);
        self
    }

    pub fn with_raw_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.raw_payload = payload.into();
        self
    }

    /// Deduplication key for applying this event to a payment.
    ///
    /// The gateway event id when present, otherwise the
    /// `(payment, target status, paid_at)` tuple.
    pub fn idempotency_key(&self, payment_id: &PaymentId, target: PaymentStatus) -> String {
        match &self.event_id {
            Some(id) if !id.trim().is_empty() => format!("{}:{}", self.gateway, id),
            _ => {
                let paid_at = self
                    .paid_at
                    .map(|ts| ts.as_unix_secs().to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!("{}:{}:{}", payment_id, target.as_str(), paid_at)
            }
        }
    }
}

/// Origin of a ledger transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Webhook,
    Manual,
    System,
    Scheduler,
    Api,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Webhook => "webhook",
            EventSource::Manual => "manual",
            EventSource::System => "system",
            EventSource::Scheduler => "scheduler",
            EventSource::Api => "api",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "webhook" => Some(EventSource::Webhook),
            "manual" => Some(EventSource::Manual),
            "system" => Some(EventSource::System),
            "scheduler" => Some(EventSource::Scheduler),
            "api" => Some(EventSource::Api),
            _ => None,
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
