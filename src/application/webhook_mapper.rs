//! Translation tables from provider vocabulary to canonical terms.
//!
//! Each gateway adapter owns a mapper describing its event names, status
//! strings and billing types. Because canonical events keep the raw names,
//! an event can be re-mapped when a table changes.

use std::collections::HashMap;

use crate::domain::payment::{BillingType, PaymentStatus, WebhookEvent, WebhookEventType};

/// Provider-to-canonical lookup tables.
#[derive(Debug, Clone, Default)]
pub struct WebhookEventMapper {
    events: HashMap<String, WebhookEventType>,
    statuses: HashMap<String, PaymentStatus>,
    billing_types: HashMap<String, BillingType>,
}

impl WebhookEventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, raw: &str, canonical: WebhookEventType) -> Self {
        self.events.insert(normalize(raw), canonical);
        self
    }

    pub fn status(mut self, raw: &str, canonical: PaymentStatus) -> Self {
        self.statuses.insert(normalize(raw), canonical);
        self
    }

    pub fn billing_type(mut self, raw: &str, canonical: BillingType) -> Self {
        self.billing_types.insert(normalize(raw), canonical);
        self
    }

    /// Canonical event type; `Unknown` when unmapped.
    pub fn map_event(&self, raw: &str) -> WebhookEventType {
        self.events
            .get(&normalize(raw))
            .cloned()
            .unwrap_or(WebhookEventType::Unknown)
    }

    pub fn map_status(&self, raw: &str) -> Option<PaymentStatus> {
        self.statuses.get(&normalize(raw)).copied()
    }

    pub fn map_billing_type(&self, raw: &str) -> Option<BillingType> {
        self.billing_types.get(&normalize(raw)).copied()
    }

    /// Recomputes the canonical fields of `event` from its raw fields.
    pub fn remap(&self, event: &WebhookEvent) -> WebhookEvent {
        let mut remapped = event.clone();
        remapped.event_type = self.map_event(&event.raw_event);
        remapped.status = event.raw_status.as_deref().and_then(|s| self.map_status(s));
        remapped
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
