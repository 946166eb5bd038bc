//! In-process sandbox gateway.
//!
//! Behaves like a hosted provider without leaving the process: customers and
//! charges live in memory, PIX and boleto charges wait for payment, card
//! charges confirm immediately. Webhooks use a provider-style JSON body
//! signed with HMAC-SHA256 in the `x-payflow-signature` header.
//!
//! Used by the test suite and for local runs.
//!
//! # Test cards
//!
//! - Numbers ending in `0002` are declined
//! - Any other non-empty number is approved

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use http::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{HmacSignatureVerifier, WebhookEventMapper, SIGNATURE_HEADER};
use crate::domain::foundation::Timestamp;
use crate::domain::payment::{
    BillingType, GatewayError, PaymentStatus, WebhookEvent, WebhookEventType,
};
use crate::domain::revenue::FeeSchedule;
use crate::ports::{
    BoletoCharge, CardChargeRequest, CardReceipt, ChargeRequest, CreateCustomerRequest,
    GatewayCustomer, GatewayPayment, PaymentGateway, PixCharge,
};

/// Days until an unpaid charge is due when the request has no due date.
const DEFAULT_DUE_DAYS: i64 = 3;

/// PIX QR codes expire after this many minutes.
const PIX_EXPIRY_MINUTES: i64 = 30;

const DECLINED_SUFFIX: &str = "0002";

// ════════════════════════════════════════════════════════════════════════════════
// Wire format
// ════════════════════════════════════════════════════════════════════════════════

/// Webhook body as the sandbox sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxWebhook {
    pub id: Option<String>,
    pub event: String,
    pub payment: SandboxPaymentPayload,
}

/// Payment object embedded in a webhook.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPaymentPayload {
    pub id: String,
    pub customer: Option<String>,
    pub status: Option<String>,
    pub billing_type: Option<String>,
    pub value: Option<f64>,
    pub net_value: Option<f64>,
    pub refunded_value: Option<f64>,
    pub external_reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
}

impl SandboxWebhook {
    pub fn new(event_id: &str, event: &str, gateway_payment_id: &str) -> Self {
        Self {
            id: Some(event_id.to_string()),
            event: event.to_string(),
            payment: SandboxPaymentPayload {
                id: gateway_payment_id.to_string(),
                ..Default::default()
            },
        }
    }

    /// Drops the event id so deduplication falls back to the payment tuple.
    pub fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.payment.status = Some(status.to_string());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.payment.value = Some(value);
        self
    }

    pub fn with_refunded_value(mut self, value: f64) -> Self {
        self.payment.refunded_value = Some(value);
        self
    }

    pub fn with_payment_date(mut self, date: NaiveDate) -> Self {
        self.payment.payment_date = Some(date);
        self
    }
}

/// Vocabulary the sandbox speaks.
pub fn sandbox_mapper() -> WebhookEventMapper {
    WebhookEventMapper::new()
        .event("PAYMENT_CREATED", WebhookEventType::PaymentCreated)
        .event("PAYMENT_CONFIRMED", WebhookEventType::PaymentConfirmed)
        .event("PAYMENT_RECEIVED", WebhookEventType::PaymentReceived)
        .event("PAYMENT_OVERDUE", WebhookEventType::PaymentOverdue)
        .event("PAYMENT_REFUNDED", WebhookEventType::PaymentRefunded)
        .event("PAYMENT_DELETED", WebhookEventType::PaymentDeleted)
        .event("PAYMENT_REPROVED_BY_RISK_ANALYSIS", WebhookEventType::PaymentFailed)
        .event("PAYMENT_CHARGEBACK_REQUESTED", WebhookEventType::PaymentChargeback)
        .status("PENDING", PaymentStatus::AwaitingPayment)
        .status("CONFIRMED", PaymentStatus::Confirmed)
        .status("RECEIVED", PaymentStatus::Received)
        .status("RECEIVED_IN_CASH", PaymentStatus::Received)
        .status("OVERDUE", PaymentStatus::Overdue)
        .status("REFUND_REQUESTED", PaymentStatus::RefundRequested)
        .status("REFUNDED", PaymentStatus::Refunded)
        .status("CHARGEBACK_REQUESTED", PaymentStatus::Chargeback)
        .billing_type("PIX", BillingType::Pix)
        .billing_type("BOLETO", BillingType::Boleto)
        .billing_type("CREDIT_CARD", BillingType::CreditCard)
        .billing_type("DEBIT_CARD", BillingType::DebitCard)
}

// ════════════════════════════════════════════════════════════════════════════════
// Gateway
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct SandboxState {
    customers: HashMap<String, GatewayCustomer>,
    payments: HashMap<String, GatewayPayment>,
    /// Calls left that fail with a network error.
    failures_remaining: u32,
}

/// Sandbox implementation of [`PaymentGateway`].
pub struct SandboxGateway {
    name: String,
    verifier: HmacSignatureVerifier,
    fees: FeeSchedule,
    mapper: WebhookEventMapper,
    state: Mutex<SandboxState>,
}

impl SandboxGateway {
    pub fn new(name: impl Into<String>, webhook_secret: SecretString) -> Self {
        Self {
            name: name.into(),
            verifier: HmacSignatureVerifier::new(webhook_secret),
            fees: FeeSchedule::default(),
            mapper: sandbox_mapper(),
            state: Mutex::new(SandboxState::default()),
        }
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    /// Overrides the accepted webhook age.
    pub fn with_max_event_age_secs(mut self, secs: i64) -> Self {
        self.verifier = self.verifier.with_max_age_secs(secs);
        self
    }

    pub fn customer_count(&self) -> usize {
        self.lock().customers.len()
    }

    /// Makes the next `n` provider calls fail with a retryable network error.
    pub fn fail_next_calls(&self, n: u32) {
        self.lock().failures_remaining = n;
    }

    /// Registers a charge directly, as if it had been created earlier.
    pub fn seed_charge(&self, gateway_payment_id: &str, amount: f64, status: PaymentStatus) {
        let payment = GatewayPayment {
            id: gateway_payment_id.to_string(),
            customer_id: "cus_seeded".to_string(),
            status,
            billing_type: BillingType::Pix,
            amount,
            net_amount: None,
            refunded_amount: 0.0,
            due_date: None,
            installments: None,
            invoice_url: None,
            external_reference: None,
            pix: None,
            boleto: None,
            card: None,
        };
        self.lock()
            .payments
            .insert(gateway_payment_id.to_string(), payment);
    }

    /// Serializes and signs `webhook` as the sandbox would deliver it.
    ///
    /// The stored charge moves to the status the webhook announces.
    pub fn signed_webhook(&self, webhook: &SandboxWebhook) -> (HeaderMap, Vec<u8>) {
        let announced = webhook
            .payment
            .status
            .as_deref()
            .and_then(|s| self.mapper.map_status(s))
            .or_else(|| self.mapper.map_event(&webhook.event).implied_status());
        if let Some(status) = announced {
            if let Some(stored) = self.lock().payments.get_mut(&webhook.payment.id) {
                stored.status = status;
            }
        }

        let body = serde_json::to_vec(webhook).unwrap_or_default();
        let mut headers = HeaderMap::new();
        if let Ok(signature) = self.verifier.sign(&body, Utc::now().timestamp()) {
            if let Ok(value) = HeaderValue::from_str(&signature) {
                headers.insert(SIGNATURE_HEADER, value);
            }
        }
        (headers, body)
    }

    fn lock(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self, operation: &str) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            tracing::debug!(gateway = %self.name, operation, "Injected sandbox failure");
            return Err(GatewayError::network(format!(
                "sandbox: injected failure in {}",
                operation
            )));
        }
        Ok(())
    }

    fn new_charge(&self, request: &ChargeRequest, billing_type: BillingType) -> GatewayPayment {
        GatewayPayment {
            id: format!("pay_{}", Uuid::new_v4().simple()),
            customer_id: request.customer_id.clone(),
            status: PaymentStatus::AwaitingPayment,
            billing_type,
            amount: request.amount,
            net_amount: None,
            refunded_amount: 0.0,
            due_date: Some(
                request
                    .due_date
                    .unwrap_or_else(|| (Utc::now() + Duration::days(DEFAULT_DUE_DAYS)).date_naive()),
            ),
            installments: None,
            invoice_url: None,
            external_reference: request.external_reference.clone(),
            pix: None,
            boleto: None,
            card: None,
        }
    }

    fn store(&self, payment: GatewayPayment) -> GatewayPayment {
        tracing::debug!(
            gateway = %self.name,
            gateway_payment_id = %payment.id,
            status = %payment.status,
            "Sandbox charge stored"
        );
        self.lock()
            .payments
            .insert(payment.id.clone(), payment.clone());
        payment
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<GatewayCustomer, GatewayError> {
        self.take_failure("create_customer")?;
        let customer = GatewayCustomer {
            id: format!("cus_{}", Uuid::new_v4().simple()),
            name: request.name,
            email: request.email,
            document: request.document,
            phone: request.phone,
        };
        self.lock()
            .customers
            .insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn find_customer_by_document(
        &self,
        document: &str,
    ) -> Result<Option<GatewayCustomer>, GatewayError> {
        self.take_failure("find_customer_by_document")?;
        Ok(self
            .lock()
            .customers
            .values()
            .find(|c| c.document == document)
            .cloned())
    }

    async fn create_pix_payment(
        &self,
        request: ChargeRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        self.take_failure("create_pix_payment")?;
        let mut payment = self.new_charge(&request, BillingType::Pix);
        let copy_paste = format!(
            "00020126580014br.gov.bcb.pix0136{}5204000053039865406{:.2}",
            payment.id, request.amount
        );
        payment.pix = Some(PixCharge {
            qr_code_image: hex::encode(copy_paste.as_bytes()),
            copy_paste,
            expires_at: Some(Utc::now() + Duration::minutes(PIX_EXPIRY_MINUTES)),
        });
        Ok(self.store(payment))
    }

    async fn create_boleto_payment(
        &self,
        request: ChargeRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        self.take_failure("create_boleto_payment")?;
        let mut payment = self.new_charge(&request, BillingType::Boleto);
        let barcode = format!("23793{:0>39}", (request.amount * 100.0).round() as i64);
        payment.boleto = Some(BoletoCharge {
            url: format!("https://sandbox.payflow.local/boleto/{}", payment.id),
            digitable_line: Some(barcode.clone()),
            barcode,
        });
        payment.invoice_url = Some(format!("https://sandbox.payflow.local/i/{}", payment.id));
        Ok(self.store(payment))
    }

    async fn create_card_payment(
        &self,
        request: CardChargeRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        self.take_failure("create_card_payment")?;

        let number: String = request
            .card
            .number
            .expose_secret()
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        if number.len() < 4 {
            return Err(GatewayError::invalid_request("card number is too short"));
        }
        if number.ends_with(DECLINED_SUFFIX) {
            tracing::info!(gateway = %self.name, "Sandbox card declined");
            return Err(GatewayError::card_declined("card declined by issuer")
                .with_provider_code("sandbox_declined"));
        }

        let brand = if number.starts_with('4') { "VISA" } else { "MASTERCARD" };
        let mut payment = self.new_charge(&request.charge, request.billing_type);
        payment.status = PaymentStatus::Confirmed;
        payment.installments = Some(request.installments);
        payment.card = Some(CardReceipt {
            last_four: number[number.len() - 4..].to_string(),
            brand: Some(brand.to_string()),
            receipt_url: Some(format!("https://sandbox.payflow.local/r/{}", payment.id)),
        });
        Ok(self.store(payment))
    }

    async fn get_payment(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<GatewayPayment>, GatewayError> {
        self.take_failure("get_payment")?;
        Ok(self.lock().payments.get(gateway_payment_id).cloned())
    }

    async fn refund_payment(
        &self,
        gateway_payment_id: &str,
        amount: Option<f64>,
    ) -> Result<GatewayPayment, GatewayError> {
        self.take_failure("refund_payment")?;
        let mut state = self.lock();
        let payment = state
            .payments
            .get_mut(gateway_payment_id)
            .ok_or_else(|| GatewayError::not_found("payment"))?;

        if !payment.status.is_refundable() {
            return Err(GatewayError::invalid_request(format!(
                "payment in status {} cannot be refunded",
                payment.status
            )));
        }
        let remaining = payment.amount - payment.refunded_amount;
        let amount = amount.unwrap_or(remaining);
        if amount <= 0.0 || amount > remaining + f64::EPSILON {
            return Err(GatewayError::invalid_request(format!(
                "refund amount must be between 0 and {:.2}",
                remaining
            )));
        }
        payment.refunded_amount += amount;
        payment.status = PaymentStatus::RefundRequested;
        Ok(payment.clone())
    }

    async fn cancel_payment(
        &self,
        gateway_payment_id: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        self.take_failure("cancel_payment")?;
        let mut state = self.lock();
        let payment = state
            .payments
            .get_mut(gateway_payment_id)
            .ok_or_else(|| GatewayError::not_found("payment"))?;

        if !payment.status.is_open() {
            return Err(GatewayError::invalid_request(format!(
                "payment in status {} cannot be cancelled",
                payment.status
            )));
        }
        payment.status = PaymentStatus::Cancelled;
        Ok(payment.clone())
    }

    fn parse_webhook_event(
        &self,
        _headers: &HeaderMap,
        body: &[u8],
    ) -> Result<WebhookEvent, GatewayError> {
        let webhook: SandboxWebhook = serde_json::from_slice(body).map_err(|e| {
            tracing::warn!(gateway = %self.name, error = %e, "Failed to parse webhook payload");
            GatewayError::invalid_webhook(format!("Invalid JSON: {}", e))
        })?;
        if webhook.payment.id.trim().is_empty() {
            return Err(GatewayError::invalid_webhook("missing payment id"));
        }

        let payload = webhook.payment;
        let mut event = WebhookEvent::new(
            self.mapper.map_event(&webhook.event),
            webhook.event,
            self.name.clone(),
            payload.id,
        )
        .with_raw_payload(body);
        event.event_id = webhook.id.filter(|id| !id.trim().is_empty());
        event.gateway_customer_id = payload.customer;
        event.amount = payload.value;
        event.net_amount = payload.net_value;
        event.refunded_amount = payload.refunded_value;
        event.status = payload.status.as_deref().and_then(|s| self.mapper.map_status(s));
        event.raw_status = payload.status;
        event.billing_type = payload
            .billing_type
            .as_deref()
            .and_then(|b| self.mapper.map_billing_type(b));
        event.external_reference = payload.external_reference;
        event.paid_at = payload.payment_date.map(Timestamp::from_date);
        Ok(event)
    }

    fn validate_webhook_signature(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        let Some(header) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
            tracing::debug!(gateway = %self.name, "Missing webhook signature header");
            return false;
        };
        match self.verifier.verify(body, header) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(gateway = %self.name, error = %err, "Webhook signature rejected");
                false
            }
        }
    }

    fn fees(&self) -> FeeSchedule {
        self.fees
    }
}
