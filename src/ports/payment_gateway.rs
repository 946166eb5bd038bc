//! Payment gateway port for external payment providers.
//!
//! Defines the capability contract every provider adapter implements.
//! Adapters translate provider vocabulary into the canonical model; nothing
//! past this boundary branches on the provider's name.
//!
//! # Design
//!
//! - **Gateway agnostic**: Requests and responses use canonical types only
//! - **Errors propagate unmodified**: Callers receive the adapter's `GatewayError`
//! - **Webhooks verified before parsing**: `validate_webhook_signature` runs first

use crate::domain::payment::{BillingType, GatewayError, PaymentStatus, WebhookEvent};
use crate::domain::revenue::FeeSchedule;
use async_trait::async_trait;
use chrono::NaiveDate;
use http::HeaderMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registry name of this gateway (e.g. "asaas", "sandbox").
    fn name(&self) -> &str;

    /// Create a customer in the provider.
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<GatewayCustomer, GatewayError>;

    /// Find a customer by tax document. `None` when absent.
    async fn find_customer_by_document(
        &self,
        document: &str,
    ) -> Result<Option<GatewayCustomer>, GatewayError>;

    /// Issue a PIX charge. The response carries the QR code and copy-paste payload.
    async fn create_pix_payment(&self, request: ChargeRequest)
        -> Result<GatewayPayment, GatewayError>;

    /// Issue a boleto. The response carries the slip URL and barcode.
    async fn create_boleto_payment(
        &self,
        request: ChargeRequest,
    ) -> Result<GatewayPayment, GatewayError>;

    /// Charge a card.
    async fn create_card_payment(
        &self,
        request: CardChargeRequest,
    ) -> Result<GatewayPayment, GatewayError>;

    /// Fetch a payment by the provider's id. `None` when absent.
    async fn get_payment(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<GatewayPayment>, GatewayError>;

    /// Refund a payment. `amount = None` refunds the full value.
    async fn refund_payment(
        &self,
        gateway_payment_id: &str,
        amount: Option<f64>,
    ) -> Result<GatewayPayment, GatewayError>;

    /// Cancel an unpaid payment.
    async fn cancel_payment(&self, gateway_payment_id: &str)
        -> Result<GatewayPayment, GatewayError>;

    /// Parse a webhook body into a canonical event.
    ///
    /// Unsupported event types parse with `WebhookEventType::Unknown`.
    fn parse_webhook_event(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<WebhookEvent, GatewayError>;

    /// Verify the webhook signature over the raw body.
    fn validate_webhook_signature(&self, headers: &HeaderMap, body: &[u8]) -> bool;

    /// Fees this provider charges.
    fn fees(&self) -> FeeSchedule;
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: Option<String>,
    /// CPF/CNPJ.
    pub document: String,
    pub phone: Option<String>,
    /// Our own reference stored with the provider.
    pub external_reference: Option<String>,
}

/// Customer as known by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayCustomer {
    /// Provider's customer ID.
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub document: String,
    pub phone: Option<String>,
}

/// PIX or boleto charge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Provider's customer ID.
    pub customer_id: String,
    pub amount: f64,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    /// Our payment id, echoed back in webhooks.
    pub external_reference: Option<String>,
}

/// Card data. Number and CVV never appear in logs.
#[derive(Debug)]
pub struct CardDetails {
    pub holder_name: String,
    pub number: SecretString,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: SecretString,
}

/// Cardholder identity required by anti-fraud checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardHolder {
    pub name: String,
    pub email: String,
    pub document: String,
    pub postal_code: String,
    pub address_number: String,
    pub phone: Option<String>,
}

/// Card charge request.
#[derive(Debug)]
pub struct CardChargeRequest {
    pub charge: ChargeRequest,
    pub billing_type: BillingType,
    pub card: CardDetails,
    pub holder: CardHolder,
    /// Number of installments; 1 for a single charge.
    pub installments: u32,
    pub remote_ip: Option<String>,
}

/// PIX charge details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixCharge {
    /// Base64 PNG of the QR code.
    pub qr_code_image: String,
    /// Copy-and-paste payload.
    pub copy_paste: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Boleto details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoletoCharge {
    pub url: String,
    pub barcode: String,
    pub digitable_line: Option<String>,
}

/// Card receipt details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardReceipt {
    pub last_four: String,
    pub brand: Option<String>,
    pub receipt_url: Option<String>,
}

/// Payment as known by the provider, in canonical terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayment {
    /// Provider's payment ID.
    pub id: String,
    pub customer_id: String,
    pub status: PaymentStatus,
    pub billing_type: BillingType,
    pub amount: f64,
    pub net_amount: Option<f64>,
    pub refunded_amount: f64,
    pub due_date: Option<NaiveDate>,
    pub installments: Option<u32>,
    pub invoice_url: Option<String>,
    pub external_reference: Option<String>,
    pub pix: Option<PixCharge>,
    pub boleto: Option<BoletoCharge>,
    pub card: Option<CardReceipt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn PaymentGateway) {}
    }

    #[test]
    fn card_details_debug_redacts_secrets() {
        let card = CardDetails {
            holder_name: "ANA SOUZA".into(),
            number: SecretString::new("4111111111111111".into()),
            expiry_month: "12".into(),
            expiry_year: "2030".into(),
            cvv: SecretString::new("123".into()),
        };
        let debug = format!("{:?}", card);
        assert!(!debug.contains("4111111111111111"));
        assert!(!debug.contains("\"123\""));
    }
}
