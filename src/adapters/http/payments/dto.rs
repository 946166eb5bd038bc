//! Data Transfer Objects for payment HTTP endpoints.
//!
//! Requests deserialize into commands; responses are built from domain types
//! so the wire format does not leak internal fields such as the row version.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::application::{CardPayment, CheckoutCommand, CheckoutResult, WebhookOutcome};
use crate::domain::foundation::{
    CouponId, CourseId, EnrollmentId, PaymentId, RevenueSplitId, Timestamp, UserId,
};
use crate::domain::payment::{
    BillingType, Payer, Payment, PaymentFlowError, PaymentMethod, PaymentStatus,
};
use crate::domain::revenue::{RevenueSplit, RevenueSplitStatus};
use crate::ports::{CardDetails, CardHolder, GatewayPayment};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct PayerRequest {
    pub name: String,
    pub email: Option<String>,
    pub document: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CardRequest {
    pub holder_name: String,
    pub number: SecretString,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: SecretString,
    #[serde(default = "default_installments")]
    pub installments: u32,
    pub holder: CardHolder,
}

fn default_installments() -> u32 {
    1
}

/// Request to start a checkout.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub enrollment_id: Option<EnrollmentId>,
    pub course_id: Option<CourseId>,
    pub instructor_id: Option<String>,
    pub user_id: Option<String>,
    pub payer: PayerRequest,
    pub amount: f64,
    pub billing_type: BillingType,
    pub coupon_code: Option<String>,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub description: Option<String>,
    pub card: Option<CardRequest>,
}

impl CheckoutRequest {
    /// Converts into a command; `remote_ip` comes from the request headers.
    pub fn into_command(self, remote_ip: Option<String>) -> Result<CheckoutCommand, PaymentFlowError> {
        let payer = Payer::new(self.payer.name, self.payer.email, self.payer.document)?;
        let card = self.card.map(|card| CardPayment {
            card: CardDetails {
                holder_name: card.holder_name,
                number: card.number,
                expiry_month: card.expiry_month,
                expiry_year: card.expiry_year,
                cvv: card.cvv,
            },
            holder: card.holder,
            installments: card.installments,
            remote_ip,
        });

        Ok(CheckoutCommand {
            enrollment_id: self.enrollment_id,
            course_id: self.course_id,
            instructor_id: self.instructor_id.map(UserId::new).transpose()?,
            user_id: self.user_id.map(UserId::new).transpose()?,
            payer,
            payer_phone: self.payer.phone,
            amount: self.amount,
            billing_type: self.billing_type,
            coupon_code: self.coupon_code,
            due_date: self.due_date,
            description: self.description,
            card,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundRequest {
    pub amount: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscountPreviewRequest {
    pub coupon_code: String,
    pub amount: f64,
    pub course_id: Option<CourseId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateSplitRequest {
    pub amount: f64,
    pub method: String,
    pub instructor_percent: Option<f64>,
    pub platform_percent: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettleSplitRequest {
    pub status: RevenueSplitStatus,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// A payment as exposed by the API.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub enrollment_id: Option<EnrollmentId>,
    pub course_id: Option<CourseId>,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub gross_amount: f64,
    pub discount_amount: f64,
    pub net_amount: f64,
    pub gateway_fee: f64,
    pub refunded_amount: f64,
    pub gateway: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub installments: Option<u32>,
    pub installment_value: Option<f64>,
    pub coupon_id: Option<CouponId>,
    pub due_date: Option<Timestamp>,
    pub paid_at: Option<Timestamp>,
    pub refunded_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Payment> for PaymentResponse {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id,
            enrollment_id: p.enrollment_id,
            course_id: p.course_id,
            status: p.status,
            method: p.method,
            gross_amount: p.gross_amount,
            discount_amount: p.discount_amount,
            net_amount: p.net_amount,
            gateway_fee: p.gateway_fee,
            refunded_amount: p.refunded_amount,
            gateway: p.gateway.clone(),
            gateway_payment_id: p.gateway_payment_id.clone(),
            installments: p.installments,
            installment_value: p.installment_value,
            coupon_id: p.coupon_id,
            due_date: p.due_date,
            paid_at: p.paid_at,
            refunded_at: p.refunded_at,
            cancelled_at: p.cancelled_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub payment: PaymentResponse,
    /// PIX QR code, boleto slip or card receipt; absent for free orders.
    pub charge: Option<GatewayPayment>,
}

impl From<CheckoutResult> for CheckoutResponse {
    fn from(result: CheckoutResult) -> Self {
        Self {
            payment: PaymentResponse::from(&result.payment),
            charge: result.charge,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueSplitResponse {
    pub id: RevenueSplitId,
    pub payment_id: PaymentId,
    pub status: RevenueSplitStatus,
    pub gross_amount: f64,
    pub net_amount: f64,
    pub payment_fee: f64,
    pub instructor_amount: f64,
    pub platform_amount: f64,
    pub processed_at: Option<Timestamp>,
}

impl From<RevenueSplit> for RevenueSplitResponse {
    fn from(s: RevenueSplit) -> Self {
        Self {
            id: s.id,
            payment_id: s.payment_id,
            status: s.status,
            gross_amount: s.gross_amount,
            net_amount: s.net_amount,
            payment_fee: s.payment_fee,
            instructor_amount: s.instructor_amount,
            platform_amount: s.platform_amount,
            processed_at: s.processed_at,
        }
    }
}

/// Acknowledgement returned to gateways.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<WebhookOutcome> for WebhookResponse {
    fn from(outcome: WebhookOutcome) -> Self {
        let (label, payment_id, status, reason) = match outcome {
            WebhookOutcome::Applied { payment_id, to, .. } => {
                ("applied", Some(payment_id), Some(to), None)
            }
            WebhookOutcome::Replayed { payment_id } => ("replayed", Some(payment_id), None, None),
            WebhookOutcome::Unchanged { payment_id, status } => {
                ("unchanged", Some(payment_id), Some(status), None)
            }
            WebhookOutcome::Ignored { reason } => ("ignored", None, None, Some(reason)),
        };
        Self {
            received: true,
            outcome: label,
            payment_id,
            status,
            reason,
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}
