//! Commands and results for payment use cases.

use crate::domain::foundation::{CourseId, EnrollmentId, PaymentId, PaymentTransactionId, UserId};
use crate::domain::payment::{BillingType, Payer, Payment, PaymentStatus, PaymentTransaction};
use crate::ports::{CardDetails, CardHolder, GatewayPayment};
use serde::Serialize;

/// PIX or boleto charge against an existing gateway customer.
#[derive(Debug, Clone)]
pub struct CreateChargeCommand {
    pub customer_id: String,
    pub amount: f64,
    /// Date-only, `YYYY-MM-DD`.
    pub due_date: Option<String>,
    pub description: Option<String>,
    pub external_reference: Option<String>,
}

/// Card data attached to a charge.
#[derive(Debug)]
pub struct CardPayment {
    pub card: CardDetails,
    pub holder: CardHolder,
    pub installments: u32,
    pub remote_ip: Option<String>,
}

/// Card charge against an existing gateway customer.
#[derive(Debug)]
pub struct CreateCardChargeCommand {
    pub charge: CreateChargeCommand,
    pub billing_type: BillingType,
    pub payment: CardPayment,
}

/// Start a checkout for an order.
#[derive(Debug)]
pub struct CheckoutCommand {
    pub enrollment_id: Option<EnrollmentId>,
    pub course_id: Option<CourseId>,
    pub instructor_id: Option<UserId>,
    pub user_id: Option<UserId>,
    pub payer: Payer,
    pub payer_phone: Option<String>,
    /// Order amount before discount.
    pub amount: f64,
    pub billing_type: BillingType,
    pub coupon_code: Option<String>,
    pub due_date: Option<String>,
    pub description: Option<String>,
    /// Required for card billing types.
    pub card: Option<CardPayment>,
}

/// Result of a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutResult {
    pub payment: Payment,
    /// Gateway charge; `None` for fully discounted orders.
    pub charge: Option<GatewayPayment>,
}

/// Refund all or part of a payment.
#[derive(Debug, Clone)]
pub struct RefundCommand {
    pub payment_id: PaymentId,
    /// `None` refunds everything still refundable.
    pub amount: Option<f64>,
    pub reason: Option<String>,
}

/// Where a reported status came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Ledger,
    Gateway,
}

/// Status of a payment as seen locally and, best effort, by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentStatusView {
    pub payment_id: Option<PaymentId>,
    pub gateway_payment_id: Option<String>,
    pub status: PaymentStatus,
    /// Live status from the gateway, when the lookup succeeded.
    pub gateway_status: Option<PaymentStatus>,
    pub source: StatusSource,
}

/// What applying a webhook event did.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Status advanced and recorded.
    Applied {
        payment_id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        transaction_id: PaymentTransactionId,
    },
    /// Event already recorded; nothing changed.
    Replayed { payment_id: PaymentId },
    /// Event resolves to the current status; nothing changed.
    Unchanged {
        payment_id: PaymentId,
        status: PaymentStatus,
    },
    /// Event acknowledged without effect.
    Ignored { reason: String },
}

/// Result of replaying a payment's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReplay {
    pub payment_id: PaymentId,
    pub stored_status: PaymentStatus,
    pub replayed_status: Option<PaymentStatus>,
    pub transaction_count: usize,
    /// True when the trail is continuous and ends at the stored status.
    pub consistent: bool,
    pub error: Option<String>,
}

/// Discount a coupon would give, without applying it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountPreview {
    pub coupon_code: String,
    pub order_amount: f64,
    pub discount_amount: f64,
    pub final_amount: f64,
    pub eligible: bool,
    pub reason: Option<String>,
}

/// A payment with its audit trail.
#[derive(Debug, Clone)]
pub struct PaymentHistory {
    pub payment: Payment,
    pub transactions: Vec<PaymentTransaction>,
}
