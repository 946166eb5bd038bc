//! Application layer - Use cases over the payment domain.
//!
//! The [`PaymentOrchestrator`] is the only writer of payments. The registry,
//! signature verifier and webhook mapper are building blocks that gateway
//! adapters and the orchestrator share.

mod gateway_registry;
mod orchestrator;
mod signature_verifier;
mod webhook_mapper;

pub use gateway_registry::GatewayRegistry;
pub use orchestrator::{
    AuditReplay, CardPayment, CheckoutCommand, CheckoutResult, CreateCardChargeCommand,
    CreateChargeCommand, DiscountPreview, OrchestratorSettings, PaymentHistory,
    PaymentOrchestrator, PaymentStatusView, RefundCommand, StatusSource, WebhookOutcome,
};
pub use signature_verifier::{
    HmacSignatureVerifier, SignatureError, SignatureHeader, DEFAULT_MAX_EVENT_AGE_SECS,
    SIGNATURE_HEADER,
};
pub use webhook_mapper::WebhookEventMapper;
