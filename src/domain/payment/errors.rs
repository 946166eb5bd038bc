//! Payment error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | InvalidSignature | 401 |
//! | NotFound | 404 |
//! | InvalidTransition | 409 |
//! | Duplicate | 409 |
//! | SplitAlreadySettled | 409 |
//! | Upstream | 502 |
//! | Infrastructure | 500 |

use super::PaymentStatus;
use crate::domain::foundation::{DomainError, ErrorCode, PaymentTransactionId, ValidationError};
use crate::domain::revenue::RevenueSplitStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by payment use cases.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentFlowError {
    /// Input rejected before any gateway or database call.
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// The requested status is unreachable from the current one.
    ///
    /// The anomaly has already been appended to the audit trail as
    /// `audit_entry`.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
        audit_entry: Option<PaymentTransactionId>,
    },

    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Revenue split is no longer pending.
    #[error("Revenue split already {0}")]
    SplitAlreadySettled(RevenueSplitStatus),

    /// Webhook signature missing, malformed, stale or wrong.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Gateway call failed. Propagated unmodified.
    #[error("Gateway error: {0}")]
    Upstream(GatewayError),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl PaymentFlowError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentFlowError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        PaymentFlowError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether the caller (or webhook sender) should retry later.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentFlowError::Upstream(err) => err.retryable,
            PaymentFlowError::Infrastructure(_) => true,
            _ => false,
        }
    }
}

impl From<ValidationError> for PaymentFlowError {
    fn from(err: ValidationError) -> Self {
        PaymentFlowError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<GatewayError> for PaymentFlowError {
    fn from(err: GatewayError) -> Self {
        PaymentFlowError::Upstream(err)
    }
}

impl From<DomainError> for PaymentFlowError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::InvalidFormat => PaymentFlowError::Validation {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::DuplicateEvent => PaymentFlowError::Duplicate(err.message),
            _ => PaymentFlowError::Infrastructure(err.to_string()),
        }
    }
}

/// Errors returned by payment gateway adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayError {
    /// Error code for categorization.
    pub code: GatewayErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn card_declined(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::CardDeclined, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidRequest, message)
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidWebhook, message)
    }

    /// Registry lookups for names that were never registered.
    pub fn not_registered(name: &str) -> Self {
        Self::new(
            GatewayErrorCode::NotRegistered,
            format!("gateway '{}' is not registered", name),
        )
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    NetworkError,
    AuthenticationError,
    CardDeclined,
    InsufficientFunds,
    InvalidCard,
    InvalidRequest,
    NotFound,
    RateLimitExceeded,
    InvalidWebhook,
    NotRegistered,
    ProviderError,
    Unknown,
}

impl GatewayErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError
                | GatewayErrorCode::RateLimitExceeded
                | GatewayErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::CardDeclined => "card_declined",
            GatewayErrorCode::InsufficientFunds => "insufficient_funds",
            GatewayErrorCode::InvalidCard => "invalid_card",
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            GatewayErrorCode::InvalidWebhook => "invalid_webhook",
            GatewayErrorCode::NotRegistered => "not_registered",
            GatewayErrorCode::ProviderError => "provider_error",
            GatewayErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
