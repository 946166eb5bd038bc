//! HTTP handlers for payment endpoints.
//!
//! Handlers translate requests into orchestrator calls and map
//! [`PaymentFlowError`] onto status codes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::{PaymentOrchestrator, RefundCommand};
use crate::domain::foundation::{PaymentId, RevenueSplitId};
use crate::domain::payment::PaymentFlowError;

use super::dto::{
    CheckoutRequest, CheckoutResponse, DiscountPreviewRequest, ErrorResponse, PaymentResponse,
    RefundRequest, RevenueSplitResponse, SettleSplitRequest, SimulateSplitRequest,
    WebhookResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for payment routes.
#[derive(Clone)]
pub struct PaymentAppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
}

impl PaymentAppState {
    pub fn new(orchestrator: Arc<PaymentOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

fn parse_payment_id(raw: &str) -> Result<PaymentId, PaymentApiError> {
    raw.parse()
        .map_err(|_| PaymentFlowError::validation("payment_id", "must be a UUID").into())
}

fn remote_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ════════════════════════════════════════════════════════════════════════════════
// Payments
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments/checkout
pub async fn start_checkout(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let command = request.into_command(remote_ip(&headers))?;
    let result = state.orchestrator.start_checkout(command).await?;
    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

/// GET /api/payments/:id
pub async fn get_payment(
    State(state): State<PaymentAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let id = parse_payment_id(&id)?;
    let payment = state.orchestrator.find_payment(&id).await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// GET /api/payments/:id/status
///
/// Accepts our payment id or a gateway payment id.
pub async fn get_payment_status(
    State(state): State<PaymentAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let view = state.orchestrator.get_payment_status(&id).await?;
    Ok(Json(view))
}

/// GET /api/payments/:id/transactions
pub async fn list_transactions(
    State(state): State<PaymentAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let id = parse_payment_id(&id)?;
    let transactions = state.orchestrator.list_transactions(&id).await?;
    Ok(Json(transactions))
}

/// GET /api/payments/:id/replay
pub async fn replay_status(
    State(state): State<PaymentAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let id = parse_payment_id(&id)?;
    let replay = state.orchestrator.replay_status(&id).await?;
    Ok(Json(replay))
}

/// POST /api/payments/:id/refund
pub async fn refund_payment(
    State(state): State<PaymentAppState>,
    Path(id): Path<String>,
    request: Option<Json<RefundRequest>>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let payment_id = parse_payment_id(&id)?;
    let Json(request) = request.unwrap_or_default();
    let payment = state
        .orchestrator
        .refund_payment(RefundCommand {
            payment_id,
            amount: request.amount,
            reason: request.reason,
        })
        .await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// POST /api/payments/:id/cancel
pub async fn cancel_payment(
    State(state): State<PaymentAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let id = parse_payment_id(&id)?;
    let payment = state.orchestrator.cancel_payment(&id).await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Coupons and revenue
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/coupons/preview
pub async fn preview_discount(
    State(state): State<PaymentAppState>,
    Json(request): Json<DiscountPreviewRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let preview = state
        .orchestrator
        .preview_discount(&request.coupon_code, request.amount, request.course_id.as_ref())
        .await?;
    Ok(Json(preview))
}

/// POST /api/revenue/simulate
pub async fn simulate_revenue_split(
    State(state): State<PaymentAppState>,
    Json(request): Json<SimulateSplitRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let split = state.orchestrator.simulate_revenue_split(
        request.amount,
        &request.method,
        request.instructor_percent,
        request.platform_percent,
    )?;
    Ok(Json(split))
}

/// POST /api/revenue/splits/:id/settle
pub async fn settle_revenue_split(
    State(state): State<PaymentAppState>,
    Path(id): Path<String>,
    Json(request): Json<SettleSplitRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let id: RevenueSplitId = id
        .parse()
        .map_err(|_| PaymentFlowError::validation("split_id", "must be a UUID"))?;
    let split = state
        .orchestrator
        .settle_revenue_split(&id, request.status)
        .await?;
    Ok(Json(RevenueSplitResponse::from(split)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/:gateway
///
/// 200 when applied, replayed or ignored; 401 for a bad signature; 409 when
/// the event implies an invalid transition; 5xx asks the gateway to retry.
pub async fn handle_webhook(
    State(state): State<PaymentAppState>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PaymentApiError> {
    let outcome = state
        .orchestrator
        .handle_webhook(&gateway, &headers, &body)
        .await?;
    Ok(Json(WebhookResponse::from(outcome)))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts payment errors to HTTP responses.
#[derive(Debug)]
pub struct PaymentApiError(PaymentFlowError);

impl From<PaymentFlowError> for PaymentApiError {
    fn from(err: PaymentFlowError) -> Self {
        Self(err)
    }
}

impl PaymentApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            PaymentFlowError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            PaymentFlowError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "INVALID_WEBHOOK_SIGNATURE")
            }
            PaymentFlowError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            PaymentFlowError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "INVALID_STATE_TRANSITION")
            }
            PaymentFlowError::Duplicate(_) => (StatusCode::CONFLICT, "DUPLICATE"),
            PaymentFlowError::SplitAlreadySettled(_) => {
                (StatusCode::CONFLICT, "SPLIT_ALREADY_SETTLED")
            }
            PaymentFlowError::Upstream(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
            PaymentFlowError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = self.status();

        let body = match &self.0 {
            PaymentFlowError::Validation { field, message } => ErrorResponse::with_details(
                error_code,
                message.clone(),
                serde_json::json!({ "field": field }),
            ),
            PaymentFlowError::InvalidTransition {
                from,
                to,
                audit_entry,
            } => ErrorResponse::with_details(
                error_code,
                self.0.to_string(),
                serde_json::json!({ "from": from, "to": to, "audit_entry": audit_entry }),
            ),
            PaymentFlowError::Upstream(err) => ErrorResponse::with_details(
                error_code,
                err.message.clone(),
                serde_json::json!({
                    "code": err.code,
                    "provider_code": err.provider_code,
                    "retryable": err.retryable,
                }),
            ),
            PaymentFlowError::Infrastructure(message) => {
                tracing::error!(error = %message, "Request failed");
                ErrorResponse::new(error_code, "Internal error, retry later")
            }
            other => ErrorResponse::new(error_code, other.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
