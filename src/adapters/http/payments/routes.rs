//! Axum router configuration for payment endpoints.

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    cancel_payment, get_payment, get_payment_status, handle_webhook, health, list_transactions,
    preview_discount, refund_payment, replay_status, settle_revenue_split, simulate_revenue_split,
    start_checkout, PaymentAppState,
};

/// Payment routes, mounted at `/api/payments`.
///
/// - `POST /checkout` - Start a checkout
/// - `GET /:id` - Payment details
/// - `GET /:id/status` - Local and live gateway status
/// - `GET /:id/transactions` - Audit trail, oldest first
/// - `GET /:id/replay` - Rebuild the status from the audit trail
/// - `POST /:id/refund` - Request a full or partial refund
/// - `POST /:id/cancel` - Cancel an unpaid payment
pub fn payment_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/checkout", post(start_checkout))
        .route("/:id", get(get_payment))
        .route("/:id/status", get(get_payment_status))
        .route("/:id/transactions", get(list_transactions))
        .route("/:id/replay", get(replay_status))
        .route("/:id/refund", post(refund_payment))
        .route("/:id/cancel", post(cancel_payment))
}

/// Coupon and revenue routes.
///
/// - `POST /coupons/preview` - Discount a coupon would give
/// - `POST /revenue/simulate` - Split without persisting
/// - `POST /revenue/splits/:id/settle` - Mark a split processed or failed
pub fn pricing_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/coupons/preview", post(preview_discount))
        .route("/revenue/simulate", post(simulate_revenue_split))
        .route("/revenue/splits/:id/settle", post(settle_revenue_split))
}

/// Webhook routes, mounted at `/api/webhooks`. No auth; signatures are
/// verified per gateway.
///
/// - `POST /:gateway` - Gateway notification
pub fn webhook_routes() -> Router<PaymentAppState> {
    Router::new().route("/:gateway", post(handle_webhook))
}

/// Complete router with tracing, a request timeout and a body size limit.
pub fn payment_router(
    state: PaymentAppState,
    request_timeout: Duration,
    body_limit_bytes: usize,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/payments", payment_routes())
        .nest("/api/webhooks", webhook_routes())
        .nest("/api", pricing_routes())
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
