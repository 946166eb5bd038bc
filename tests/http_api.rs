//! HTTP surface tests.
//!
//! Requests go through the full router (tracing and timeout layers
//! included) with `tower::ServiceExt::oneshot`.

mod common;

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{test_app, TestApp};
use payflow::adapters::gateway::SandboxWebhook;
use payflow::adapters::http::{payment_router, PaymentAppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(app: &TestApp) -> Router {
    payment_router(
        PaymentAppState::new(app.orchestrator.clone()),
        Duration::from_secs(5),
        64 * 1024,
    )
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn webhook_request(app: &TestApp, webhook: &SandboxWebhook) -> Request<Body> {
    let (headers, body) = app.gateway.signed_webhook(webhook);
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/webhooks/sandbox")
        .header("content-type", "application/json");
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn checkout(app: &TestApp) -> (String, String) {
    let (status, body) = send(
        router(app),
        post_json(
            "/api/payments/checkout",
            json!({
                "payer": { "name": "Ana Souza", "document": "12345678900" },
                "amount": 100.0,
                "billing_type": "pix"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    (
        body["payment"]["id"].as_str().unwrap().to_string(),
        body["charge"]["id"].as_str().unwrap().to_string(),
    )
}

// ════════════════════════════════════════════════════════════════════════════════
// Payments
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();
    let (status, body) = send(router(&app), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn checkout_returns_payment_and_charge() {
    let app = test_app();
    let (payment_id, _) = checkout(&app).await;

    let (status, body) = send(router(&app), get(&format!("/api/payments/{}", payment_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "awaiting_payment");
    assert_eq!(body["method"], "pix");
    assert!(body.get("version").is_none());
}

#[tokio::test]
async fn checkout_with_invalid_amount_is_bad_request() {
    let app = test_app();
    let (status, body) = send(
        router(&app),
        post_json(
            "/api/payments/checkout",
            json!({
                "payer": { "name": "Ana", "document": "123" },
                "amount": -5.0,
                "billing_type": "pix"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_FAILED");
    assert_eq!(body["details"]["field"], "amount");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let app = test_app();
    let (status, _) = send(
        router(&app),
        get("/api/payments/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(router(&app), get("/api/payments/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "payment_id");
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn webhook_confirms_and_trail_is_visible() {
    let app = test_app();
    let (payment_id, charge_id) = checkout(&app).await;

    let webhook = SandboxWebhook::new("evt_http_1", "PAYMENT_CONFIRMED", &charge_id);
    let (status, body) = send(router(&app), webhook_request(&app, &webhook)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["status"], "confirmed");

    let (status, body) = send(router(&app), webhook_request(&app, &webhook)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "replayed");

    let (status, body) = send(
        router(&app),
        get(&format!("/api/payments/{}/transactions", payment_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(
        router(&app),
        get(&format!("/api/payments/{}/replay", payment_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], true);
}

#[tokio::test]
async fn webhook_with_bad_signature_is_unauthorized() {
    let app = test_app();
    let (payment_id, charge_id) = checkout(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/sandbox")
        .header("x-payflow-signature", "t=1,v1=deadbeef")
        .body(Body::from(
            serde_json::to_vec(&SandboxWebhook::new("evt_forged", "PAYMENT_CONFIRMED", &charge_id))
                .unwrap(),
        ))
        .unwrap();
    let (status, body) = send(router(&app), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "INVALID_WEBHOOK_SIGNATURE");

    let (_, body) = send(router(&app), get(&format!("/api/payments/{}", payment_id))).await;
    assert_eq!(body["status"], "awaiting_payment");
}

#[tokio::test]
async fn invalid_transition_is_conflict_with_audit_entry() {
    let app = test_app();
    let (_, charge_id) = checkout(&app).await;

    send(
        router(&app),
        webhook_request(
            &app,
            &SandboxWebhook::new("evt_paid", "PAYMENT_RECEIVED", &charge_id),
        ),
    )
    .await;

    let (status, body) = send(
        router(&app),
        webhook_request(
            &app,
            &SandboxWebhook::new("evt_overdue", "PAYMENT_OVERDUE", &charge_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "INVALID_STATE_TRANSITION");
    assert_eq!(body["details"]["from"], "received");
    assert_eq!(body["details"]["to"], "overdue");
    assert!(body["details"]["audit_entry"].is_string());
}

#[tokio::test]
async fn oversized_webhook_body_is_rejected() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/sandbox")
        .body(Body::from(vec![b'x'; 128 * 1024]))
        .unwrap();
    let response = router(&app).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn webhook_for_unknown_payment_is_acknowledged() {
    let app = test_app();
    let webhook = SandboxWebhook::new("evt_orphan", "PAYMENT_CONFIRMED", "pay_nobody");
    let (status, body) = send(router(&app), webhook_request(&app, &webhook)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
}

// ════════════════════════════════════════════════════════════════════════════════
// Pricing
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn revenue_simulation_uses_gateway_fees() {
    let app = test_app();
    let (status, body) = send(
        router(&app),
        post_json(
            "/api/revenue/simulate",
            json!({ "amount": 100.0, "method": "boleto" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["payment_fee"], 2.99);
    assert_eq!(body["instructor_percent"], 70.0);
}

#[tokio::test]
async fn unknown_coupon_preview_is_not_found() {
    let app = test_app();
    let (status, body) = send(
        router(&app),
        post_json(
            "/api/coupons/preview",
            json!({ "coupon_code": "NOPE", "amount": 100.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "NOT_FOUND");
}
