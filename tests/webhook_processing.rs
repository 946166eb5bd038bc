//! Webhook delivery semantics: signatures, idempotency, concurrent
//! deliveries and anomaly recording.

mod common;

use std::sync::Arc;

use common::{pix_checkout, test_app, TestApp, WEBHOOK_SECRET};
use http::{HeaderMap, HeaderValue};
use payflow::adapters::gateway::SandboxWebhook;
use payflow::application::{HmacSignatureVerifier, WebhookOutcome, SIGNATURE_HEADER};
use payflow::domain::payment::{Payment, PaymentFlowError, PaymentStatus, ERROR_EVENT_TYPE};
use secrecy::SecretString;

async fn awaiting_payment(app: &TestApp) -> (Payment, String) {
    let checkout = app
        .orchestrator
        .start_checkout(pix_checkout(100.0))
        .await
        .unwrap();
    let gateway_payment_id = checkout.charge.unwrap().id;
    (checkout.payment, gateway_payment_id)
}

async fn deliver(app: &TestApp, webhook: &SandboxWebhook) -> Result<WebhookOutcome, PaymentFlowError> {
    let (headers, body) = app.gateway.signed_webhook(webhook);
    app.orchestrator
        .handle_webhook("sandbox", &headers, &body)
        .await
}

// ════════════════════════════════════════════════════════════════════════════════
// Signatures
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn tampered_body_is_rejected_without_side_effects() {
    let app = test_app();
    let (payment, gpid) = awaiting_payment(&app).await;

    let webhook = SandboxWebhook::new("evt_1", "PAYMENT_CONFIRMED", &gpid);
    let (headers, mut body) = app.gateway.signed_webhook(&webhook);
    body.extend_from_slice(b" ");

    let err = app
        .orchestrator
        .handle_webhook("sandbox", &headers, &body)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentFlowError::InvalidSignature));

    let stored = app.orchestrator.find_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::AwaitingPayment);
    assert_eq!(stored.version, payment.version);
    let trail = app.orchestrator.list_transactions(&payment.id).await.unwrap();
    assert_eq!(trail.len(), 1);
}

#[tokio::test]
async fn missing_and_malformed_signatures_are_rejected() {
    let app = test_app();
    let (_, gpid) = awaiting_payment(&app).await;
    let body = serde_json::to_vec(&SandboxWebhook::new("evt_1", "PAYMENT_CONFIRMED", &gpid)).unwrap();

    let err = app
        .orchestrator
        .handle_webhook("sandbox", &HeaderMap::new(), &body)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentFlowError::InvalidSignature));

    let mut headers = HeaderMap::new();
    headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("garbage"));
    let err = app
        .orchestrator
        .handle_webhook("sandbox", &headers, &body)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentFlowError::InvalidSignature));
}

#[tokio::test]
async fn unknown_gateway_is_not_found() {
    let app = test_app();
    let err = app
        .orchestrator
        .handle_webhook("acme", &HeaderMap::new(), b"{}")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentFlowError::NotFound { .. }));
}

#[tokio::test]
async fn delivered_body_is_stored_byte_for_byte() {
    let app = test_app();
    let (payment, gpid) = awaiting_payment(&app).await;

    // Hand-formatted body: key order, spacing and unknown fields must survive.
    let body = format!(
        "{{\n  \"payment\": {{ \"status\": \"CONFIRMED\", \"id\": \"{}\" }},\n  \"event\":   \"PAYMENT_CONFIRMED\",\n  \"id\": \"evt_raw\",\n  \"extra\": [1, 2.50]\n}}",
        gpid
    )
    .into_bytes();
    let signature = HmacSignatureVerifier::new(SecretString::new(WEBHOOK_SECRET.to_string()))
        .sign(&body, chrono::Utc::now().timestamp())
        .unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());

    let outcome = app
        .orchestrator
        .handle_webhook("sandbox", &headers, &body)
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Applied { .. }));

    let trail = app.orchestrator.list_transactions(&payment.id).await.unwrap();
    let recorded = trail.last().unwrap();
    assert_eq!(recorded.raw_body.as_deref(), Some(body.as_slice()));
    assert_eq!(recorded.raw_payload.as_ref().unwrap()["id"], "evt_raw");
}

// ════════════════════════════════════════════════════════════════════════════════
// Idempotency
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn redelivered_event_is_replayed() {
    let app = test_app();
    let (payment, gpid) = awaiting_payment(&app).await;
    let webhook = SandboxWebhook::new("evt_dup", "PAYMENT_CONFIRMED", &gpid);

    let first = deliver(&app, &webhook).await.unwrap();
    assert!(matches!(first, WebhookOutcome::Applied { .. }));

    let second = deliver(&app, &webhook).await.unwrap();
    assert_eq!(
        second,
        WebhookOutcome::Replayed {
            payment_id: payment.id
        }
    );

    let trail = app.orchestrator.list_transactions(&payment.id).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(
        trail[1].idempotency_key.as_deref(),
        Some("sandbox:evt_dup")
    );
}

#[tokio::test]
async fn event_without_id_deduplicates_on_payment_and_status() {
    let app = test_app();
    let (payment, gpid) = awaiting_payment(&app).await;
    let webhook = SandboxWebhook::new("ignored", "PAYMENT_CONFIRMED", &gpid)
        .without_id()
        .with_payment_date(chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());

    assert!(matches!(
        deliver(&app, &webhook).await.unwrap(),
        WebhookOutcome::Applied { .. }
    ));
    assert!(matches!(
        deliver(&app, &webhook).await.unwrap(),
        WebhookOutcome::Replayed { .. }
    ));

    let trail = app.orchestrator.list_transactions(&payment.id).await.unwrap();
    assert_eq!(trail.len(), 2);
    let key = trail[1].idempotency_key.clone().unwrap();
    assert!(key.starts_with(&payment.id.to_string()), "key was {}", key);
}

#[tokio::test]
async fn concurrent_deliveries_apply_once() {
    let app = test_app();
    let (payment, gpid) = awaiting_payment(&app).await;
    let webhook = SandboxWebhook::new("evt_race", "PAYMENT_CONFIRMED", &gpid);
    let (headers, body) = app.gateway.signed_webhook(&webhook);

    let orchestrator = Arc::clone(&app.orchestrator);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let orchestrator = Arc::clone(&orchestrator);
        let headers = headers.clone();
        let body = body.clone();
        handles.push(tokio::spawn(async move {
            orchestrator.handle_webhook("sandbox", &headers, &body).await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            WebhookOutcome::Applied { .. } => applied += 1,
            WebhookOutcome::Replayed { .. } => {}
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(applied, 1);

    let trail = app.orchestrator.list_transactions(&payment.id).await.unwrap();
    assert_eq!(trail.len(), 2);
    let split = payflow::ports::RevenueSplitRepository::find_split_by_payment(
        app.ledger.as_ref(),
        &payment.id,
    )
    .await
    .unwrap();
    assert!(split.is_some());
}

#[tokio::test]
async fn same_status_event_is_unchanged() {
    let app = test_app();
    let (payment, gpid) = awaiting_payment(&app).await;

    let outcome = deliver(
        &app,
        &SandboxWebhook::new("evt_created", "PAYMENT_CREATED", &gpid).with_status("PENDING"),
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Unchanged {
            payment_id: payment.id,
            status: PaymentStatus::AwaitingPayment,
        }
    );
}

// ════════════════════════════════════════════════════════════════════════════════
// Ignored events
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unknown_payment_and_unknown_event_are_ignored() {
    let app = test_app();
    let (_, gpid) = awaiting_payment(&app).await;

    let outcome = deliver(&app, &SandboxWebhook::new("evt_x", "PAYMENT_CONFIRMED", "pay_unknown"))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

    let outcome = deliver(&app, &SandboxWebhook::new("evt_y", "PAYMENT_SPLIT_DIVERGED", &gpid))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
}

// ════════════════════════════════════════════════════════════════════════════════
// Anomalies
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn invalid_transition_is_audited_and_replay_stays_consistent() {
    let app = test_app();
    let (payment, gpid) = awaiting_payment(&app).await;
    deliver(&app, &SandboxWebhook::new("evt_ok", "PAYMENT_CONFIRMED", &gpid))
        .await
        .unwrap();

    let overdue = SandboxWebhook::new("evt_late_overdue", "PAYMENT_OVERDUE", &gpid);
    let err = deliver(&app, &overdue).await.unwrap_err();
    let audit_entry = match err {
        PaymentFlowError::InvalidTransition {
            from: PaymentStatus::Confirmed,
            to: PaymentStatus::Overdue,
            audit_entry: Some(id),
        } => id,
        other => panic!("expected invalid transition, got {:?}", other),
    };

    let stored = app.orchestrator.find_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Confirmed);

    let trail = app.orchestrator.list_transactions(&payment.id).await.unwrap();
    assert_eq!(trail.len(), 3);
    let anomaly = &trail[2];
    assert_eq!(anomaly.id, audit_entry);
    assert_eq!(anomaly.event_type, ERROR_EVENT_TYPE);
    assert_eq!(anomaly.previous_status, Some(PaymentStatus::Confirmed));
    assert_eq!(anomaly.new_status, PaymentStatus::Confirmed);

    // Redelivery reports the same anomaly without appending another.
    let err = deliver(&app, &overdue).await.unwrap_err();
    assert!(matches!(
        err,
        PaymentFlowError::InvalidTransition { audit_entry: Some(id), .. } if id == audit_entry
    ));
    let trail = app.orchestrator.list_transactions(&payment.id).await.unwrap();
    assert_eq!(trail.len(), 3);

    let replay = app.orchestrator.replay_status(&payment.id).await.unwrap();
    assert!(replay.consistent, "replay error: {:?}", replay.error);
    assert_eq!(replay.replayed_status, Some(PaymentStatus::Confirmed));
}
