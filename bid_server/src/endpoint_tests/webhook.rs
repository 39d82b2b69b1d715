use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use bid_engine::{
    bid_state::{IgnoreReason, RejectReason},
    db_types::{BidStatusType, PaymentEventKind},
    events::EventProducers,
    traits::{BidGatewayError, ReconciliationOutcome},
    ReconciliationApi,
};
use chrono::Utc;
use pbs_common::{Cents, Secret};
use serde_json::{json, Value};
use stripe_tools::webhook::{compute_signature, SIGNATURE_HEADER};

use super::{helpers::*, mocks::MockBidStore};
use crate::{config::ServerOptions, middleware::SignatureMiddlewareFactory, routes::StripeWebhookRoute};

const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";

#[actix_web::test]
async fn payment_succeeded() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification()
        .withf(|n| {
            n.event_id == "evt_100" &&
                n.kind == PaymentEventKind::Succeeded &&
                n.payment_intent_id == "pi_11" &&
                n.amount == Cents::from(51_500) &&
                n.bid_id == Some(11)
        })
        .times(1)
        .returning(|_| {
            Ok(ReconciliationOutcome::Applied {
                bid: test_bid(11, 5, BidStatusType::Pending),
                old_status: BidStatusType::AwaitingPayment,
            })
        });
    let payload = intent_event("evt_100", "payment_intent.succeeded", "pi_11", 51_500);
    let (status, body) = send_request(signed_request(&payload, WEBHOOK_SECRET), configure(db, true)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, r#"{"success":true,"message":"Bid #11 moved from awaiting_payment to pending"}"#);
}

#[actix_web::test]
async fn duplicate_event() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification()
        .returning(|n| Ok(ReconciliationOutcome::Duplicate { event_id: n.event_id }));
    let payload = intent_event("evt_100", "payment_intent.succeeded", "pi_11", 51_500);
    let (status, body) = send_request(signed_request(&payload, WEBHOOK_SECRET), configure(db, true)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Event evt_100 has already been processed");
}

#[actix_web::test]
async fn rejected_payments_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification()
        .returning(|_| Ok(ReconciliationOutcome::Rejected { bid_id: 11, reason: RejectReason::PaidAfterCancellation }));
    let payload = intent_event("evt_101", "payment_intent.succeeded", "pi_11", 51_500);
    let (status, body) = send_request(signed_request(&payload, WEBHOOK_SECRET), configure(db, true)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Bid #11 needs attention: payment received for a cancelled bid");
}

#[actix_web::test]
async fn failed_payment() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification()
        .withf(|n| n.kind == PaymentEventKind::Failed)
        .returning(|_| Ok(ReconciliationOutcome::Ignored { bid_id: 11, reason: IgnoreReason::StaleEvent }));
    let payload = intent_event("evt_102", "payment_intent.payment_failed", "pi_11", 51_500);
    let (status, body) = send_request(signed_request(&payload, WEBHOOK_SECRET), configure(db, true)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("unchanged"), "was: {body}");
}

#[actix_web::test]
async fn other_event_types_are_ignored() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification().never();
    let payload = json!({
        "id": "evt_200",
        "type": "customer.created",
        "created": Utc::now().timestamp(),
        "livemode": false,
        "data": { "object": { "id": "cus_1", "object": "customer" } }
    })
    .to_string();
    let (status, body) = send_request(signed_request(&payload, WEBHOOK_SECRET), configure(db, true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Event type customer.created ignored."}"#);
}

#[actix_web::test]
async fn database_errors_ask_for_redelivery() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification().returning(|_| {
        Err(BidGatewayError::ConcurrentModification { bid_id: 11, expected: BidStatusType::AwaitingPayment })
    });
    let payload = intent_event("evt_103", "payment_intent.succeeded", "pi_11", 51_500);
    let (status, body) = send_request(signed_request(&payload, WEBHOOK_SECRET), configure(db, true)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"success":false,"message":"Could not process event."}"#);
}

#[actix_web::test]
async fn missing_signature() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification().never();
    let payload = intent_event("evt_104", "payment_intent.succeeded", "pi_11", 51_500);
    let req = TestRequest::post().uri("/webhook").set_payload(payload);
    let (status, body) = send_request(req, configure(db, true)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No webhook signature found."), "was: {body}");
}

#[actix_web::test]
async fn wrong_signature() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification().never();
    let payload = intent_event("evt_105", "payment_intent.succeeded", "pi_11", 51_500);
    let (status, body) = send_request(signed_request(&payload, "whsec_someone_else"), configure(db, true)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid webhook signature."), "was: {body}");
}

#[actix_web::test]
async fn tampered_payload() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification().never();
    let payload = intent_event("evt_106", "payment_intent.succeeded", "pi_11", 51_500);
    let header = signed_header(&payload, WEBHOOK_SECRET);
    let tampered = payload.replace("51500", "1");
    let req = TestRequest::post().uri("/webhook").insert_header((SIGNATURE_HEADER, header)).set_payload(tampered);
    let (status, _) = send_request(req, configure(db, true)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unsigned_requests_pass_when_checks_are_disabled() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification().times(1).returning(|_| Ok(ReconciliationOutcome::UnknownBid));
    let payload = intent_event("evt_107", "payment_intent.succeeded", "pi_unknown", 100);
    let req = TestRequest::post().uri("/webhook").set_payload(payload);
    let (status, body) = send_request(req, configure(db, false)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No bid matches this payment"), "was: {body}");
}

#[actix_web::test]
async fn unreadable_payload() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_process_payment_notification().never();
    let payload = r#"{"id": "evt_108", "type": "payment_intent.succeeded""#;
    let (status, body) = send_request(signed_request(payload, WEBHOOK_SECRET), configure(db, true)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid webhook payload."), "was: {body}");
}

fn intent_event(event_id: &str, event_type: &str, intent_id: &str, amount: i64) -> String {
    json!({
        "id": event_id,
        "type": event_type,
        "created": Utc::now().timestamp(),
        "livemode": false,
        "data": {
            "object": {
                "id": intent_id,
                "object": "payment_intent",
                "amount": amount,
                "currency": "usd",
                "status": "succeeded",
                "metadata": { "bid_id": "11", "user_id": "5", "type": "bid_payment" }
            }
        }
    })
    .to_string()
}

fn signed_header(payload: &str, secret: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let signature = compute_signature(payload.as_bytes(), secret, timestamp).unwrap();
    format!("t={timestamp},v1={signature}")
}

fn signed_request(payload: &str, secret: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhook")
        .insert_header((SIGNATURE_HEADER, signed_header(payload, secret)))
        .set_payload(payload.to_string())
}

fn configure(db: MockBidStore, signature_checks: bool) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = ReconciliationApi::new(db, EventProducers::default());
        let signatures = SignatureMiddlewareFactory::new(Secret::new(WEBHOOK_SECRET.into()), 300, signature_checks);
        cfg.app_data(web::Data::new(api)).app_data(web::Data::new(ServerOptions::default())).service(
            web::scope("/webhook").wrap(signatures).service(StripeWebhookRoute::<MockBidStore>::new()),
        );
    }
}
