use std::sync::atomic::{AtomicUsize, Ordering};

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use bid_engine::{
    db_types::BidStatusType,
    events::EventProducers,
    fees::FeeSchedule,
    traits::{BidGatewayError, PaymentAuthorization, PaymentProcessorError},
    BidFlowApi,
    BidsApi,
    ReconciliationApi,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use super::{
    helpers::*,
    mocks::{MockBidStore, MockProcessor},
};
use crate::routes::{
    BidPaymentEventsRoute,
    CancelBidRoute,
    MyBidRoute,
    MyBidsRoute,
    PlaceBidRoute,
    QuoteRoute,
    RetryPaymentRoute,
    SearchBidsRoute,
    UpdateBidStatusRoute,
};

#[actix_web::test]
async fn quote_requires_a_token() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/quote?max_bid=3000");
    let (status, _) = send_api_request(req, "", flow(MockBidStore::new(), MockProcessor::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn quote_above_the_deposit_threshold() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/quote?max_bid=3000");
    let (status, body) =
        send_api_request(req, &user_token(), flow(MockBidStore::new(), MockProcessor::new())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let quote: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        quote,
        json!({
            "max_bid": 300_000,
            "deposit_amount": 30_000,
            "service_fee": 21_500,
            "total_amount": 51_500,
            "requires_deposit": true,
            "currency": "usd"
        })
    );
}

#[actix_web::test]
async fn quote_below_the_deposit_threshold() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/quote?max_bid=2500");
    let (status, body) =
        send_api_request(req, &user_token(), flow(MockBidStore::new(), MockProcessor::new())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let quote: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(quote["deposit_amount"], 0);
    assert_eq!(quote["total_amount"], 21_500);
    assert_eq!(quote["requires_deposit"], false);
}

#[actix_web::test]
async fn quote_for_a_negative_bid() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/quote?max_bid=-5");
    let (status, _) = send_api_request(req, &user_token(), flow(MockBidStore::new(), MockProcessor::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn place_bid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_insert_bid()
        .withf(|bid| bid.user_id == 5 && bid.lot_number == "LOT-42" && bid.notes.as_deref() == Some("Blue vase"))
        .times(1)
        .returning(|bid| Ok(bid_from_new(11, bid)));
    db.expect_attach_payment_authorization()
        .withf(|id, expected, intent| *id == 11 && *expected == BidStatusType::New && intent == "pi_11")
        .times(1)
        .returning(|id, _, intent| {
            let mut bid = test_bid(id, 5, BidStatusType::AwaitingPayment);
            bid.payment_intent_id = Some(intent.to_string());
            Ok(bid)
        });
    let mut processor = MockProcessor::new();
    processor
        .expect_create_authorization()
        .withf(|req| req.bid_id == 11 && req.amount.value() == 51_500 && req.currency == "usd")
        .times(1)
        .returning(|req| {
            Ok(PaymentAuthorization {
                payment_intent_id: "pi_11".into(),
                client_secret: "pi_11_secret_xyz".into(),
                amount: req.amount,
                currency: req.currency,
            })
        });
    let req = TestRequest::post()
        .uri("/bids")
        .set_json(json!({"lot_number": " LOT-42 ", "max_bid": 3000.0, "notes": "Blue vase"}));
    let (status, body) = send_api_request(req, &user_token(), flow(db, processor)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let placement: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(placement["client_secret"], "pi_11_secret_xyz");
    assert_eq!(placement["bid"]["id"], 11);
    assert_eq!(placement["bid"]["status"], "awaiting_payment");
    assert_eq!(placement["quote"]["total_amount"], 51_500);
}

#[actix_web::test]
async fn place_bid_when_the_processor_is_down() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_insert_bid().times(1).returning(|bid| Ok(bid_from_new(12, bid)));
    db.expect_attach_payment_authorization().never();
    let mut processor = MockProcessor::new();
    processor
        .expect_create_authorization()
        .returning(|_| Err(PaymentProcessorError::Unavailable("connection refused".into())));
    let req = TestRequest::post().uri("/bids").set_json(json!({"lot_number": "LOT-12", "max_bid": 100.0}));
    let (status, body) = send_api_request(req, &user_token(), flow(db, processor)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("Could not create a payment authorization for bid #12"), "was: {body}");
}

#[actix_web::test]
async fn place_invalid_bid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_insert_bid().never();
    let req = TestRequest::post().uri("/bids").set_json(json!({"lot_number": "   ", "max_bid": 100.0}));
    let (status, body) = send_api_request(req, &user_token(), flow(db, MockProcessor::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("A lot number is required"), "was: {body}");
}

#[actix_web::test]
async fn fetch_my_bids() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_bids_for_user().withf(|id| *id == 5).returning(|id| {
        Ok(vec![test_bid(2, id, BidStatusType::Pending), test_bid(1, id, BidStatusType::Cancelled)])
    });
    let req = TestRequest::get().uri("/bids");
    let (status, body) = send_api_request(req, &user_token(), reads(db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let bids: Value = serde_json::from_str(&body).unwrap();
    let bids = bids.as_array().unwrap();
    assert_eq!(bids.len(), 2);
    assert_eq!(bids[0]["status"], "pending");
    assert_eq!(bids[0]["lot_number"], "LOT-002");
    assert_eq!(bids[1]["status"], "cancelled");
}

#[actix_web::test]
async fn fetch_another_users_bid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_bid().returning(|id| Ok(Some(test_bid(id, 99, BidStatusType::Pending))));
    let req = TestRequest::get().uri("/bids/3");
    let (status, body) = send_api_request(req, &user_token(), reads(db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Bid #3 does not exist"}"#);
}

#[actix_web::test]
async fn fetch_my_bid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_bid().returning(|id| Ok(Some(test_bid(id, 5, BidStatusType::Winning))));
    let req = TestRequest::get().uri("/bids/3");
    let (status, body) = send_api_request(req, &user_token(), reads(db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let bid: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(bid["id"], 3);
    assert_eq!(bid["status"], "winning");
    assert_eq!(bid["max_bid"], 300_000);
}

#[actix_web::test]
async fn cancel_unpaid_bid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_bid().returning(|id| Ok(Some(test_bid(id, 5, BidStatusType::AwaitingPayment))));
    db.expect_update_bid_status()
        .withf(|id, from, to| *id == 4 && *from == BidStatusType::AwaitingPayment && *to == BidStatusType::Cancelled)
        .times(1)
        .returning(|id, _, to| Ok(test_bid(id, 5, to)));
    let mut processor = MockProcessor::new();
    processor.expect_cancel_authorization().withf(|intent| intent == "pi_4").times(1).returning(|_| Ok(()));
    let req = TestRequest::post().uri("/bids/4/cancel");
    let (status, body) = send_api_request(req, &user_token(), flow(db, processor)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let bid: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(bid["status"], "cancelled");
}

#[actix_web::test]
async fn cancel_paid_bid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_bid().returning(|id| Ok(Some(test_bid(id, 5, BidStatusType::Pending))));
    db.expect_update_bid_status().never();
    let mut processor = MockProcessor::new();
    processor.expect_cancel_authorization().never();
    let req = TestRequest::post().uri("/bids/4/cancel");
    let (status, body) = send_api_request(req, &user_token(), flow(db, processor)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Cannot change bid status from pending to cancelled"), "was: {body}");
}

#[actix_web::test]
async fn cancel_races_the_processor_notification() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    let reads = AtomicUsize::new(0);
    // The second read sees the status written by the processor's cancellation notice
    db.expect_fetch_bid().times(2).returning(move |id| {
        let status = match reads.fetch_add(1, Ordering::SeqCst) {
            0 => BidStatusType::AwaitingPayment,
            _ => BidStatusType::Cancelled,
        };
        Ok(Some(test_bid(id, 5, status)))
    });
    db.expect_update_bid_status().times(1).returning(|id, expected, _| {
        Err(BidGatewayError::ConcurrentModification { bid_id: id, expected })
    });
    let mut processor = MockProcessor::new();
    processor.expect_cancel_authorization().times(1).returning(|_| Ok(()));
    let req = TestRequest::post().uri("/bids/4/cancel");
    let (status, body) = send_api_request(req, &user_token(), flow(db, processor)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let bid: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(bid["status"], "cancelled");
}

#[actix_web::test]
async fn cancel_loses_the_race_to_a_payment() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    let reads = AtomicUsize::new(0);
    db.expect_fetch_bid().times(2).returning(move |id| {
        let status = match reads.fetch_add(1, Ordering::SeqCst) {
            0 => BidStatusType::AwaitingPayment,
            _ => BidStatusType::Pending,
        };
        Ok(Some(test_bid(id, 5, status)))
    });
    db.expect_update_bid_status().times(1).returning(|id, expected, _| {
        Err(BidGatewayError::ConcurrentModification { bid_id: id, expected })
    });
    let mut processor = MockProcessor::new();
    processor.expect_cancel_authorization().times(1).returning(|_| Ok(()));
    let req = TestRequest::post().uri("/bids/4/cancel");
    let (status, _) = send_api_request(req, &user_token(), flow(db, processor)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn retry_failed_payment() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_bid().returning(|id| Ok(Some(test_bid(id, 5, BidStatusType::PaymentFailed))));
    db.expect_attach_payment_authorization()
        .withf(|id, expected, intent| *id == 6 && *expected == BidStatusType::PaymentFailed && intent == "pi_6b")
        .returning(|id, _, intent| {
            let mut bid = test_bid(id, 5, BidStatusType::AwaitingPayment);
            bid.payment_intent_id = Some(intent.to_string());
            Ok(bid)
        });
    let mut processor = MockProcessor::new();
    processor.expect_cancel_authorization().withf(|intent| intent == "pi_6").times(1).returning(|_| Ok(()));
    processor.expect_create_authorization().times(1).returning(|req| {
        Ok(PaymentAuthorization {
            payment_intent_id: "pi_6b".into(),
            client_secret: "pi_6b_secret".into(),
            amount: req.amount,
            currency: req.currency,
        })
    });
    let req = TestRequest::post().uri("/bids/6/retry_payment");
    let (status, body) = send_api_request(req, &user_token(), flow(db, processor)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let retry: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(retry["client_secret"], "pi_6b_secret");
    assert_eq!(retry["bid"]["payment_intent_id"], "pi_6b");
}

#[actix_web::test]
async fn search_bids_as_normal_user() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_search_bids().never();
    let req = TestRequest::get().uri("/search/bids?status=pending");
    let (status, body) = send_api_request(req, &user_token(), reads(db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Insufficient Permissions. Insufficient permissions.");
}

#[actix_web::test]
async fn search_bids_as_admin() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_search_bids()
        .withf(|q| {
            q.lot_number.as_deref() == Some("LOT-007") &&
                q.statuses == Some(vec![BidStatusType::Pending, BidStatusType::Winning]) &&
                q.user_id.is_none()
        })
        .times(1)
        .returning(|_| Ok(vec![test_bid(7, 5, BidStatusType::Winning)]));
    let req = TestRequest::get().uri("/search/bids?lot_number=LOT-007&status=pending,winning");
    let (status, body) = send_api_request(req, &admin_token(), reads(db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let bids: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(bids.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn search_bids_in_a_date_range() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_search_bids()
        .withf(|q| {
            q.since == Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()) &&
                q.until == Some(Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap()) &&
                q.statuses.is_none()
        })
        .times(1)
        .returning(|_| Ok(vec![test_bid(7, 5, BidStatusType::Pending)]));
    let req = TestRequest::get().uri("/search/bids?since=2024-05-01T00:00:00Z&until=2024-05-31T23:59:59Z");
    let (status, body) = send_api_request(req, &admin_token(), reads(db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[actix_web::test]
async fn search_bids_with_unreadable_date() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_search_bids().never();
    let req = TestRequest::get().uri("/search/bids?since=last-tuesday");
    let (status, _) = send_api_request(req, &admin_token(), reads(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn search_bids_with_invalid_status() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_search_bids().never();
    let req = TestRequest::get().uri("/search/bids?status=paid");
    let (status, _) = send_api_request(req, &admin_token(), reads(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn admin_records_auction_result() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_bid().returning(|id| Ok(Some(test_bid(id, 5, BidStatusType::Pending))));
    db.expect_update_bid_status()
        .withf(|id, from, to| *id == 8 && *from == BidStatusType::Pending && *to == BidStatusType::Winning)
        .times(1)
        .returning(|id, _, to| Ok(test_bid(id, 5, to)));
    let req = TestRequest::patch()
        .uri("/bids/8/status")
        .set_json(json!({"status": "winning", "reason": "Auction house update"}));
    let (status, body) = send_api_request(req, &admin_token(), admin(db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let bid: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(bid["status"], "winning");
}

#[actix_web::test]
async fn admin_cannot_mark_bids_as_paid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_bid().returning(|id| Ok(Some(test_bid(id, 5, BidStatusType::AwaitingPayment))));
    db.expect_update_bid_status().never();
    let req = TestRequest::patch().uri("/bids/8/status").set_json(json!({"status": "pending", "reason": "Paid cash"}));
    let (status, _) = send_api_request(req, &admin_token(), admin(db)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn status_change_on_missing_bid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_bid().returning(|_| Ok(None));
    let req = TestRequest::patch().uri("/bids/404/status").set_json(json!({"status": "won", "reason": "Hammer"}));
    let (status, _) = send_api_request(req, &admin_token(), admin(db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn normal_users_cannot_change_status() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::patch().uri("/bids/8/status").set_json(json!({"status": "won", "reason": "I won"}));
    let (status, _) = send_api_request(req, &user_token(), admin(MockBidStore::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn payment_events_for_bid() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBidStore::new();
    db.expect_fetch_payment_events_for_bid()
        .withf(|id| *id == 9)
        .returning(|_| Err(BidGatewayError::DatabaseError("disk I/O error".into())));
    let req = TestRequest::get().uri("/bids/9/payment_events");
    let (status, _) = send_api_request(req, &admin_token(), reads(db)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

fn flow(db: MockBidStore, processor: MockProcessor) -> impl FnOnce(&mut ServiceConfig) {
    configure(db, MockBidStore::new(), MockBidStore::new(), processor)
}

fn reads(db: MockBidStore) -> impl FnOnce(&mut ServiceConfig) {
    configure(MockBidStore::new(), db, MockBidStore::new(), MockProcessor::new())
}

fn admin(db: MockBidStore) -> impl FnOnce(&mut ServiceConfig) {
    configure(MockBidStore::new(), MockBidStore::new(), db, MockProcessor::new())
}

// Each API gets its own store. Only the one behind the route under test carries expectations.
fn configure(
    flow_db: MockBidStore,
    bids_db: MockBidStore,
    reconciliation_db: MockBidStore,
    processor: MockProcessor,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let bid_flow_api = BidFlowApi::new(flow_db, processor, FeeSchedule::default(), EventProducers::default());
        let bids_api = BidsApi::new(bids_db);
        let reconciliation_api = ReconciliationApi::new(reconciliation_db, EventProducers::default());
        cfg.app_data(web::Data::new(bid_flow_api))
            .app_data(web::Data::new(bids_api))
            .app_data(web::Data::new(reconciliation_api))
            .service(QuoteRoute::<MockBidStore, MockProcessor>::new())
            .service(PlaceBidRoute::<MockBidStore, MockProcessor>::new())
            .service(MyBidsRoute::<MockBidStore>::new())
            .service(MyBidRoute::<MockBidStore>::new())
            .service(RetryPaymentRoute::<MockBidStore, MockProcessor>::new())
            .service(CancelBidRoute::<MockBidStore, MockProcessor>::new())
            .service(SearchBidsRoute::<MockBidStore>::new())
            .service(UpdateBidStatusRoute::<MockBidStore>::new())
            .service(BidPaymentEventsRoute::<MockBidStore>::new());
    }
}
