use actix_web::{http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use bid_engine::db_types::{Bid, BidStatusType, NewBid, User};
use chrono::{Duration, TimeZone, Utc};
use log::debug;
use pbs_common::{Cents, Secret};

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::AuthConfig,
    middleware::JwtMiddlewareFactory,
};

pub const USER_EMAIL: &str = "alice@example.com";
pub const ADMIN_EMAIL: &str = "boss@example.com";

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Secret::new("endpoint-tests-only-secret-0123456789abcdef".into()),
        token_lifetime: Duration::hours(1),
        admin_emails: vec![ADMIN_EMAIL.into()],
    }
}

pub fn test_user(id: i64, email: &str) -> User {
    User {
        id,
        email: email.into(),
        name: "Test User".into(),
        password_hash: String::default(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

pub fn issue_token(user: &User) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(user).expect("Failed to issue token").access_token
}

/// A token for user #5, who has no special privileges
pub fn user_token() -> String {
    issue_token(&test_user(5, USER_EMAIL))
}

/// A token for user #1, who is an admin
pub fn admin_token() -> String {
    issue_token(&test_user(1, ADMIN_EMAIL))
}

pub fn test_bid(id: i64, user_id: i64, status: BidStatusType) -> Bid {
    Bid {
        id,
        user_id,
        lot_number: format!("LOT-{id:03}"),
        max_bid: Cents::from(300_000),
        deposit_amount: Cents::from(30_000),
        service_fee: Cents::from(21_500),
        currency: "usd".into(),
        notes: None,
        status,
        payment_intent_id: (status != BidStatusType::New).then(|| format!("pi_{id}")),
        created_at: Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap(),
    }
}

/// What the database would hand back after inserting `bid`
pub fn bid_from_new(id: i64, bid: NewBid) -> Bid {
    Bid {
        id,
        user_id: bid.user_id,
        lot_number: bid.lot_number,
        max_bid: bid.quote.max_bid,
        deposit_amount: bid.quote.deposit_amount,
        service_fee: bid.quote.service_fee,
        currency: bid.quote.currency,
        notes: bid.notes,
        status: BidStatusType::New,
        payment_intent_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Sends `req` to an app configured with `configure`, without any authentication middleware.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = test::init_service(App::new().configure(configure)).await;
    debug!("Making request");
    call(&app, req).await
}

/// Sends `req` to an app configured with `configure` and wrapped in the JWT middleware, like the `/api` scope.
/// If `token` is not empty, it is sent as a bearer token.
pub async fn send_api_request<F>(req: TestRequest, token: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let req = if token.is_empty() { req } else { req.insert_header(("Authorization", format!("Bearer {token}"))) };
    let verifier = TokenVerifier::new(&get_auth_config());
    let app = test::init_service(App::new().wrap(JwtMiddlewareFactory::new(verifier)).configure(configure)).await;
    debug!("Making API request");
    call(&app, req).await
}

async fn call<S, B>(app: &S, req: TestRequest) -> (StatusCode, String)
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
{
    match test::try_call_service(app, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        // Errors raised by middleware never reach the response builder
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}
