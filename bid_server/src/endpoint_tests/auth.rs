use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use bid_engine::{
    bpe_api::auth_api::hash_password,
    db_types::{Role, User},
    traits::AuthApiError,
    AuthApi,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use super::{helpers::*, mocks::MockUserManager};
use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::AuthConfig,
    routes::{LoginRoute, MeRoute, RegisterRoute},
};

#[actix_web::test]
async fn register_new_account() {
    let _ = env_logger::try_init().ok();
    let mut users = MockUserManager::new();
    users.expect_fetch_user_by_email().withf(|email| email == "alice@example.com").returning(|_| Ok(None));
    users.expect_insert_user().times(1).returning(|u| {
        assert!(u.password_hash.starts_with("$argon2"));
        Ok(User { password_hash: u.password_hash, name: u.name, ..test_user(7, &u.email) })
    });
    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": " Alice@Example.com", "password": "hunter2", "name": "Alice"}));
    let (status, body) = send_request(req, configure(users)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["user"]["id"], 7);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["name"], "Alice");
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    let claims = TokenVerifier::new(&get_auth_config()).verify(body["access_token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, 7);
    assert_eq!(claims.roles, vec![Role::User]);
}

#[actix_web::test]
async fn register_existing_account() {
    let _ = env_logger::try_init().ok();
    let mut users = MockUserManager::new();
    users.expect_fetch_user_by_email().returning(|email| Ok(Some(test_user(3, email))));
    users.expect_insert_user().never();
    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": "alice@example.com", "password": "hunter2", "name": "Alice"}));
    let (status, body) = send_request(req, configure(users)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"An account with this email already exists."}"#);
}

#[actix_web::test]
async fn register_with_invalid_email() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": "alice", "password": "hunter2", "name": "Alice"}));
    let (status, body) = send_request(req, configure(MockUserManager::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("A valid email address is required"), "was: {body}");
}

#[actix_web::test]
async fn register_with_missing_fields() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/auth/register").set_json(json!({"email": "alice@example.com"}));
    let (status, _) = send_request(req, configure(MockUserManager::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn admins_get_the_admin_role_on_login() {
    let _ = env_logger::try_init().ok();
    let (status, body) = login(ADMIN_EMAIL, "hunter2", Ok(Some(stored_user(1, ADMIN_EMAIL, "hunter2")))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["user"]["id"], 1);
    let claims = TokenVerifier::new(&get_auth_config()).verify(body["access_token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, 1);
    assert!(claims.has_roles(&[Role::User, Role::Admin]));
    let expiry = claims.exp - Utc::now().timestamp();
    assert!((3590..=3600).contains(&expiry), "Expiry: {expiry}");
}

#[actix_web::test]
async fn login_with_wrong_password() {
    let _ = env_logger::try_init().ok();
    let (status, body) = login(USER_EMAIL, "hunter3", Ok(Some(stored_user(5, USER_EMAIL, "hunter2")))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. Invalid email or password."}"#);
}

#[actix_web::test]
async fn login_with_unknown_account() {
    let _ = env_logger::try_init().ok();
    let (status, body) = login("nobody@example.com", "hunter2", Ok(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // Unknown accounts and bad passwords are indistinguishable
    assert_eq!(body, r#"{"error":"Authentication Error. Invalid email or password."}"#);
}

#[actix_web::test]
async fn login_when_the_database_is_down() {
    let _ = env_logger::try_init().ok();
    let (status, _) = login(USER_EMAIL, "hunter2", Err(AuthApiError::DatabaseError("locked".into()))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn me_without_token() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/me");
    let (status, body) = send_api_request(req, "", configure(MockUserManager::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Authentication Error. No access token was provided.");
}

#[actix_web::test]
async fn me_with_garbage_token() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/me");
    let (status, body) = send_api_request(req, "made up nonsense", configure(MockUserManager::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("Authentication Error. Access token is not in the correct format."), "was: {body}");
}

#[actix_web::test]
async fn me_with_expired_token() {
    let _ = env_logger::try_init().ok();
    let config = AuthConfig { token_lifetime: Duration::seconds(-60), ..get_auth_config() };
    let token = TokenIssuer::new(&config).issue_token(&test_user(5, USER_EMAIL)).unwrap().access_token;
    let req = TestRequest::get().uri("/me");
    let (status, body) = send_api_request(req, &token, configure(MockUserManager::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.starts_with("Authentication Error. Access token is invalid."), "was: {body}");
}

#[actix_web::test]
async fn me_with_tampered_token() {
    let _ = env_logger::try_init().ok();
    let mut token = user_token();
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    let req = TestRequest::get().uri("/me");
    let (status, _) = send_api_request(req, &token, configure(MockUserManager::new())).await;
    assert!(status.is_client_error());
}

#[actix_web::test]
async fn me_with_valid_token() {
    let _ = env_logger::try_init().ok();
    let mut users = MockUserManager::new();
    users.expect_fetch_user_by_id().withf(|id| *id == 5).returning(|id| Ok(Some(test_user(id, USER_EMAIL))));
    // The alternative header works too
    let req = TestRequest::get().uri("/me").insert_header(("pbs_access_token", user_token()));
    let (status, body) = send_api_request(req, "", configure(users)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["user"]["email"], USER_EMAIL);
    assert_eq!(body["roles"], json!(["user"]));
}

fn stored_user(id: i64, email: &str, password: &str) -> User {
    User { password_hash: hash_password(password).unwrap(), ..test_user(id, email) }
}

async fn login(
    email: &str,
    password: &str,
    stored: Result<Option<User>, AuthApiError>,
) -> (StatusCode, String) {
    let mut users = MockUserManager::new();
    users.expect_fetch_user_by_email().return_once(move |_| stored);
    let req = TestRequest::post().uri("/auth/login").set_json(json!({"email": email, "password": password}));
    send_request(req, configure(users)).await
}

fn configure(users: MockUserManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let auth_api = AuthApi::new(users);
        let jwt_signer = TokenIssuer::new(&get_auth_config());
        cfg.app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(jwt_signer))
            .service(RegisterRoute::<MockUserManager>::new())
            .service(LoginRoute::<MockUserManager>::new())
            .service(MeRoute::<MockUserManager>::new());
    }
}
