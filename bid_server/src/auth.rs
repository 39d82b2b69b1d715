//! Access tokens.
//!
//! After registering or logging in, users receive a HS256-signed JWT. The token is presented on every `/api` request
//! in either the `Authorization: Bearer <token>` header or the `pbs_access_token` header. The [`JwtMiddlewareFactory`]
//! checks it and stores the [`JwtClaims`] in the request extensions, from where handlers pick them up as an extractor.
//!
//! [`JwtMiddlewareFactory`]: crate::middleware::JwtMiddlewareFactory
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpMessage, HttpRequest};
use bid_engine::db_types::{Role, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const ACCESS_TOKEN_HEADER: &str = "pbs_access_token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id
    pub sub: i64,
    pub email: String,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
}

impl JwtClaims {
    pub fn user_id(&self) -> i64 {
        self.sub
    }

    pub fn has_roles(&self, roles: &[Role]) -> bool {
        roles.iter().all(|r| self.roles.contains(r))
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            warn!("🔑️ No JWT claims found in request extensions. Is the route behind the JWT middleware?");
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

/// Every user gets the `User` role. Users whose email is in the configured admin list are admins as well.
pub fn roles_for(email: &str, admin_emails: &[String]) -> Vec<Role> {
    let email = email.trim().to_lowercase();
    if admin_emails.iter().any(|a| *a == email) {
        vec![Role::User, Role::Admin]
    } else {
        vec![Role::User]
    }
}

/// Pulls the raw access token from the request headers, preferring the `Authorization` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(|t| t.trim().to_string());
    bearer.or_else(|| headers.get(ACCESS_TOKEN_HEADER).and_then(|v| v.to_str().ok()).map(|t| t.trim().to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    lifetime: Duration,
    admin_emails: Vec<String>,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { encoding_key, lifetime: config.token_lifetime, admin_emails: config.admin_emails.clone() }
    }

    /// Issue a new access token for the given user.
    /// This method DOES NOT check the user's credentials. This must be done prior to calling `issue_token`.
    pub fn issue_token(&self, user: &User) -> Result<AccessToken, AuthError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user.id,
            email: user.email.clone(),
            roles: roles_for(&user.email, &self.admin_emails),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenIssueError(e.to_string()))?;
        trace!("🔑️ Issued access token for user #{} with roles {:?}", user.id, claims.roles);
        Ok(AccessToken { access_token, token_type: "Bearer".to_string(), expires_in: self.lifetime.num_seconds() })
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Self { decoding_key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    AuthError::PoorlyFormattedToken(e.to_string())
                },
                _ => AuthError::ValidationError(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }
}
