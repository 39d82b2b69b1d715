//! Registration and password checks for the web-auth layer.
use std::fmt::Debug;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use log::*;

use crate::{
    db_types::{NewUser, User},
    traits::{AuthApiError, UserManagement},
};

pub const MAX_NAME_LENGTH: usize = 100;

pub struct AuthApi<B> {
    db: B,
}

impl<B: Debug> Debug for AuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthApi ({:?})", self.db)
    }
}

impl<B> AuthApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AuthApi<B>
where B: UserManagement
{
    /// Registers a new user. The email address is trimmed and lower-cased before it is stored.
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<User, AuthApiError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AuthApiError::InvalidRegistration("A valid email address is required".into()));
        }
        if password.is_empty() {
            return Err(AuthApiError::InvalidRegistration("A password is required".into()));
        }
        let name = name.trim();
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(AuthApiError::InvalidRegistration(format!(
                "Names may not be longer than {MAX_NAME_LENGTH} characters"
            )));
        }
        if self.db.fetch_user_by_email(&email).await?.is_some() {
            return Err(AuthApiError::UserAlreadyExists(email));
        }
        let password_hash = hash_password(password)?;
        let user = self.db.insert_user(NewUser { email, name: name.to_string(), password_hash }).await?;
        info!("🔑️ New user #{} registered", user.id);
        Ok(user)
    }

    /// Checks the credentials. An unknown email and a wrong password produce the same error.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthApiError> {
        let email = normalize_email(email);
        let user = self.db.fetch_user_by_email(&email).await?.ok_or_else(|| {
            debug!("🔑️ Login attempt for unknown user");
            AuthApiError::InvalidCredentials
        })?;
        if !verify_password(password, &user.password_hash) {
            debug!("🔑️ Bad password for user #{}", user.id);
            return Err(AuthApiError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn user_by_id(&self, user_id: i64) -> Result<User, AuthApiError> {
        self.db.fetch_user_by_id(user_id).await?.ok_or(AuthApiError::UserNotFound(user_id))
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> Result<String, AuthApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthApiError::PasswordHashError(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            warn!("🔑️ Stored password hash could not be parsed: {e}");
            false
        },
    }
}
