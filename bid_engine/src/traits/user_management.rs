use thiserror::Error;

use crate::db_types::{NewUser, User};

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("A user with email {0} already exists")]
    UserAlreadyExists(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("User #{0} does not exist")]
    UserNotFound(i64),
    #[error("Invalid registration details: {0}")]
    InvalidRegistration(String),
    #[error("Could not hash password: {0}")]
    PasswordHashError(String),
}

impl From<sqlx::Error> for AuthApiError {
    fn from(e: sqlx::Error) -> Self {
        AuthApiError::DatabaseError(e.to_string())
    }
}

/// Storage for registered users. Password hashing happens before anything reaches the backend.
#[allow(async_fn_in_trait)]
pub trait UserManagement {
    /// Stores a new user. If the email is already taken, [`AuthApiError::UserAlreadyExists`] is returned.
    async fn insert_user(&self, user: NewUser) -> Result<User, AuthApiError>;

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, AuthApiError>;

    async fn fetch_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthApiError>;
}
