use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid signature header: {0}")]
    InvalidSignatureHeader(String),
    #[error("No signature in the header matches the payload")]
    SignatureMismatch,
    #[error("Webhook timestamp is {age}s old, which is outside the tolerance of {tolerance}s")]
    TimestampOutsideTolerance { age: i64, tolerance: u64 },
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}
