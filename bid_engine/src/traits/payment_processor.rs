use pbs_common::Cents;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PaymentProcessorError {
    #[error("Could not communicate with the payment processor: {0}")]
    Unavailable(String),
    #[error("The payment processor rejected the request: {0}")]
    Rejected(String),
}

/// Everything the processor needs to create a payment authorization for a bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub bid_id: i64,
    pub user_id: i64,
    pub lot_number: String,
    pub amount: Cents,
    pub currency: String,
}

/// A live payment authorization (a payment intent, in Stripe's language).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    pub payment_intent_id: String,
    /// Handed to the browser so that it can confirm the payment directly with the processor.
    pub client_secret: String,
    pub amount: Cents,
    pub currency: String,
}

/// The contract the bid engine expects from a third-party payment processor.
///
/// Confirmation of payments is asynchronous, and arrives as [`crate::db_types::PaymentNotification`]s that are fed
/// into [`crate::ReconciliationApi`].
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    async fn create_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> Result<PaymentAuthorization, PaymentProcessorError>;

    async fn cancel_authorization(&self, payment_intent_id: &str) -> Result<(), PaymentProcessorError>;
}
