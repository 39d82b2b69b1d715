//! The `BidGatewayDatabase` trait defines the write side of the bid engine backend.
//!
//! The contract every implementation must honour:
//! * Status changes are compare-and-set. The caller passes the status it last saw, and if the row has moved on in the
//!   meantime, [`BidGatewayError::ConcurrentModification`] is returned and nothing is written.
//! * Processor notifications are processed at most once. The event id is recorded in the payment event ledger in the
//!   same transaction as any status change and intent adoption that results from it.
use std::time::Duration;

use thiserror::Error;

use crate::{
    db_types::{Bid, BidStatusType, NewBid, PaymentNotification},
    traits::{data_objects::ReconciliationOutcome, BidManagement, PaymentProcessorError},
};

#[allow(async_fn_in_trait)]
pub trait BidGatewayDatabase: Clone + BidManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new bid with status `New`. No payment authorization exists for it yet.
    async fn insert_bid(&self, bid: NewBid) -> Result<Bid, BidGatewayError>;

    /// Records the processor's payment intent id against the bid and moves it to `AwaitingPayment`.
    ///
    /// The update only succeeds if the bid is still in the `expected` status.
    async fn attach_payment_authorization(
        &self,
        bid_id: i64,
        expected: BidStatusType,
        payment_intent_id: &str,
    ) -> Result<Bid, BidGatewayError>;

    /// Moves the bid from `expected` to `new_status`. No transition rules are checked here; that is the caller's job.
    async fn update_bid_status(
        &self,
        bid_id: i64,
        expected: BidStatusType,
        new_status: BidStatusType,
    ) -> Result<Bid, BidGatewayError>;

    /// Applies a processor notification in a single atomic transaction:
    /// * The event is recorded in the ledger. If it is already there, [`ReconciliationOutcome::Duplicate`] is returned.
    /// * The matching bid is found by payment intent id, falling back to the bid id in the intent metadata.
    /// * The reconciliation rules decide what happens to the bid, and any status change is written with a
    ///   compare-and-set.
    ///
    /// If the compare-and-set fails, the whole transaction is rolled back (so the event is not recorded) and
    /// [`BidGatewayError::ConcurrentModification`] is returned. Redelivery of the event will then be processed afresh.
    async fn process_payment_notification(
        &self,
        notification: PaymentNotification,
    ) -> Result<ReconciliationOutcome, BidGatewayError>;

    /// Bids in `New` or `AwaitingPayment` status that have not been updated for at least `older_than`.
    async fn fetch_abandoned_bids(&self, older_than: Duration) -> Result<Vec<Bid>, BidGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), BidGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum BidGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested bid #{0} does not exist")]
    BidNotFound(i64),
    #[error("Invalid bid. {0}")]
    InvalidBid(String),
    #[error("Cannot change bid status from {from} to {to}")]
    BidStatusTransitionForbidden { from: BidStatusType, to: BidStatusType },
    #[error("The requested bid change would result in a no-op.")]
    BidModificationNoOp,
    #[error("Bid #{bid_id} was modified by someone else. It is no longer in {expected} status.")]
    ConcurrentModification { bid_id: i64, expected: BidStatusType },
    #[error("Could not create a payment authorization for bid #{bid_id}. {reason}")]
    PaymentAuthorizationFailed { bid_id: i64, reason: String },
    #[error("{0}")]
    ProcessorError(#[from] PaymentProcessorError),
}

impl From<sqlx::Error> for BidGatewayError {
    fn from(e: sqlx::Error) -> Self {
        BidGatewayError::DatabaseError(e.to_string())
    }
}
