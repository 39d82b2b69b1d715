use crate::{
    bpe_api::bid_objects::BidQueryFilter,
    db_types::{Bid, PaymentEventRecord},
    traits::BidGatewayError,
};

/// Read-only queries over bids and the payment event ledger.
#[allow(async_fn_in_trait)]
pub trait BidManagement {
    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, BidGatewayError>;

    async fn fetch_bid_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Bid>, BidGatewayError>;

    /// All bids for the user, newest first.
    async fn fetch_bids_for_user(&self, user_id: i64) -> Result<Vec<Bid>, BidGatewayError>;

    async fn search_bids(&self, query: BidQueryFilter) -> Result<Vec<Bid>, BidGatewayError>;

    /// The processor notifications that were matched to the given bid, in the order they were received.
    async fn fetch_payment_events_for_bid(&self, bid_id: i64) -> Result<Vec<PaymentEventRecord>, BidGatewayError>;
}
