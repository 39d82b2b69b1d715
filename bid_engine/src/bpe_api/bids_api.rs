//! Read-only access to bids.
use std::fmt::Debug;

use log::trace;

use crate::{
    bpe_api::bid_objects::BidQueryFilter,
    db_types::{Bid, PaymentEventRecord},
    traits::{BidGatewayError, BidManagement},
};

pub struct BidsApi<B> {
    db: B,
}

impl<B: Debug> Debug for BidsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BidsApi ({:?})", self.db)
    }
}

impl<B> BidsApi<B>
where B: BidManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// The user's bids, newest first.
    pub async fn bids_for_user(&self, user_id: i64) -> Result<Vec<Bid>, BidGatewayError> {
        self.db.fetch_bids_for_user(user_id).await
    }

    /// Fetches a bid, but only if it belongs to `user_id`. Someone else's bid looks exactly like a missing one.
    pub async fn bid_for_user(&self, user_id: i64, bid_id: i64) -> Result<Option<Bid>, BidGatewayError> {
        let bid = self.db.fetch_bid(bid_id).await?;
        Ok(bid.filter(|b| b.user_id == user_id))
    }

    pub async fn bid_by_id(&self, bid_id: i64) -> Result<Option<Bid>, BidGatewayError> {
        self.db.fetch_bid(bid_id).await
    }

    pub async fn search_bids(&self, query: BidQueryFilter) -> Result<Vec<Bid>, BidGatewayError> {
        trace!("🔄️🔍️ Searching bids. {query}");
        self.db.search_bids(query).await
    }

    pub async fn payment_events_for_bid(&self, bid_id: i64) -> Result<Vec<PaymentEventRecord>, BidGatewayError> {
        self.db.fetch_payment_events_for_bid(bid_id).await
    }
}
