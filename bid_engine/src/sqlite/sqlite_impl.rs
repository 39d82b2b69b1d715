//! `SqliteDatabase` is a concrete implementation of a bid engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::{fmt::Debug, time::Duration};

use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{bids, db_url, new_pool, payment_events, users};
use crate::{
    bpe_api::{
        bid_objects::BidQueryFilter,
        bid_state::{reconcile, ReconciliationDecision},
    },
    db_types::{Bid, BidStatusType, NewBid, NewUser, PaymentEventRecord, PaymentNotification, User},
    traits::{
        AuthApiError,
        BidGatewayDatabase,
        BidGatewayError,
        BidManagement,
        ReconciliationOutcome,
        UserManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl BidGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_bid(&self, bid: NewBid) -> Result<Bid, BidGatewayError> {
        let mut conn = self.pool.acquire().await?;
        bids::insert_bid(bid, &mut conn).await
    }

    async fn attach_payment_authorization(
        &self,
        bid_id: i64,
        expected: BidStatusType,
        payment_intent_id: &str,
    ) -> Result<Bid, BidGatewayError> {
        let mut conn = self.pool.acquire().await?;
        bids::attach_payment_intent(bid_id, expected, payment_intent_id, &mut conn).await
    }

    async fn update_bid_status(
        &self,
        bid_id: i64,
        expected: BidStatusType,
        new_status: BidStatusType,
    ) -> Result<Bid, BidGatewayError> {
        let mut conn = self.pool.acquire().await?;
        bids::update_bid_status(bid_id, expected, new_status, None, &mut conn).await
    }

    async fn process_payment_notification(
        &self,
        notification: PaymentNotification,
    ) -> Result<ReconciliationOutcome, BidGatewayError> {
        let mut tx = self.pool.begin().await?;
        if !payment_events::record_event(&notification, &mut tx).await? {
            debug!("🗃️ Payment event {} has been seen before. Skipping.", notification.event_id);
            return Ok(ReconciliationOutcome::Duplicate { event_id: notification.event_id });
        }
        let bid = match bids::fetch_bid_by_payment_intent(&notification.payment_intent_id, &mut tx).await? {
            Some(bid) => Some(bid),
            None => match notification.bid_id {
                Some(bid_id) => bids::fetch_bid(bid_id, &mut tx).await?,
                None => None,
            },
        };
        let outcome = match bid {
            None => {
                warn!(
                    "🗃️ Payment event {} for intent {} does not match any bid",
                    notification.event_id, notification.payment_intent_id
                );
                ReconciliationOutcome::UnknownBid
            },
            Some(bid) => match reconcile(&bid, &notification) {
                ReconciliationDecision::Transition { new_status, adopt_intent } => {
                    let intent = adopt_intent.then_some(notification.payment_intent_id.as_str());
                    let updated = bids::update_bid_status(bid.id, bid.status, new_status, intent, &mut tx).await?;
                    ReconciliationOutcome::Applied { bid: updated, old_status: bid.status }
                },
                ReconciliationDecision::Ignore(reason) => ReconciliationOutcome::Ignored { bid_id: bid.id, reason },
                ReconciliationDecision::Reject(reason) => ReconciliationOutcome::Rejected { bid_id: bid.id, reason },
            },
        };
        payment_events::set_outcome(&notification.event_id, outcome.bid_id(), outcome.label(), &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Payment event {} committed with outcome {}", notification.event_id, outcome.label());
        Ok(outcome)
    }

    async fn fetch_abandoned_bids(&self, older_than: Duration) -> Result<Vec<Bid>, BidGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let bids = bids::fetch_abandoned_bids(older_than, &mut conn).await?;
        Ok(bids)
    }

    async fn close(&mut self) -> Result<(), BidGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl BidManagement for SqliteDatabase {
    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, BidGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let bid = bids::fetch_bid(bid_id, &mut conn).await?;
        Ok(bid)
    }

    async fn fetch_bid_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Bid>, BidGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let bid = bids::fetch_bid_by_payment_intent(payment_intent_id, &mut conn).await?;
        Ok(bid)
    }

    async fn fetch_bids_for_user(&self, user_id: i64) -> Result<Vec<Bid>, BidGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let bids = bids::fetch_bids_for_user(user_id, &mut conn).await?;
        Ok(bids)
    }

    async fn search_bids(&self, query: BidQueryFilter) -> Result<Vec<Bid>, BidGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let bids = bids::search_bids(query, &mut conn).await?;
        Ok(bids)
    }

    async fn fetch_payment_events_for_bid(&self, bid_id: i64) -> Result<Vec<PaymentEventRecord>, BidGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let events = payment_events::fetch_events_for_bid(bid_id, &mut conn).await?;
        Ok(events)
    }
}

impl UserManagement for SqliteDatabase {
    async fn insert_user(&self, user: NewUser) -> Result<User, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(user, &mut conn).await
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_email(email, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_id(user_id, &mut conn).await?;
        Ok(user)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
