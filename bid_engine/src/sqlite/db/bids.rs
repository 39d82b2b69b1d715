use std::time::Duration;

use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    bpe_api::bid_objects::BidQueryFilter,
    db_types::{Bid, BidStatusType, NewBid},
    traits::BidGatewayError,
};

/// Inserts a new bid with `New` status. The bid has no payment intent yet.
pub async fn insert_bid(bid: NewBid, conn: &mut SqliteConnection) -> Result<Bid, BidGatewayError> {
    let NewBid { user_id, lot_number, quote, notes } = bid;
    let bid: Bid = sqlx::query_as(
        r#"
            INSERT INTO bids (
                user_id,
                lot_number,
                max_bid,
                deposit_amount,
                service_fee,
                currency,
                notes,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(lot_number)
    .bind(quote.max_bid)
    .bind(quote.deposit_amount)
    .bind(quote.service_fee)
    .bind(quote.currency)
    .bind(notes)
    .bind(BidStatusType::New)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Bid #{} for lot {} inserted for user #{user_id}", bid.id, bid.lot_number);
    Ok(bid)
}

pub async fn fetch_bid(bid_id: i64, conn: &mut SqliteConnection) -> Result<Option<Bid>, sqlx::Error> {
    let bid = sqlx::query_as("SELECT * FROM bids WHERE id = $1").bind(bid_id).fetch_optional(conn).await?;
    Ok(bid)
}

pub async fn fetch_bid_by_payment_intent(
    payment_intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Bid>, sqlx::Error> {
    let bid = sqlx::query_as("SELECT * FROM bids WHERE payment_intent_id = $1")
        .bind(payment_intent_id)
        .fetch_optional(conn)
        .await?;
    Ok(bid)
}

/// Returns the user's bids, newest first.
pub async fn fetch_bids_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Bid>, sqlx::Error> {
    let bids = sqlx::query_as("SELECT * FROM bids WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(bids)
}

/// Fetches bids according to criteria specified in the `BidQueryFilter`
///
/// Resulting bids are ordered by `created_at`, newest first.
pub async fn search_bids(query: BidQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Bid>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM bids ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(lot_number) = query.lot_number {
        where_clause.push("lot_number = ");
        where_clause.push_bind_unseparated(lot_number);
    }
    if let Some(intent) = query.payment_intent_id {
        where_clause.push("payment_intent_id = ");
        where_clause.push_bind_unseparated(intent);
    }
    if let Some(statuses) = query.statuses.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        let mut first = true;
        for status in statuses {
            if !first {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
            first = false;
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= datetime(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= datetime(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at DESC, id DESC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let bids = builder.build_query_as::<Bid>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_bids: {}", bids.len());
    Ok(bids)
}

/// Compare-and-set status update. The row is only touched if it is still in the `expected` status.
///
/// If `adopt_intent` is given, it is recorded as the bid's payment intent, unless the bid already has one.
pub async fn update_bid_status(
    bid_id: i64,
    expected: BidStatusType,
    new_status: BidStatusType,
    adopt_intent: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Bid, BidGatewayError> {
    let result: Option<Bid> = sqlx::query_as(
        r#"
            UPDATE bids SET
                status = $1,
                payment_intent_id = COALESCE(payment_intent_id, $2),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(adopt_intent)
    .bind(bid_id)
    .bind(expected)
    .fetch_optional(&mut *conn)
    .await?;
    match result {
        Some(bid) => {
            debug!("🗃️ Bid #{bid_id} status changed from {expected} to {new_status}");
            Ok(bid)
        },
        None => Err(cas_failure(bid_id, expected, conn).await?),
    }
}

/// Replaces the bid's payment intent and moves it to `AwaitingPayment`, provided it is still in `expected` status.
pub async fn attach_payment_intent(
    bid_id: i64,
    expected: BidStatusType,
    payment_intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Bid, BidGatewayError> {
    let result: Option<Bid> = sqlx::query_as(
        r#"
            UPDATE bids SET
                status = $1,
                payment_intent_id = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(BidStatusType::AwaitingPayment)
    .bind(payment_intent_id)
    .bind(bid_id)
    .bind(expected)
    .fetch_optional(&mut *conn)
    .await?;
    match result {
        Some(bid) => {
            debug!("🗃️ Payment intent {payment_intent_id} attached to bid #{bid_id}");
            Ok(bid)
        },
        None => Err(cas_failure(bid_id, expected, conn).await?),
    }
}

/// Works out why a compare-and-set touched no rows.
async fn cas_failure(
    bid_id: i64,
    expected: BidStatusType,
    conn: &mut SqliteConnection,
) -> Result<BidGatewayError, sqlx::Error> {
    let err = match fetch_bid(bid_id, conn).await? {
        Some(bid) => {
            debug!("🗃️ Bid #{bid_id} is {} rather than {expected}. Not updating.", bid.status);
            BidGatewayError::ConcurrentModification { bid_id, expected }
        },
        None => BidGatewayError::BidNotFound(bid_id),
    };
    Ok(err)
}

/// Bids that have been waiting for payment for at least `older_than`.
pub async fn fetch_abandoned_bids(older_than: Duration, conn: &mut SqliteConnection) -> Result<Vec<Bid>, sqlx::Error> {
    let offset = format!("-{} seconds", older_than.as_secs());
    let bids = sqlx::query_as(
        r#"
            SELECT * FROM bids
            WHERE status IN ($1, $2) AND updated_at <= datetime('now', $3)
            ORDER BY id ASC
        "#,
    )
    .bind(BidStatusType::New)
    .bind(BidStatusType::AwaitingPayment)
    .bind(offset)
    .fetch_all(conn)
    .await?;
    Ok(bids)
}
