use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{PaymentEventRecord, PaymentNotification};

/// Adds the notification to the ledger. Returns `false` if an event with the same id has been recorded before.
///
/// The bid id in the notification metadata is unverified, so the row is not linked to a bid until
/// [`set_outcome`] records the bid it was matched to.
pub async fn record_event(notification: &PaymentNotification, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO payment_events (event_id, event_type, payment_intent_id, amount, currency)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(&notification.event_id)
    .bind(notification.kind.to_string())
    .bind(&notification.payment_intent_id)
    .bind(notification.amount)
    .bind(&notification.currency)
    .execute(conn)
    .await?;
    let inserted = result.rows_affected() == 1;
    if inserted {
        debug!("🗃️ Payment event {} recorded", notification.event_id);
    }
    Ok(inserted)
}

/// Stores the result of reconciling the event, along with the bid it was matched to (if any).
pub async fn set_outcome(
    event_id: &str,
    bid_id: Option<i64>,
    outcome: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_events SET outcome = $1, bid_id = $2 WHERE event_id = $3")
        .bind(outcome)
        .bind(bid_id)
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_events_for_bid(
    bid_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentEventRecord>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM payment_events WHERE bid_id = $1 ORDER BY id ASC")
        .bind(bid_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
