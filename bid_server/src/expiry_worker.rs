use bid_engine::{db_types::Bid, BidFlowApi, SqliteDatabase};
use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::stripe::StripeProcessor;

const EXPIRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the abandoned bid worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Once a minute, bids that have been waiting for payment for longer than `unpaid_timeout` are cancelled, along with
/// their payment intents.
pub fn start_expiry_worker(api: BidFlowApi<SqliteDatabase, StripeProcessor>, unpaid_timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let timeout = match unpaid_timeout.to_std() {
            Ok(t) => t,
            Err(e) => {
                error!("🕰️ The unpaid bid timeout ({unpaid_timeout}) is invalid. {e}. The expiry worker will not run.");
                return;
            },
        };
        let mut timer = tokio::time::interval(EXPIRY_INTERVAL);
        info!("🕰️ Abandoned bid expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running abandoned bid expiry job");
            match api.expire_abandoned_bids(timeout).await {
                Ok(result) if result.is_empty() => trace!("🕰️ No abandoned bids"),
                Ok(result) => {
                    info!("🕰️ {} abandoned bids cancelled", result.cancelled.len());
                    debug!("🕰️ Cancelled bids: {}", bid_list(&result.cancelled));
                    if !result.skipped.is_empty() {
                        warn!(
                            "🕰️ {} bids could not be cancelled and will be tried again: {:?}",
                            result.skipped.len(),
                            result.skipped
                        );
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running abandoned bid expiry job: {e}");
                },
            }
        }
    })
}

fn bid_list(bids: &[Bid]) -> String {
    bids.iter()
        .map(|b| format!("[{}] lot: {} user: {}", b.id, b.lot_number, b.user_id))
        .collect::<Vec<String>>()
        .join(", ")
}
