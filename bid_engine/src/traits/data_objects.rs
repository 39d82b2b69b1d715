use serde::Serialize;

use crate::{
    bpe_api::bid_state::{IgnoreReason, RejectReason},
    db_types::{Bid, BidStatusType},
};

/// The result of feeding a processor notification through reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReconciliationOutcome {
    /// The bid changed status.
    Applied { bid: Bid, old_status: BidStatusType },
    /// The notification was valid but did not change anything.
    Ignored { bid_id: i64, reason: IgnoreReason },
    /// The notification conflicts with the bid record and needs a human to look at it.
    Rejected { bid_id: i64, reason: RejectReason },
    /// No bid matches the notification's payment intent or metadata.
    UnknownBid,
    /// The event has been processed before.
    Duplicate { event_id: String },
}

impl ReconciliationOutcome {
    /// A short label, stored in the `outcome` column of the payment event ledger.
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationOutcome::Applied { .. } => "applied",
            ReconciliationOutcome::Ignored { .. } => "ignored",
            ReconciliationOutcome::Rejected { .. } => "rejected",
            ReconciliationOutcome::UnknownBid => "unknown_bid",
            ReconciliationOutcome::Duplicate { .. } => "duplicate",
        }
    }

    /// The bid the notification was matched to, if any.
    pub fn bid_id(&self) -> Option<i64> {
        match self {
            ReconciliationOutcome::Applied { bid, .. } => Some(bid.id),
            ReconciliationOutcome::Ignored { bid_id, .. } | ReconciliationOutcome::Rejected { bid_id, .. } => {
                Some(*bid_id)
            },
            ReconciliationOutcome::UnknownBid | ReconciliationOutcome::Duplicate { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ReconciliationOutcome::Applied { bid, old_status } => {
                format!("Bid #{} moved from {old_status} to {}", bid.id, bid.status)
            },
            ReconciliationOutcome::Ignored { bid_id, reason } => format!("Bid #{bid_id} unchanged: {reason}"),
            ReconciliationOutcome::Rejected { bid_id, reason } => format!("Bid #{bid_id} needs attention: {reason}"),
            ReconciliationOutcome::UnknownBid => "No bid matches this payment".to_string(),
            ReconciliationOutcome::Duplicate { event_id } => format!("Event {event_id} has already been processed"),
        }
    }
}

/// The bids that the expiry worker cancelled, and the ones it had to skip.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpiryResult {
    pub cancelled: Vec<Bid>,
    pub skipped: Vec<i64>,
}

impl ExpiryResult {
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty() && self.skipped.is_empty()
    }
}
