use serde::{Deserialize, Serialize};

use crate::db_types::{Bid, BidStatusType};

/// Fired whenever a bid becomes paid, i.e. it moves into `Pending` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidPaidEvent {
    pub bid: Bid,
}

impl BidPaidEvent {
    pub fn new(bid: Bid) -> Self {
        Self { bid }
    }
}

/// Fired on every status change, whether it was caused by the processor, the user, an admin or the expiry worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidStatusChangedEvent {
    pub old_status: BidStatusType,
    pub bid: Bid,
}

impl BidStatusChangedEvent {
    pub fn new(old_status: BidStatusType, bid: Bid) -> Self {
        Self { old_status, bid }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    BidPaid(BidPaidEvent),
    BidStatusChanged(BidStatusChangedEvent),
}
