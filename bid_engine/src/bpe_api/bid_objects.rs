use std::fmt::Display;

use chrono::{DateTime, Utc};
use pbs_common::{Cents, MAX_DOLLARS};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Bid, BidStatusType, NewBid},
    fees::{BidQuote, FeeSchedule},
    traits::BidGatewayError,
};

pub const MAX_LOT_NUMBER_LENGTH: usize = 50;
pub const MAX_NOTES_LENGTH: usize = 1_000;

/// A bid as submitted by a user. The maximum bid is in whole currency units (dollars), as typed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRequest {
    pub lot_number: String,
    pub max_bid: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BidRequest {
    pub fn new(lot_number: impl Into<String>, max_bid: f64) -> Self {
        Self { lot_number: lot_number.into(), max_bid, notes: None }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the request and turns it into a [`NewBid`], priced according to `fees`.
    ///
    /// Blank notes are dropped.
    pub fn validate(self, user_id: i64, fees: &FeeSchedule) -> Result<NewBid, BidGatewayError> {
        let lot_number = self.lot_number.trim();
        if lot_number.is_empty() {
            return Err(BidGatewayError::InvalidBid("A lot number is required".into()));
        }
        if lot_number.chars().count() > MAX_LOT_NUMBER_LENGTH {
            return Err(BidGatewayError::InvalidBid(format!(
                "The lot number may not be longer than {MAX_LOT_NUMBER_LENGTH} characters"
            )));
        }
        if !self.max_bid.is_finite() || self.max_bid <= 0.0 || self.max_bid > MAX_DOLLARS {
            return Err(BidGatewayError::InvalidBid(format!(
                "The maximum bid must be greater than zero and no more than {MAX_DOLLARS}"
            )));
        }
        let max_bid = Cents::from_dollars(self.max_bid).map_err(|e| BidGatewayError::InvalidBid(e.to_string()))?;
        if !max_bid.is_positive() {
            return Err(BidGatewayError::InvalidBid("The maximum bid must be at least one cent".into()));
        }
        let notes = self.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if notes.as_ref().map(|n| n.chars().count() > MAX_NOTES_LENGTH).unwrap_or(false) {
            return Err(BidGatewayError::InvalidBid(format!(
                "Notes may not be longer than {MAX_NOTES_LENGTH} characters"
            )));
        }
        let mut bid = NewBid::new(user_id, lot_number, fees.quote(max_bid));
        bid.notes = notes;
        Ok(bid)
    }
}

/// A freshly placed bid, along with what the browser needs to complete the payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidPlacement {
    pub bid: Bid,
    pub client_secret: String,
    pub quote: BidQuote,
}

/// A new payment authorization for an existing bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRetry {
    pub bid: Bid,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BidQueryFilter {
    pub user_id: Option<i64>,
    pub lot_number: Option<String>,
    pub statuses: Option<Vec<BidStatusType>>,
    pub payment_intent_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl BidQueryFilter {
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_lot_number<S: Into<String>>(mut self, lot_number: S) -> Self {
        self.lot_number = Some(lot_number.into());
        self
    }

    pub fn with_status(mut self, status: BidStatusType) -> Self {
        self.statuses.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_payment_intent_id<S: Into<String>>(mut self, payment_intent_id: S) -> Self {
        self.payment_intent_id = Some(payment_intent_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() &&
            self.lot_number.is_none() &&
            self.statuses.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.payment_intent_id.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for BidQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(user_id) = &self.user_id {
            write!(f, "user_id: {user_id}. ")?;
        }
        if let Some(lot_number) = &self.lot_number {
            write!(f, "lot_number: {lot_number}. ")?;
        }
        if let Some(statuses) = &self.statuses {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: {statuses}. ")?;
        }
        if let Some(intent) = &self.payment_intent_id {
            write!(f, "payment_intent_id: {intent}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        Ok(())
    }
}
