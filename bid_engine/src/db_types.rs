use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::*;
use pbs_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::fees::BidQuote;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        Role       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------        User       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

//--------------------------------------   BidStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BidStatusType {
    /// The bid has been recorded, but no payment authorization exists for it yet.
    New,
    /// A payment authorization has been created and we are waiting for the processor to confirm it.
    AwaitingPayment,
    /// Deposit and service fee have been paid. The bid is ready to be placed at the auction.
    Pending,
    /// The bid is currently the highest bid on the lot.
    Winning,
    /// Someone else has outbid us on the lot.
    Outbid,
    /// The lot was won.
    Won,
    /// The lot was lost.
    Lost,
    /// The processor reported that the payment failed. The user may retry.
    PaymentFailed,
    /// The bid was cancelled by the user, an admin, the processor or the expiry worker.
    Cancelled,
}

impl BidStatusType {
    pub const ALL: [BidStatusType; 9] = [
        BidStatusType::New,
        BidStatusType::AwaitingPayment,
        BidStatusType::Pending,
        BidStatusType::Winning,
        BidStatusType::Outbid,
        BidStatusType::Won,
        BidStatusType::Lost,
        BidStatusType::PaymentFailed,
        BidStatusType::Cancelled,
    ];

    /// Statuses in which no payment has been captured yet.
    pub fn is_unpaid(&self) -> bool {
        matches!(self, Self::New | Self::AwaitingPayment | Self::PaymentFailed)
    }

    /// Statuses that can never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Pending => "pending",
            Self::Winning => "winning",
            Self::Outbid => "outbid",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::PaymentFailed => "payment_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for BidStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BidStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| ConversionError(format!("Invalid bid status: {s}")))
    }
}

impl From<String> for BidStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid bid status: {value}. But this conversion cannot fail. Defaulting to New");
            BidStatusType::New
        })
    }
}

//--------------------------------------        Bid       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub user_id: i64,
    pub lot_number: String,
    pub max_bid: Cents,
    pub deposit_amount: Cents,
    pub service_fee: Cents,
    pub currency: String,
    pub notes: Option<String>,
    pub status: BidStatusType,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    /// The amount the user is charged for this bid: deposit plus service fee.
    pub fn total_amount(&self) -> Cents {
        self.deposit_amount + self.service_fee
    }
}

//--------------------------------------        NewBid       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewBid {
    pub user_id: i64,
    /// The auction lot number, already trimmed
    pub lot_number: String,
    /// The fee quote for the bid. The max bid, deposit, fee and currency are all taken from here.
    pub quote: BidQuote,
    pub notes: Option<String>,
}

impl NewBid {
    pub fn new(user_id: i64, lot_number: impl Into<String>, quote: BidQuote) -> Self {
        Self { user_id, lot_number: lot_number.into(), quote, notes: None }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

//--------------------------------------   PaymentNotification     ---------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEventKind {
    Succeeded,
    Failed,
    Canceled,
    Other(String),
}

impl Display for PaymentEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentEventKind::Succeeded => write!(f, "succeeded"),
            PaymentEventKind::Failed => write!(f, "failed"),
            PaymentEventKind::Canceled => write!(f, "canceled"),
            PaymentEventKind::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A processor-agnostic view of an asynchronous payment notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    /// The processor's unique id for this event. Used for idempotency.
    pub event_id: String,
    pub kind: PaymentEventKind,
    pub payment_intent_id: String,
    pub amount: Cents,
    pub currency: String,
    /// The bid id, if the processor echoed it back in the intent metadata
    pub bid_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl PaymentNotification {
    pub fn new(
        event_id: impl Into<String>,
        kind: PaymentEventKind,
        payment_intent_id: impl Into<String>,
        amount: Cents,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            kind,
            payment_intent_id: payment_intent_id.into(),
            amount,
            currency: currency.into(),
            bid_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_bid_id(mut self, bid_id: i64) -> Self {
        self.bid_id = Some(bid_id);
        self
    }
}

//--------------------------------------   PaymentEventRecord     ---------------------------------------------------
/// A row in the `payment_events` ledger.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentEventRecord {
    pub id: i64,
    pub event_id: String,
    pub event_type: String,
    pub payment_intent_id: String,
    pub bid_id: Option<i64>,
    pub amount: Cents,
    pub currency: String,
    pub outcome: String,
    pub received_at: DateTime<Utc>,
}
