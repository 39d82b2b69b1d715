//! Fee schedule for proxy bids.
//!
//! Every bid is charged a flat service fee. Bids whose maximum exceeds the deposit threshold additionally require a
//! deposit, computed as a fixed percentage (in basis points) of the maximum bid.
use pbs_common::Cents;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICE_FEE: Cents = Cents::from_cents(21_500);
pub const DEFAULT_DEPOSIT_THRESHOLD: Cents = Cents::from_cents(250_000);
pub const DEFAULT_DEPOSIT_RATE_BPS: u32 = 1_000;
pub const DEFAULT_CURRENCY: &str = "usd";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub service_fee: Cents,
    pub deposit_threshold: Cents,
    pub deposit_rate_bps: u32,
    pub currency: String,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            service_fee: DEFAULT_SERVICE_FEE,
            deposit_threshold: DEFAULT_DEPOSIT_THRESHOLD,
            deposit_rate_bps: DEFAULT_DEPOSIT_RATE_BPS,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// The breakdown of what a user will be charged for a bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidQuote {
    pub max_bid: Cents,
    pub deposit_amount: Cents,
    pub service_fee: Cents,
    pub total_amount: Cents,
    pub requires_deposit: bool,
    pub currency: String,
}

impl FeeSchedule {
    /// The deposit is only charged when `max_bid` is strictly greater than the threshold.
    pub fn deposit_for(&self, max_bid: Cents) -> Cents {
        if max_bid > self.deposit_threshold {
            max_bid.basis_points(self.deposit_rate_bps)
        } else {
            Cents::default()
        }
    }

    pub fn quote(&self, max_bid: Cents) -> BidQuote {
        let deposit_amount = self.deposit_for(max_bid);
        BidQuote {
            max_bid,
            deposit_amount,
            service_fee: self.service_fee,
            total_amount: deposit_amount + self.service_fee,
            requires_deposit: deposit_amount.is_positive(),
            currency: self.currency.clone(),
        }
    }
}
