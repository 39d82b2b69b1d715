//! The bid status state machine.
//!
//! Two kinds of status changes exist:
//! * Manual changes made by an admin as the auction progresses ([`check_manual_transition`]). These can only move
//!   paid bids through the auction states, or cancel bids that were never paid.
//! * Changes driven by the payment processor ([`reconcile`]). These are the only way a bid can become paid.
//!
//! Both functions are pure. Persisting the result (with a compare-and-set on the old status) is the job of the
//! database backend.
use std::fmt::Display;

use pbs_common::Cents;
use serde::Serialize;

use crate::{
    db_types::{Bid, BidStatusType, PaymentEventKind, PaymentNotification},
    traits::BidGatewayError,
};

/// Checks whether an admin may move a bid from `from` to `to`.
pub fn check_manual_transition(from: BidStatusType, to: BidStatusType) -> Result<(), BidGatewayError> {
    use BidStatusType::*;
    if from == to {
        return Err(BidGatewayError::BidModificationNoOp);
    }
    let allowed = match (from, to) {
        // Payment states belong to the processor
        (_, New | AwaitingPayment | Pending | PaymentFailed) => false,
        (Won | Lost | Cancelled, _) => false,
        (Pending, Winning | Outbid | Won | Lost | Cancelled) => true,
        (Winning, Outbid | Won | Lost) => true,
        (Outbid, Winning | Won | Lost) => true,
        (New | AwaitingPayment | PaymentFailed, Cancelled) => true,
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(BidGatewayError::BidStatusTransitionForbidden { from, to })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReconciliationDecision {
    /// Move the bid to `new_status`. If `adopt_intent` is set, the notification's intent id is recorded on the bid.
    Transition { new_status: BidStatusType, adopt_intent: bool },
    Ignore(IgnoreReason),
    Reject(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IgnoreReason {
    /// A success notification for a bid that is already paid
    AlreadyPaid,
    /// The notification no longer applies to the bid's current status
    StaleEvent,
    /// We don't act on this type of event
    UnhandledEvent(String),
}

impl Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::AlreadyPaid => write!(f, "bid is already paid"),
            IgnoreReason::StaleEvent => write!(f, "event does not apply to the current bid status"),
            IgnoreReason::UnhandledEvent(kind) => write!(f, "unhandled event type: {kind}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    IntentMismatch { expected: String, received: String },
    AmountMismatch { expected: Cents, expected_currency: String, received: Cents, received_currency: String },
    /// Money was captured for a bid that had already been cancelled. It must be refunded manually.
    PaidAfterCancellation,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::IntentMismatch { expected, received } => {
                write!(f, "payment intent mismatch: bid has {expected}, notification has {received}")
            },
            RejectReason::AmountMismatch { expected, expected_currency, received, received_currency } => write!(
                f,
                "amount mismatch: expected {expected} {expected_currency}, received {received} {received_currency}"
            ),
            RejectReason::PaidAfterCancellation => write!(f, "payment received for a cancelled bid"),
        }
    }
}

/// Decides what a processor notification means for the given bid.
pub fn reconcile(bid: &Bid, notification: &PaymentNotification) -> ReconciliationDecision {
    use BidStatusType::*;
    let adopt_intent = match &bid.payment_intent_id {
        // A superseded intent failing or being cancelled is expected after a retry. Money captured on one is not.
        Some(id) if id != &notification.payment_intent_id => {
            return match notification.kind {
                PaymentEventKind::Succeeded => ReconciliationDecision::Reject(RejectReason::IntentMismatch {
                    expected: id.clone(),
                    received: notification.payment_intent_id.clone(),
                }),
                _ => ReconciliationDecision::Ignore(IgnoreReason::StaleEvent),
            };
        },
        Some(_) => false,
        None => true,
    };
    let transition = |new_status| ReconciliationDecision::Transition { new_status, adopt_intent };
    match &notification.kind {
        PaymentEventKind::Succeeded => {
            let total = bid.total_amount();
            if notification.amount != total || !notification.currency.eq_ignore_ascii_case(&bid.currency) {
                return ReconciliationDecision::Reject(RejectReason::AmountMismatch {
                    expected: total,
                    expected_currency: bid.currency.clone(),
                    received: notification.amount,
                    received_currency: notification.currency.clone(),
                });
            }
            match bid.status {
                New | AwaitingPayment | PaymentFailed => transition(Pending),
                Cancelled => ReconciliationDecision::Reject(RejectReason::PaidAfterCancellation),
                _ => ReconciliationDecision::Ignore(IgnoreReason::AlreadyPaid),
            }
        },
        PaymentEventKind::Failed => match bid.status {
            New | AwaitingPayment => transition(PaymentFailed),
            _ => ReconciliationDecision::Ignore(IgnoreReason::StaleEvent),
        },
        PaymentEventKind::Canceled => match bid.status {
            New | AwaitingPayment | PaymentFailed => transition(Cancelled),
            _ => ReconciliationDecision::Ignore(IgnoreReason::StaleEvent),
        },
        PaymentEventKind::Other(kind) => ReconciliationDecision::Ignore(IgnoreReason::UnhandledEvent(kind.clone())),
    }
}
