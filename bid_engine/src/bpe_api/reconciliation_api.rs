use std::fmt::Debug;

use log::*;

use crate::{
    bpe_api::bid_state::check_manual_transition,
    db_types::{Bid, BidStatusType, PaymentNotification},
    events::EventProducers,
    traits::{BidGatewayDatabase, BidGatewayError, ReconciliationOutcome},
};

/// `ReconciliationApi` applies asynchronous payment processor notifications to bids, and lets admins move paid bids
/// through the auction.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B: Debug> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.db)
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> ReconciliationApi<B>
where B: BidGatewayDatabase
{
    /// Applies a processor notification to the matching bid.
    ///
    /// Notifications are idempotent: a redelivered event is reported as [`ReconciliationOutcome::Duplicate`] and has no
    /// further effect. Notifications that conflict with the bid record are recorded and reported as
    /// [`ReconciliationOutcome::Rejected`]; they need manual follow-up (usually a refund).
    pub async fn process_payment_notification(
        &self,
        notification: PaymentNotification,
    ) -> Result<ReconciliationOutcome, BidGatewayError> {
        let event_id = notification.event_id.clone();
        trace!("🔄️💳️ Processing {} notification {event_id} for {}", notification.kind, notification.payment_intent_id);
        let outcome = self.db.process_payment_notification(notification).await?;
        match &outcome {
            ReconciliationOutcome::Applied { bid, old_status } => {
                info!("🔄️💳️ Event {event_id}: bid #{} moved from {old_status} to {}", bid.id, bid.status);
                self.producers.publish_status_change(*old_status, bid).await;
            },
            ReconciliationOutcome::Ignored { bid_id, reason } => {
                debug!("🔄️💳️ Event {event_id} ignored for bid #{bid_id}: {reason}");
            },
            ReconciliationOutcome::Rejected { bid_id, reason } => {
                error!("🔄️💳️ Event {event_id} rejected for bid #{bid_id}. Manual intervention required: {reason}");
            },
            ReconciliationOutcome::UnknownBid => {
                warn!("🔄️💳️ Event {event_id} does not belong to any bid");
            },
            ReconciliationOutcome::Duplicate { .. } => {
                debug!("🔄️💳️ Event {event_id} has already been processed");
            },
        }
        Ok(outcome)
    }

    /// Manually changes the status of a bid, e.g. when the auction house reports that the bid is winning.
    ///
    /// Only auction states can be set this way. Payment states are owned by the processor, so a bid can never be
    /// marked as paid by hand. Unpaid bids may be cancelled.
    ///
    /// This API has no processor handle, so cancelling here leaves any live payment intent open at the processor. If
    /// the user pays it anyway, the notification is rejected as [`PaidAfterCancellation`] and the payment has to be
    /// refunded by hand. Owners and the expiry worker cancel through [`BidFlowApi`], which closes the intent first.
    ///
    /// [`PaidAfterCancellation`]: crate::bpe_api::bid_state::RejectReason::PaidAfterCancellation
    /// [`BidFlowApi`]: crate::BidFlowApi
    pub async fn modify_status_for_bid(
        &self,
        bid_id: i64,
        new_status: BidStatusType,
        reason: &str,
    ) -> Result<Bid, BidGatewayError> {
        let bid = self.db.fetch_bid(bid_id).await?.ok_or(BidGatewayError::BidNotFound(bid_id))?;
        check_manual_transition(bid.status, new_status)?;
        let updated = self.db.update_bid_status(bid_id, bid.status, new_status).await?;
        info!("🔄️🏷️ Bid #{bid_id} manually moved from {} to {new_status}. Reason: {reason}", bid.status);
        self.producers.publish_status_change(bid.status, &updated).await;
        Ok(updated)
    }
}
