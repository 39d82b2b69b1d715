use std::{fmt::Debug, time::Duration};

use log::*;
use pbs_common::Cents;

use crate::{
    bpe_api::bid_objects::{BidPlacement, BidRequest, PaymentRetry},
    db_types::{Bid, BidStatusType},
    events::EventProducers,
    fees::{BidQuote, FeeSchedule},
    traits::{
        AuthorizationRequest,
        BidGatewayDatabase,
        BidGatewayError,
        ExpiryResult,
        PaymentAuthorization,
        PaymentProcessor,
    },
};

/// `BidFlowApi` drives a bid from submission to the point where the processor takes over: pricing, recording,
/// authorizing payment, retrying failed payments, and cancelling bids that were never paid.
///
/// Payment confirmation itself is asynchronous and is handled by [`crate::ReconciliationApi`].
pub struct BidFlowApi<B, P> {
    db: B,
    processor: P,
    fees: FeeSchedule,
    producers: EventProducers,
}

impl<B, P> Debug for BidFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BidFlowApi ({:?})", self.fees)
    }
}

impl<B, P> BidFlowApi<B, P> {
    pub fn new(db: B, processor: P, fees: FeeSchedule, producers: EventProducers) -> Self {
        Self { db, processor, fees, producers }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn quote(&self, max_bid: Cents) -> BidQuote {
        self.fees.quote(max_bid)
    }

    /// Quotes a maximum bid given in dollars, as typed in by a user.
    pub fn quote_dollars(&self, max_bid: f64) -> Result<BidQuote, BidGatewayError> {
        let max_bid = Cents::from_dollars(max_bid).map_err(|e| BidGatewayError::InvalidBid(e.to_string()))?;
        if !max_bid.is_positive() {
            return Err(BidGatewayError::InvalidBid("The maximum bid must be greater than zero".into()));
        }
        Ok(self.quote(max_bid))
    }
}

impl<B, P> BidFlowApi<B, P>
where
    B: BidGatewayDatabase,
    P: PaymentProcessor,
{
    /// Records a new bid and creates a payment authorization for its deposit and service fee.
    ///
    /// The bid is stored as `New` before the processor is contacted. If the processor fails, the bid stays `New` and
    /// [`BidGatewayError::PaymentAuthorizationFailed`] is returned, so that the user can retry.
    /// On success the bid moves to `AwaitingPayment` and the client secret is returned for the browser to complete
    /// the payment.
    pub async fn place_bid(&self, user_id: i64, request: BidRequest) -> Result<BidPlacement, BidGatewayError> {
        let new_bid = request.validate(user_id, &self.fees)?;
        let quote = new_bid.quote.clone();
        let bid = self.db.insert_bid(new_bid).await?;
        debug!("🔄️🏷️ Bid #{} for lot {} recorded. Total due: {}", bid.id, bid.lot_number, quote.total_amount);
        let (bid, client_secret) = self.authorize_and_attach(bid).await?;
        info!("🔄️🏷️ Bid #{} is awaiting payment of {}", bid.id, bid.total_amount());
        Ok(BidPlacement { bid, client_secret, quote })
    }

    /// Creates a fresh payment authorization for a bid that is `New` (the first authorization failed) or
    /// `PaymentFailed`. Any previous intent is cancelled at the processor first, on a best-effort basis.
    pub async fn retry_payment(&self, user_id: i64, bid_id: i64) -> Result<PaymentRetry, BidGatewayError> {
        let bid = self.owned_bid(user_id, bid_id).await?;
        if !matches!(bid.status, BidStatusType::New | BidStatusType::PaymentFailed) {
            return Err(BidGatewayError::BidStatusTransitionForbidden {
                from: bid.status,
                to: BidStatusType::AwaitingPayment,
            });
        }
        if let Some(old_intent) = &bid.payment_intent_id {
            if let Err(e) = self.processor.cancel_authorization(old_intent).await {
                warn!("🔄️🏷️ Could not cancel superseded payment intent {old_intent} for bid #{bid_id}: {e}");
            }
        }
        let (bid, client_secret) = self.authorize_and_attach(bid).await?;
        info!("🔄️🏷️ Bid #{bid_id} has a new payment authorization");
        Ok(PaymentRetry { bid, client_secret })
    }

    /// Cancels one of the user's own unpaid bids.
    ///
    /// The live payment intent is cancelled at the processor first. If that fails, the bid is left untouched, since
    /// the payment may already have gone through.
    pub async fn cancel_bid(&self, user_id: i64, bid_id: i64) -> Result<Bid, BidGatewayError> {
        let bid = self.owned_bid(user_id, bid_id).await?;
        let bid = self.cancel_unpaid_bid(bid).await?;
        info!("🔄️🏷️ Bid #{bid_id} was cancelled by its owner");
        Ok(bid)
    }

    /// Cancels bids that have been sitting in `New` or `AwaitingPayment` for longer than `timeout`.
    ///
    /// Bids whose intent cannot be cancelled at the processor are skipped and will be tried again next time.
    pub async fn expire_abandoned_bids(&self, timeout: Duration) -> Result<ExpiryResult, BidGatewayError> {
        let bids = self.db.fetch_abandoned_bids(timeout).await?;
        trace!("🔄️🏷️ {} abandoned bids found", bids.len());
        let mut result = ExpiryResult::default();
        for bid in bids {
            let bid_id = bid.id;
            match self.cancel_unpaid_bid(bid).await {
                Ok(bid) => result.cancelled.push(bid),
                Err(e) => {
                    warn!("🔄️🏷️ Could not expire bid #{bid_id}: {e}");
                    result.skipped.push(bid_id);
                },
            }
        }
        Ok(result)
    }

    async fn owned_bid(&self, user_id: i64, bid_id: i64) -> Result<Bid, BidGatewayError> {
        self.db
            .fetch_bid(bid_id)
            .await?
            .filter(|bid| bid.user_id == user_id)
            .ok_or(BidGatewayError::BidNotFound(bid_id))
    }

    async fn cancel_unpaid_bid(&self, bid: Bid) -> Result<Bid, BidGatewayError> {
        if !bid.status.is_unpaid() {
            return Err(BidGatewayError::BidStatusTransitionForbidden {
                from: bid.status,
                to: BidStatusType::Cancelled,
            });
        }
        if let Some(intent) = &bid.payment_intent_id {
            self.processor.cancel_authorization(intent).await?;
            debug!("🔄️🏷️ Payment intent {intent} for bid #{} cancelled at the processor", bid.id);
        }
        let updated = match self.db.update_bid_status(bid.id, bid.status, BidStatusType::Cancelled).await {
            Ok(updated) => updated,
            Err(e @ BidGatewayError::ConcurrentModification { .. }) => {
                // The processor's cancellation notice can land between the cancel call and the status write
                return match self.db.fetch_bid(bid.id).await? {
                    Some(current) if current.status == BidStatusType::Cancelled => {
                        debug!("🔄️🏷️ Bid #{} was already cancelled by a processor notification", bid.id);
                        Ok(current)
                    },
                    _ => Err(e),
                };
            },
            Err(e) => return Err(e),
        };
        self.producers.publish_status_change(bid.status, &updated).await;
        Ok(updated)
    }

    async fn authorize(&self, bid: &Bid) -> Result<PaymentAuthorization, BidGatewayError> {
        let request = AuthorizationRequest {
            bid_id: bid.id,
            user_id: bid.user_id,
            lot_number: bid.lot_number.clone(),
            amount: bid.total_amount(),
            currency: bid.currency.clone(),
        };
        let authorization = self.processor.create_authorization(request).await.map_err(|e| {
            warn!("🔄️🏷️ Payment authorization for bid #{} failed: {e}", bid.id);
            BidGatewayError::PaymentAuthorizationFailed { bid_id: bid.id, reason: e.to_string() }
        })?;
        if authorization.amount != bid.total_amount() {
            warn!(
                "🔄️🏷️ Processor authorized {} for bid #{}, but {} was requested",
                authorization.amount,
                bid.id,
                bid.total_amount()
            );
        }
        Ok(authorization)
    }

    /// Authorizes payment for the bid and records the new intent. If the bid changed underneath us in the meantime,
    /// the new intent is cancelled again.
    async fn authorize_and_attach(&self, bid: Bid) -> Result<(Bid, String), BidGatewayError> {
        let authorization = self.authorize(&bid).await?;
        let intent = authorization.payment_intent_id.as_str();
        let updated = match self.db.attach_payment_authorization(bid.id, bid.status, intent).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(cancel_err) = self.processor.cancel_authorization(intent).await {
                    let id = bid.id;
                    error!("🔄️🏷️ Orphaned payment intent {intent} for bid #{id} could not be cancelled: {cancel_err}");
                }
                return Err(e);
            },
        };
        self.producers.publish_status_change(bid.status, &updated).await;
        Ok((updated, authorization.client_secret))
    }
}
