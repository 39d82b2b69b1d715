//! Glue between the bid engine and Stripe.
//!
//! * [`StripeProcessor`] implements the engine's [`PaymentProcessor`] contract with payment intents.
//! * [`notification_from_event`] turns a verified webhook event into the engine's processor-agnostic
//!   [`PaymentNotification`].
//! * [`create_bid_event_handlers`] wires up the hooks that run after a bid has been paid or changed status.
use bid_engine::{
    db_types::{PaymentEventKind, PaymentNotification},
    events::{BidPaidEvent, BidStatusChangedEvent, EventHandlers, EventHooks},
    AuthorizationRequest,
    PaymentAuthorization,
    PaymentProcessor,
    PaymentProcessorError,
};
use chrono::{DateTime, Utc};
use log::*;
use stripe_tools::{NewPaymentIntent, StripeApi, StripeApiError, StripeConfig, WebhookEvent};

use crate::errors::ServerError;

pub const BID_EVENT_BUFFER_SIZE: usize = 25;
pub const PAYMENT_TYPE: &str = "bid_payment";

#[derive(Clone)]
pub struct StripeProcessor {
    api: StripeApi,
}

impl StripeProcessor {
    pub fn new(config: StripeConfig) -> Result<Self, ServerError> {
        let api = StripeApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

fn processor_error(e: StripeApiError) -> PaymentProcessorError {
    match e {
        StripeApiError::QueryError { status, message } if (400..500).contains(&status) => {
            PaymentProcessorError::Rejected(format!("{status}: {message}"))
        },
        e => PaymentProcessorError::Unavailable(e.to_string()),
    }
}

impl PaymentProcessor for StripeProcessor {
    async fn create_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> Result<PaymentAuthorization, PaymentProcessorError> {
        let intent = NewPaymentIntent::new(request.amount, request.currency.as_str())
            .with_description(format!("Proxy bid deposit and service fee for lot {}", request.lot_number))
            .with_metadata("bid_id", request.bid_id)
            .with_metadata("user_id", request.user_id)
            .with_metadata("lot_number", &request.lot_number)
            .with_metadata("type", PAYMENT_TYPE);
        let intent = self.api.create_payment_intent(&intent).await.map_err(processor_error)?;
        let client_secret = intent.client_secret.ok_or_else(|| {
            PaymentProcessorError::Rejected(format!("Payment intent {} came back without a client secret", intent.id))
        })?;
        debug!("💳️ Payment intent {} created for bid #{}", intent.id, request.bid_id);
        Ok(PaymentAuthorization {
            payment_intent_id: intent.id,
            client_secret,
            amount: intent.amount,
            currency: intent.currency,
        })
    }

    async fn cancel_authorization(&self, payment_intent_id: &str) -> Result<(), PaymentProcessorError> {
        match self.api.cancel_payment_intent(payment_intent_id).await {
            Ok(_) => Ok(()),
            // Cancelling an intent that is already cancelled is fine. Anything else (e.g. it succeeded) is not.
            Err(StripeApiError::QueryError { status: 400, message }) if message.contains("status of canceled") => {
                debug!("💳️ Payment intent {payment_intent_id} was already cancelled");
                Ok(())
            },
            Err(e) => Err(processor_error(e)),
        }
    }
}

fn event_kind(event_type: &str) -> PaymentEventKind {
    match event_type {
        "payment_intent.succeeded" => PaymentEventKind::Succeeded,
        "payment_intent.payment_failed" => PaymentEventKind::Failed,
        "payment_intent.canceled" => PaymentEventKind::Canceled,
        other => PaymentEventKind::Other(other.to_string()),
    }
}

/// Converts a webhook event into a payment notification. Events that are not about payment intents return `None`.
pub fn notification_from_event(event: &WebhookEvent) -> Result<Option<PaymentNotification>, ServerError> {
    if !event.is_payment_intent_event() {
        return Ok(None);
    }
    let intent = event.payment_intent().map_err(|e| ServerError::CouldNotDeserializePayload(e.to_string()))?;
    let mut notification = PaymentNotification::new(
        event.id.as_str(),
        event_kind(&event.event_type),
        intent.id.as_str(),
        intent.amount,
        intent.currency.as_str(),
    );
    if let Some(bid_id) = intent.bid_id() {
        notification = notification.with_bid_id(bid_id);
    }
    if let Some(created_at) = DateTime::<Utc>::from_timestamp(event.created, 0) {
        notification.created_at = created_at;
    }
    Ok(Some(notification))
}

/// Event handlers for the bid lifecycle.
///
/// 1. BidPaidEvent - The bid's deposit and fee have been received, and the bid is ready to be placed at the auction.
/// 2. BidStatusChangedEvent - Every other applied transition, for the audit log.
pub fn create_bid_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_bid_paid(|ev: BidPaidEvent| {
        Box::pin(async move {
            let bid = ev.bid;
            info!(
                "💳️ Bid #{} on lot {} is paid ({}). It is ready to be placed at the auction for up to {}.",
                bid.id,
                bid.lot_number,
                bid.total_amount(),
                bid.max_bid
            );
        })
    });
    hooks.on_status_changed(|ev: BidStatusChangedEvent| {
        Box::pin(async move {
            info!("📬️ Bid #{} moved from {} to {}", ev.bid.id, ev.old_status, ev.bid.status);
        })
    });
    EventHandlers::new(BID_EVENT_BUFFER_SIZE, hooks)
}
