//! A thin client for the parts of the Stripe API that the bid server uses: creating and cancelling payment intents,
//! and receiving signed webhook events.
mod api;
mod config;
mod error;

mod data_objects;
pub mod webhook;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{NewPaymentIntent, PaymentIntent, StripeErrorBody, WebhookEvent, WebhookEventData};
pub use error::StripeApiError;
