//! #  Database and processor contracts.
//!
//! This module provides the interfaces that define the contracts of the bid engine *backends*.
//!
//! ## Bids
//! A bid is a user's instruction to bid up to a maximum amount on an auction lot. It is only acted upon once the
//! deposit and service fee for the bid have been paid via the payment processor.
//!
//! The [`BidGatewayDatabase`] trait provides the mechanisms for writing bids, attaching payment authorizations and
//! applying processor notifications. Every status write is a compare-and-set against the status the caller last saw.
//!
//! The [`BidManagement`] trait provides methods for querying bids and the payment event ledger.
//!
//! ## Traits
//! * [`BidGatewayDatabase`] defines the highest level of behavior for backends supporting the bid engine.
//! * [`BidManagement`] provides read-only queries over bids and payment events.
//! * [`UserManagement`] stores and retrieves registered users.
//! * [`PaymentProcessor`] is the contract the engine expects from the third-party payment processor.
mod bid_gateway_database;
mod bid_management;
mod data_objects;
mod payment_processor;
mod user_management;

pub use bid_gateway_database::{BidGatewayDatabase, BidGatewayError};
pub use bid_management::BidManagement;
pub use data_objects::{ExpiryResult, ReconciliationOutcome};
pub use payment_processor::{AuthorizationRequest, PaymentAuthorization, PaymentProcessor, PaymentProcessorError};
pub use user_management::{AuthApiError, UserManagement};
