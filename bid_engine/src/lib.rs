//! Bid Engine
//!
//! The bid engine is the core of the proxy bid server. Users submit proxy bids on auction lots, pay a deposit and a
//! service fee through a third-party payment processor, and the engine reconciles the processor's asynchronous
//! notifications with the bid records. This library is provider-agnostic: it knows nothing about HTTP or about any
//! specific payment processor.
//!
//! The library is divided into these main sections:
//! 1. Database management and control ([`mod@sqlite`] and [`mod@traits`]). You should never need to access the
//!    database directly. Instead, use the public API provided by the engine. The exception is the data types used in
//!    the database. These are defined in the [`mod@db_types`] module and are public.
//! 2. The public API ([`mod@bpe_api`]). This provides placing and cancelling bids, payment authorization, notification
//!    reconciliation and bid queries. Backends need to implement the traits in [`mod@traits`] in order to act as a
//!    backend for the server. Payment processors implement [`PaymentProcessor`].
//! 3. The bid state machine ([`bid_state`]), which decides which status changes are legal. It is the only piece of
//!    the system with real invariants:
//!    * a bid only becomes paid through a processor success notification for exactly its total amount;
//!    * once paid, no notification can move it back;
//!    * every processor event is applied at most once.
//!
//! The engine also emits events when bids change status (see [`mod@events`]). A simple hook system is used so that
//! you can easily react to these events, e.g. to email a user once their bid has been paid.
pub mod bpe_api;
pub mod db_types;
pub mod events;
pub mod fees;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use bpe_api::{
    auth_api::AuthApi,
    bid_flow_api::BidFlowApi,
    bid_objects,
    bid_state,
    bids_api::BidsApi,
    reconciliation_api::ReconciliationApi,
};
pub use traits::{
    AuthApiError,
    AuthorizationRequest,
    BidGatewayDatabase,
    BidGatewayError,
    BidManagement,
    ExpiryResult,
    PaymentAuthorization,
    PaymentProcessor,
    PaymentProcessorError,
    ReconciliationOutcome,
    UserManagement,
};
