//! # Bid engine public API
//!
//! The `bpe_api` module exposes the programmatic API for the bid engine.
//! The API is modular, so that clients of the API can pick and choose the functionality they want.
//!
//! * [`bid_flow_api`] places bids, requests payment authorizations, retries failed payments and cancels unpaid bids.
//! * [`reconciliation_api`] applies asynchronous payment processor notifications to bids, and handles manual status
//!   changes by admins.
//! * [`bids_api`] provides read-only access to bids and the payment event ledger.
//! * [`auth_api`] registers users and checks their credentials.
//!
//! [`bid_state`] holds the rules for which status changes are allowed. The other submodules in this module are
//! support types.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use bid_engine::{BidsApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements BidManagement
//! let api = BidsApi::new(db);
//! let bids = api.bids_for_user(user_id).await?;
//! ```

pub mod auth_api;
pub mod bid_flow_api;
pub mod bid_objects;
pub mod bid_state;
pub mod bids_api;
pub mod reconciliation_api;
