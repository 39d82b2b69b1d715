//! # Proxy bid server
//! This crate hosts the HTTP server for the proxy bid engine. It is responsible for:
//! * Registering users and issuing access tokens.
//! * Accepting proxy bids, quoting their fees and starting their payment with Stripe.
//! * Listening for Stripe webhook requests, verifying their signatures and handing the payment notifications to the
//!   bid engine for reconciliation.
//! * Giving admins a way to search bids and record auction results.
//! * Cancelling bids that were never paid.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/auth/register` and `/auth/login`: Account creation and login. Both return an access token.
//! * `/api/...`: Bid routes. These require a valid access token, and some require the admin role.
//! * `/webhook`: The webhook route for receiving payment intent events from Stripe.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
