//! GA4 Dashboard API
//!
//! Fetches usage analytics from the Google Analytics Data API with a service
//! account and serves them to a dashboard as one normalized JSON payload.

pub mod api;
pub mod auth;
pub mod check;
pub mod config;
pub mod credentials;
pub mod error;
pub mod normalize;
pub mod reports;
pub mod server;
