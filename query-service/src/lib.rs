//! Looker API client.
//!
//! [`QueryServiceClient`] loads its base URL and service-account credentials
//! from the secret store once, logs in for a bearer token and runs JSON
//! queries, logging in again once when the token has expired.

pub mod client;
pub mod config;
pub mod error;

pub use client::QueryServiceClient;
pub use config::{DEFAULT_MODEL, DEFAULT_VIEW, QueryServiceConfig};
pub use error::{QueryServiceError, QueryServiceResult};
