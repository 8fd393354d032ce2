//! Plumbing shared by the vault, warehouse and Looker crates.
//!
//! [`PlatformError`] for failures in this layer, [`HttpConfig`] and
//! [`build_http_client`] for outbound clients, [`env`] for reading
//! configuration, and [`init_tracing`] for whoever owns `main`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{HttpConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing};
