//! Warehouse client.
//!
//! [`WarehouseClient`] resolves its seven connection secrets from a
//! [`SecretProvider`](subhub_vault::SecretProvider), opens one connection
//! through a [`WarehouseDriver`] on first use and renders query results as
//! JSON or tab-separated text. [`SnowflakeDriver`] is the production driver.

pub mod client;
pub mod driver;
pub mod error;
pub mod format;
pub mod snowflake;
pub mod value;

pub use client::WarehouseClient;
pub use driver::{ConnectParams, WarehouseConnection, WarehouseCursor, WarehouseDriver};
pub use error::{CompilationError, WarehouseError, WarehouseResult};
pub use format::{NO_RESULTS, ResultFormat};
pub use snowflake::{SnowflakeConfig, SnowflakeDriver};
pub use value::{ColumnMeta, Row, Value};
