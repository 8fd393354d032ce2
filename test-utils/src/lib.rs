//! Shared test utilities for the SubHub infrastructure clients.
//!
//! This crate provides:
//! - Mock secret provider and warehouse driver with call counters and
//!   failure injection
//! - Proptest generators for secret names and result values
//! - Test fixtures with sample secrets, rows and queries

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
pub use mocks::{ExecuteFailure, MockSecretProvider, MockWarehouseDriver, MockWarehouseState};
