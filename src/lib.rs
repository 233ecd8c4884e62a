//! Swap Bridge - Library interface
//!
//! Re-exports internal modules for use in integration tests.

pub mod admin;
pub mod api;
pub mod config;
pub mod metrics;
pub mod store;
pub mod swapapi;
pub mod tokens;
pub mod types;
pub mod worker;
