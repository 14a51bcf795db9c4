//! broker-client - Core Library
//! Asynchronous client for a broker daemon's order-management service

// Public modules
pub mod core;
pub mod rpc;
pub mod capacity;
pub mod execution;
pub mod client;

// Re-exports
pub use client::BrokerClient;
pub use crate::core::{BrokerConfig, Error, Result};
