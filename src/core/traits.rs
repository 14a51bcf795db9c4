//! Core traits - The broker's remote services, as consumed by the client

use std::time::Duration;

use async_trait::async_trait;

use crate::core::{CapacityQuote, Market, Order, OrderRequest, Result};

/// Remote order-management service
///
/// Every call receives the deadline it must finish within; implementations
/// should pass it down to the transport. Callers in this crate also enforce
/// it locally, see [`crate::rpc::call`].
#[async_trait]
pub trait OrderService: Send + Sync {
    /// All block orders the broker tracks for a market
    async fn get_orders(&self, market: &Market, deadline: Duration) -> Result<Vec<Order>>;

    /// Current state of one block order
    async fn get_order(&self, order_id: &str, deadline: Duration) -> Result<Order>;

    /// Submit a new block order, returning its id
    async fn create_order(&self, request: &OrderRequest, deadline: Duration) -> Result<String>;

    /// Cancel a block order
    async fn cancel_order(&self, order_id: &str, deadline: Duration) -> Result<()>;
}

/// Remote trading-capacity service
#[async_trait]
pub trait CapacityService: Send + Sync {
    async fn get_trading_capacity(&self, market: &Market, deadline: Duration)
        -> Result<CapacityQuote>;
}
