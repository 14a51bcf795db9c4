//! Broker client - The caller-facing surface over the remote services

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::info;

use crate::capacity::CapacityPlanner;
use crate::core::{
    BrokerConfig, CapacityQuote, CapacityService, Error, Market, Order, OrderRequest,
    OrderService, Result, Side, TerminalStatus,
};
use crate::execution::{
    BulkCanceller, CancelOutcome, OrderWatcher, StopSignal, WatchHandle, DEFAULT_POLL_INTERVAL,
};
use crate::rpc::{self, RestBroker, DEFAULT_DEADLINE};

/// Client for one broker daemon. Construct one per daemon; clones share the transport.
#[derive(Clone)]
pub struct BrokerClient {
    orders: Arc<dyn OrderService>,
    capacity: Arc<dyn CapacityService>,
    planner: CapacityPlanner,
    watcher: OrderWatcher,
    canceller: BulkCanceller,
    deadline: Duration,
    poll_interval: Duration,
}

impl BrokerClient {
    /// Build a client over the HTTP gateway described by `config`.
    ///
    /// Fails with `AuthConfigMissing` before any network activity when
    /// authentication is enabled without credentials.
    pub fn connect(config: &BrokerConfig) -> Result<Self> {
        let broker = Arc::new(RestBroker::new(config)?);
        info!(url = broker.base_url(), "broker client ready");
        Ok(Self::with_services(broker.clone(), broker)
            .with_deadline(config.deadline())
            .with_poll_interval(config.poll_interval()))
    }

    /// Build a client over arbitrary service implementations
    pub fn with_services(
        orders: Arc<dyn OrderService>,
        capacity: Arc<dyn CapacityService>,
    ) -> Self {
        Self {
            planner: CapacityPlanner::new(capacity.clone()),
            watcher: OrderWatcher::new(orders.clone()),
            canceller: BulkCanceller::new(orders.clone()),
            orders,
            capacity,
            deadline: DEFAULT_DEADLINE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.planner = self.planner.with_deadline(deadline);
        self.watcher = self.watcher.with_deadline(deadline);
        self.canceller = self.canceller.with_deadline(deadline);
        self.deadline = deadline;
        self
    }

    /// Interval used by watches that don't pass their own
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Place a good-til-cancelled limit order, returning the broker's order id
    pub async fn place(
        &self,
        market: &Market,
        side: Side,
        price: Decimal,
        amount: Decimal,
    ) -> Result<String> {
        if price <= Decimal::ZERO {
            return Err(Error::InvalidArgument(format!("price must be positive, got {}", price)));
        }
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidArgument(format!("amount must be positive, got {}", amount)));
        }

        let request = OrderRequest::limit(market.clone(), side, amount, price);
        let order_id = rpc::call(
            "createBlockOrder",
            self.deadline,
            self.orders.create_order(&request, self.deadline),
        )
        .await?;

        info!(%order_id, %market, %side, %amount, %price, "order placed");
        Ok(order_id)
    }

    /// Cancel every ACTIVE order on `market`; fails if any cancellation failed
    pub async fn cancel_all(&self, market: &Market) -> Result<Vec<String>> {
        self.canceller.cancel_all(market).await
    }

    /// Cancel every ACTIVE order on `market`, reporting each outcome
    pub async fn cancel_all_settled(&self, market: &Market) -> Result<Vec<CancelOutcome>> {
        self.canceller.cancel_all_settled(market).await
    }

    pub async fn max_order_size(&self, market: &Market, side: Side, price: Decimal) -> Result<String> {
        self.planner.max_order_size(market, side, price).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order> {
        rpc::call(
            "getBlockOrder",
            self.deadline,
            self.orders.get_order(order_id, self.deadline),
        )
        .await
    }

    pub async fn list_orders(&self, market: &Market) -> Result<Vec<Order>> {
        rpc::call(
            "getBlockOrders",
            self.deadline,
            self.orders.get_orders(market, self.deadline),
        )
        .await
    }

    pub async fn trading_capacity(&self, market: &Market) -> Result<CapacityQuote> {
        rpc::call(
            "getTradingCapacities",
            self.deadline,
            self.capacity.get_trading_capacity(market, self.deadline),
        )
        .await
    }

    /// Resolve once the order completes or is cancelled; FAILED is an error.
    /// `None` polls at the client's interval.
    pub async fn watch_order(
        &self,
        order_id: &str,
        interval: impl Into<Option<Duration>>,
    ) -> Result<TerminalStatus> {
        let interval = self.interval_or_default(interval);
        self.watcher.watch(order_id, interval).await
    }

    /// Blocking watch the caller can end early through `stop`
    pub async fn watch_order_until(
        &self,
        order_id: &str,
        interval: impl Into<Option<Duration>>,
        stop: StopSignal,
    ) -> Result<TerminalStatus> {
        let interval = self.interval_or_default(interval);
        self.watcher.watch_until(order_id, interval, stop).await
    }

    /// Stream fill, done and error notifications for an order
    pub fn watch_order_fill_amounts(
        &self,
        order_id: &str,
        interval: impl Into<Option<Duration>>,
    ) -> WatchHandle {
        let interval = self.interval_or_default(interval);
        self.watcher.subscribe(order_id, interval)
    }

    fn interval_or_default(&self, interval: impl Into<Option<Duration>>) -> Duration {
        interval.into().unwrap_or(self.poll_interval)
    }
}
