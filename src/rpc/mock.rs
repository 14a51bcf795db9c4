//! Scripted in-memory broker for unit tests

use std::collections::{HashSet, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::core::{
    CapacityQuote, CapacityService, Error, Market, Order, OrderRequest, OrderService,
    OrderStatus, Result, Side, SymbolCapacity,
};

pub(crate) fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub(crate) fn order(id: &str, status: OrderStatus, fill: &str) -> Order {
    Order {
        id: id.to_string(),
        market: Market::new("BTC/USD"),
        side: Side::Bid,
        amount: dec("1"),
        limit_price: dec("10000"),
        status,
        fill_amount: dec(fill),
    }
}

pub(crate) fn quote(
    base_send: &str,
    base_receive: &str,
    counter_send: &str,
    counter_receive: &str,
) -> CapacityQuote {
    CapacityQuote {
        market: Market::new("BTC/USD"),
        base: SymbolCapacity {
            symbol: "BTC".to_string(),
            available_send_capacity: dec(base_send),
            available_receive_capacity: dec(base_receive),
        },
        counter: SymbolCapacity {
            symbol: "USD".to_string(),
            available_send_capacity: dec(counter_send),
            available_receive_capacity: dec(counter_receive),
        },
    }
}

#[derive(Default)]
pub(crate) struct MockBroker {
    /// Returned by `get_orders`
    pub listed: Mutex<Vec<Order>>,
    /// Popped one per `get_order` call
    pub polls: Mutex<VecDeque<Result<Order>>>,
    pub poll_count: AtomicUsize,
    pub created: Mutex<Vec<OrderRequest>>,
    pub cancelled: Mutex<Vec<String>>,
    pub cancel_attempts: AtomicUsize,
    pub failing_cancels: Mutex<HashSet<String>>,
    pub quote: Mutex<Option<CapacityQuote>>,
    /// Latency of every `get_order` call
    pub poll_delay: Duration,
    /// Latency of every `cancel_order` call
    pub cancel_delay: Duration,
}

impl MockBroker {
    pub fn with_polls(polls: Vec<Result<Order>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Self::default()
        }
    }

    pub fn with_listed(listed: Vec<Order>) -> Self {
        Self {
            listed: Mutex::new(listed),
            ..Self::default()
        }
    }

    pub fn with_quote(quote: CapacityQuote) -> Self {
        Self {
            quote: Mutex::new(Some(quote)),
            ..Self::default()
        }
    }

    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    pub fn with_cancel_delay(mut self, delay: Duration) -> Self {
        self.cancel_delay = delay;
        self
    }

    pub fn polls_made(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderService for MockBroker {
    async fn get_orders(&self, market: &Market, _deadline: Duration) -> Result<Vec<Order>> {
        Ok(self
            .listed
            .lock()
            .iter()
            .filter(|o| &o.market == market)
            .cloned()
            .collect())
    }

    async fn get_order(&self, order_id: &str, _deadline: Duration) -> Result<Order> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }
        self.polls.lock().pop_front().unwrap_or_else(|| {
            Err(Error::RemoteUnavailable(format!(
                "no scripted response for {}",
                order_id
            )))
        })
    }

    async fn create_order(&self, request: &OrderRequest, _deadline: Duration) -> Result<String> {
        let mut created = self.created.lock();
        created.push(request.clone());
        Ok(format!("order-{}", created.len()))
    }

    async fn cancel_order(&self, order_id: &str, _deadline: Duration) -> Result<()> {
        self.cancel_attempts.fetch_add(1, Ordering::SeqCst);
        if self.cancel_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.cancel_delay).await;
        }
        if self.failing_cancels.lock().contains(order_id) {
            return Err(Error::RemoteUnavailable(format!("cannot cancel {}", order_id)));
        }
        self.cancelled.lock().push(order_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl CapacityService for MockBroker {
    async fn get_trading_capacity(
        &self,
        _market: &Market,
        _deadline: Duration,
    ) -> Result<CapacityQuote> {
        self.quote
            .lock()
            .clone()
            .ok_or_else(|| Error::RemoteUnavailable("capacity service down".to_string()))
    }
}
