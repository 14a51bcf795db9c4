//! Capacity planning - Largest order the trading channels can currently carry

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::core::{CapacityQuote, CapacityService, Error, Market, Result, Side};
use crate::rpc::{self, DEFAULT_DEADLINE};

/// Decimal places of every amount handed back to callers
pub const AMOUNT_SCALE: u32 = 8;

/// Fraction of raw capacity kept after the fee/slippage haircut (95%)
pub fn haircut() -> Decimal {
    Decimal::new(95, 2)
}

/// Converts a market's channel capacity into a maximum order size
#[derive(Clone)]
pub struct CapacityPlanner {
    capacity: Arc<dyn CapacityService>,
    deadline: Duration,
}

impl CapacityPlanner {
    pub fn new(capacity: Arc<dyn CapacityService>) -> Self {
        Self {
            capacity,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Maximum size of a new `side` order at `price`, as an 8-place decimal string.
    pub async fn max_order_size(&self, market: &Market, side: Side, price: Decimal) -> Result<String> {
        validate_price(price)?;

        let quote = rpc::call(
            "getTradingCapacities",
            self.deadline,
            self.capacity.get_trading_capacity(market, self.deadline),
        )
        .await?;

        let size = max_order_size_for_quote(&quote, side, price)?;
        debug!(%market, %side, %price, %size, "computed max order size");
        Ok(format_amount(size))
    }
}

/// Haircut minimum of send and receive capacity, truncated to 8 places.
///
/// BID buys base with counter: receive is limited by base inbound capacity,
/// send by counter outbound capacity converted at `price`. ASK mirrors it.
pub fn max_order_size_for_quote(quote: &CapacityQuote, side: Side, price: Decimal) -> Result<Decimal> {
    validate_price(price)?;

    let (receive_capacity, send_capacity) = match side {
        Side::Bid => (
            quote.base.available_receive_capacity,
            per_unit(quote.counter.available_send_capacity, price)?,
        ),
        Side::Ask => (
            per_unit(quote.counter.available_receive_capacity, price)?,
            quote.base.available_send_capacity,
        ),
    };

    let receive_capacity = receive_capacity * haircut();
    let send_capacity = send_capacity * haircut();

    Ok(send_capacity
        .min(receive_capacity)
        .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToZero))
}

/// Render with exactly 8 decimal places, truncating any extra precision.
pub fn format_amount(amount: Decimal) -> String {
    let mut amount = amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToZero);
    amount.rescale(AMOUNT_SCALE);
    amount.to_string()
}

fn validate_price(price: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(Error::InvalidArgument(format!("price must be positive, got {}", price)));
    }
    Ok(())
}

fn per_unit(counter_amount: Decimal, price: Decimal) -> Result<Decimal> {
    counter_amount.checked_div(price).ok_or_else(|| {
        Error::InvalidArgument(format!("{} / {} is out of range", counter_amount, price))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::{dec, quote, MockBroker};

    #[test]
    fn test_bid_limited_by_counter_send() {
        // counter send 10000 / 10000 = 1.0 vs base receive 2.0
        let q = quote("0", "2.0", "10000", "0");
        let size = max_order_size_for_quote(&q, Side::Bid, dec("10000")).unwrap();
        assert_eq!(format_amount(size), "0.95000000");
    }

    #[test]
    fn test_bid_limited_by_base_receive() {
        let q = quote("0", "0.5", "100000", "0");
        let size = max_order_size_for_quote(&q, Side::Bid, dec("10000")).unwrap();
        assert_eq!(format_amount(size), "0.47500000");
    }

    #[test]
    fn test_ask_uses_base_send_and_counter_receive() {
        // counter receive 5000 / 10000 = 0.5, base send 0.2
        let q = quote("0.2", "100", "100000", "5000");
        let size = max_order_size_for_quote(&q, Side::Ask, dec("10000")).unwrap();
        assert_eq!(format_amount(size), "0.19000000");

        let q = quote("3", "0", "0", "5000");
        let size = max_order_size_for_quote(&q, Side::Ask, dec("10000")).unwrap();
        assert_eq!(format_amount(size), "0.47500000");
    }

    #[test]
    fn test_result_is_truncated_not_rounded() {
        // 1 / 3 * 0.95 = 0.316666..., rounding would give ...67
        let q = quote("0", "10", "1", "0");
        let size = max_order_size_for_quote(&q, Side::Bid, dec("3")).unwrap();
        assert_eq!(format_amount(size), "0.31666666");
    }

    #[test]
    fn test_zero_capacity() {
        let q = quote("0", "0", "0", "0");
        let size = max_order_size_for_quote(&q, Side::Ask, dec("1")).unwrap();
        assert_eq!(format_amount(size), "0.00000000");
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let q = quote("1", "1", "1", "1");
        for price in ["0", "-5"] {
            let err = max_order_size_for_quote(&q, Side::Bid, dec(price)).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_planner_end_to_end() {
        let broker = Arc::new(MockBroker::with_quote(quote("0", "2.0", "10000", "0")));
        let planner = CapacityPlanner::new(broker);

        let market: Market = "BTC/USD".parse().unwrap();
        let side: Side = "BID".parse().unwrap();
        let size = planner.max_order_size(&market, side, dec("10000")).await.unwrap();
        assert_eq!(size, "0.95000000");
    }

    #[tokio::test]
    async fn test_planner_propagates_remote_failure() {
        let planner = CapacityPlanner::new(Arc::new(MockBroker::default()));
        let err = planner
            .max_order_size(&Market::new("BTC/USD"), Side::Ask, dec("100"))
            .await
            .unwrap_err();
        assert!(err.is_remote());
    }
}
