//! Core types - Strong typing for safety

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Trading pair (e.g., "BTC/USD"), base symbol first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Market(String);

impl Market {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol being bought or sold
    pub fn base(&self) -> &str {
        self.0.split_once('/').map(|(base, _)| base).unwrap_or(&self.0)
    }

    /// Symbol the base is priced in
    pub fn counter(&self) -> &str {
        self.0.split_once('/').map(|(_, counter)| counter).unwrap_or("")
    }
}

impl FromStr for Market {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((base, counter))
                if !base.is_empty() && !counter.is_empty() && !counter.contains('/') =>
            {
                Ok(Market::new(s))
            }
            _ => Err(Error::InvalidArgument(format!(
                "market must look like BASE/COUNTER, got {:?}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buying base, paying counter
    Bid,
    /// Selling base, receiving counter
    Ask,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "BID",
            Side::Ask => "ASK",
        }
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("BID") {
            Ok(Side::Bid)
        } else if s.eq_ignore_ascii_case("ASK") {
            Ok(Side::Ask)
        } else {
            Err(Error::InvalidArgument(format!(
                "side must be one of BID, ASK, got {:?}",
                s
            )))
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order status as reported by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Complete,
    Cancelled,
    Failed,
    /// Any other broker-defined value, kept verbatim and treated as non-terminal
    Other(String),
}

impl OrderStatus {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "ACTIVE" => OrderStatus::Active,
            "COMPLETED" | "COMPLETE" => OrderStatus::Complete,
            "CANCELLED" => OrderStatus::Cancelled,
            "FAILED" => OrderStatus::Failed,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Complete | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Active => write!(f, "ACTIVE"),
            OrderStatus::Complete => write!(f, "COMPLETE"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Failed => write!(f, "FAILED"),
            OrderStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Successful end of an order's lifecycle. FAILED is reported as an error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TerminalStatus {
    Complete,
    Cancelled,
}

impl From<TerminalStatus> for OrderStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Complete => OrderStatus::Complete,
            TerminalStatus::Cancelled => OrderStatus::Cancelled,
        }
    }
}

impl std::fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        OrderStatus::from(*self).fmt(f)
    }
}

/// Block order, as last fetched from the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub market: Market,
    pub side: Side,
    pub amount: Decimal,
    pub limit_price: Decimal,
    pub status: OrderStatus,
    /// Cumulative amount executed so far
    pub fill_amount: Decimal,
}

/// Only good-til-cancelled orders are placed by this client
pub const TIME_IN_FORCE_GTC: &str = "GTC";

/// New order submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub market: Market,
    pub side: Side,
    pub amount: Decimal,
    pub limit_price: Decimal,
    pub time_in_force: &'static str,
}

impl OrderRequest {
    pub fn limit(market: Market, side: Side, amount: Decimal, limit_price: Decimal) -> Self {
        Self {
            market,
            side,
            amount,
            limit_price,
            time_in_force: TIME_IN_FORCE_GTC,
        }
    }
}

/// Capacity of one symbol inside a market's trading channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolCapacity {
    pub symbol: String,
    pub available_send_capacity: Decimal,
    pub available_receive_capacity: Decimal,
}

/// Fresh snapshot of both sides' capacity for a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityQuote {
    pub market: Market,
    pub base: SymbolCapacity,
    pub counter: SymbolCapacity,
}

/// Incremental fill observed between two polls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillEvent {
    pub order_id: String,
    /// Newly filled amount since the previous poll
    pub amount: Decimal,
    pub price: Decimal,
    /// Cumulative fill amount after this event
    pub fill_amount: Decimal,
    pub observed_at: DateTime<Utc>,
}
