//! Wire payloads of the broker's JSON gateway

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{
    CapacityQuote, Error, Market, Order, OrderRequest, OrderStatus, Result, Side, SymbolCapacity,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct BlockOrder {
    #[serde(rename = "blockOrderId")]
    pub block_order_id: String,
    pub market: String,
    pub side: String,
    pub amount: String,
    #[serde(rename = "limitPrice")]
    pub limit_price: String,
    pub status: String,
    #[serde(rename = "fillAmount", default, skip_serializing_if = "Option::is_none")]
    pub fill_amount: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlockOrdersResponse {
    #[serde(rename = "blockOrders", default)]
    pub block_orders: Vec<BlockOrder>,
}

#[derive(Debug, Serialize)]
pub struct CreateBlockOrderRequest {
    pub market: String,
    pub side: String,
    pub amount: String,
    #[serde(rename = "limitPrice")]
    pub limit_price: String,
    #[serde(rename = "timeInForce")]
    pub time_in_force: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockOrderResponse {
    #[serde(rename = "blockOrderId")]
    pub block_order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WireSymbolCapacity {
    pub symbol: String,
    #[serde(rename = "availableSendCapacity")]
    pub available_send_capacity: String,
    #[serde(rename = "availableReceiveCapacity")]
    pub available_receive_capacity: String,
}

#[derive(Debug, Deserialize)]
pub struct TradingCapacitiesResponse {
    #[serde(rename = "baseSymbolCapacities")]
    pub base_symbol_capacities: WireSymbolCapacity,
    #[serde(rename = "counterSymbolCapacities")]
    pub counter_symbol_capacities: WireSymbolCapacity,
}

fn decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|e| Error::Decode(format!("{} {:?} is not a decimal: {}", field, value, e)))
}

impl TryFrom<BlockOrder> for Order {
    type Error = Error;

    fn try_from(wire: BlockOrder) -> Result<Self> {
        let side = Side::from_str(&wire.side)
            .map_err(|_| Error::Decode(format!("unknown side {:?}", wire.side)))?;
        let fill_amount = match wire.fill_amount.as_deref() {
            Some(raw) if !raw.trim().is_empty() => decimal("fillAmount", raw)?,
            _ => Decimal::ZERO,
        };

        Ok(Order {
            market: Market::new(wire.market),
            side,
            amount: decimal("amount", &wire.amount)?,
            limit_price: decimal("limitPrice", &wire.limit_price)?,
            status: OrderStatus::from_wire(&wire.status),
            fill_amount,
            id: wire.block_order_id,
        })
    }
}

impl From<&OrderRequest> for CreateBlockOrderRequest {
    fn from(request: &OrderRequest) -> Self {
        Self {
            market: request.market.to_string(),
            side: request.side.to_string(),
            amount: request.amount.to_string(),
            limit_price: request.limit_price.to_string(),
            time_in_force: request.time_in_force.to_string(),
        }
    }
}

impl TryFrom<WireSymbolCapacity> for SymbolCapacity {
    type Error = Error;

    fn try_from(wire: WireSymbolCapacity) -> Result<Self> {
        Ok(SymbolCapacity {
            available_send_capacity: decimal(
                "availableSendCapacity",
                &wire.available_send_capacity,
            )?,
            available_receive_capacity: decimal(
                "availableReceiveCapacity",
                &wire.available_receive_capacity,
            )?,
            symbol: wire.symbol,
        })
    }
}

impl TradingCapacitiesResponse {
    pub fn into_quote(self, market: &Market) -> Result<CapacityQuote> {
        Ok(CapacityQuote {
            market: market.clone(),
            base: self.base_symbol_capacities.try_into()?,
            counter: self.counter_symbol_capacities.try_into()?,
        })
    }
}
