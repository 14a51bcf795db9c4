//! Bulk cancellation of a market's active orders

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::core::{Market, OrderService, OrderStatus, Result};
use crate::rpc::{self, DEFAULT_DEADLINE};

/// Result of cancelling one order
#[derive(Debug)]
pub struct CancelOutcome {
    pub order_id: String,
    pub result: Result<()>,
}

impl CancelOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Lists a market's ACTIVE orders and cancels all of them concurrently
#[derive(Clone)]
pub struct BulkCanceller {
    orders: Arc<dyn OrderService>,
    deadline: Duration,
}

impl BulkCanceller {
    pub fn new(orders: Arc<dyn OrderService>) -> Self {
        Self {
            orders,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Cancel every ACTIVE order, failing if any single cancellation failed.
    ///
    /// All requests are allowed to settle before the first failure is returned.
    pub async fn cancel_all(&self, market: &Market) -> Result<Vec<String>> {
        let outcomes = self.cancel_all_settled(market).await?;

        let mut cancelled = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for outcome in outcomes {
            match outcome.result {
                Ok(()) => cancelled.push(outcome.order_id),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(_) => {}
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(cancelled),
        }
    }

    /// Cancel every ACTIVE order and report each outcome. Only the listing
    /// call can fail the whole operation.
    pub async fn cancel_all_settled(&self, market: &Market) -> Result<Vec<CancelOutcome>> {
        let orders = rpc::call(
            "getBlockOrders",
            self.deadline,
            self.orders.get_orders(market, self.deadline),
        )
        .await?;

        let active: Vec<String> = orders
            .into_iter()
            .filter(|o| o.status == OrderStatus::Active)
            .map(|o| o.id)
            .collect();

        info!(%market, count = active.len(), "cancelling active orders");

        let outcomes = join_all(active.into_iter().map(|order_id| async move {
            let result = rpc::call(
                "cancelBlockOrder",
                self.deadline,
                self.orders.cancel_order(&order_id, self.deadline),
            )
            .await;

            if let Err(e) = &result {
                warn!(%order_id, error = %e, "cancel failed");
            }
            CancelOutcome { order_id, result }
        }))
        .await;

        Ok(outcomes)
    }
}
