//! Order lifecycle watcher - Polls an order until it reaches a terminal state

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::{Error, FillEvent, Order, OrderService, OrderStatus, Result, TerminalStatus};
use crate::rpc::{self, DEFAULT_DEADLINE};

/// Default delay between two polls of the same order
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5_000);

/// Owner side of a stop signal
#[derive(Debug)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    /// Ask the watch to end before its next poll
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

/// Watch side of a stop signal, checked before every poll
#[derive(Debug, Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub fn pair() -> (StopHandle, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (StopHandle(tx), StopSignal(rx))
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        StopSignal(rx)
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once stop was requested. Pends forever if the handle is gone.
    pub async fn stopped(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// How a watch loop ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    Terminal(TerminalStatus),
    Stopped,
}

/// Notification delivered by a streaming watch
#[derive(Debug)]
pub enum WatchEvent {
    Fill(FillEvent),
    Done(TerminalStatus),
    Error(Error),
}

/// Polls orders through an [`OrderService`]. Cheap to clone; each watch keeps
/// its own fill baseline.
#[derive(Clone)]
pub struct OrderWatcher {
    orders: Arc<dyn OrderService>,
    deadline: Duration,
}

impl OrderWatcher {
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

    /// Shared polling core of the blocking and streaming watches.
    ///
    /// Calls `on_fill` for every poll whose fill amount exceeds the previous
    /// one, before acting on the status. FAILED ends with `OrderFailed`.
    pub async fn run<F>(
        &self,
        order_id: &str,
        interval: Duration,
        mut stop: StopSignal,
        mut on_fill: F,
    ) -> Result<WatchExit>
    where
        F: FnMut(FillEvent) + Send,
    {
        let mut baseline = Decimal::ZERO;

        loop {
            if stop.is_stopped() {
                debug!(order_id, "watch stopped before poll");
                return Ok(WatchExit::Stopped);
            }

            let order = tokio::select! {
                biased;
                _ = stop.stopped() => return Ok(WatchExit::Stopped),
                order = rpc::call(
                    "getBlockOrder",
                    self.deadline,
                    self.orders.get_order(order_id, self.deadline),
                ) => order?,
            };

            if let Some(fill) = fill_since(&order, &mut baseline) {
                debug!(order_id, amount = %fill.amount, total = %fill.fill_amount, "order fill");
                on_fill(fill);
            }

            match order.status {
                OrderStatus::Failed => {
                    warn!(order_id, "order failed");
                    return Err(Error::OrderFailed(order_id.to_string()));
                }
                OrderStatus::Complete => {
                    info!(order_id, "order complete");
                    return Ok(WatchExit::Terminal(TerminalStatus::Complete));
                }
                OrderStatus::Cancelled => {
                    info!(order_id, "order cancelled");
                    return Ok(WatchExit::Terminal(TerminalStatus::Cancelled));
                }
                OrderStatus::Active | OrderStatus::Other(_) => {
                    debug!(order_id, status = %order.status, "order still open");
                }
            }

            tokio::select! {
                biased;
                _ = stop.stopped() => return Ok(WatchExit::Stopped),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Wait for `order_id` to finish. Drop the future to abandon the watch.
    pub async fn watch(&self, order_id: &str, interval: Duration) -> Result<TerminalStatus> {
        self.watch_until(order_id, interval, StopSignal::never()).await
    }

    /// Like [`watch`](Self::watch), failing with `WatchStopped` if `stop` fires first.
    pub async fn watch_until(
        &self,
        order_id: &str,
        interval: Duration,
        stop: StopSignal,
    ) -> Result<TerminalStatus> {
        match self.run(order_id, interval, stop, |_| {}).await? {
            WatchExit::Terminal(status) => Ok(status),
            WatchExit::Stopped => Err(Error::WatchStopped(order_id.to_string())),
        }
    }

    /// Spawn a watch that reports fills, then exactly one `Done` or `Error`,
    /// unless it is stopped first. Must be called within a Tokio runtime.
    pub fn subscribe(&self, order_id: impl Into<String>, interval: Duration) -> WatchHandle {
        let order_id = order_id.into();
        let (events_tx, events_rx) = flume::unbounded();
        let (stop_handle, stop) = StopSignal::pair();

        let watcher = self.clone();
        let id = order_id.clone();
        let task = tokio::spawn(async move {
            let fills = events_tx.clone();
            let result = watcher
                .run(&id, interval, stop, move |fill| {
                    let _ = fills.send(WatchEvent::Fill(fill));
                })
                .await;

            let last = match result {
                Ok(WatchExit::Terminal(status)) => WatchEvent::Done(status),
                Ok(WatchExit::Stopped) => {
                    debug!(order_id = %id, "streaming watch stopped");
                    return;
                }
                Err(e) => WatchEvent::Error(e),
            };
            let _ = events_tx.send(last);
        });

        WatchHandle {
            order_id,
            events: events_rx,
            stop: stop_handle,
            task,
        }
    }
}

/// Compute the fill since the last poll, advancing `baseline`.
fn fill_since(order: &Order, baseline: &mut Decimal) -> Option<FillEvent> {
    if order.fill_amount < *baseline {
        warn!(
            order_id = %order.id,
            previous = %baseline,
            reported = %order.fill_amount,
            "fill amount went backwards, ignoring"
        );
        return None;
    }
    if order.fill_amount == *baseline {
        return None;
    }

    let amount = order.fill_amount - *baseline;
    *baseline = order.fill_amount;

    Some(FillEvent {
        order_id: order.id.clone(),
        amount,
        price: order.limit_price,
        fill_amount: order.fill_amount,
        observed_at: Utc::now(),
    })
}

/// Subscription to a running streaming watch. Dropping it stops the watch.
pub struct WatchHandle {
    order_id: String,
    events: flume::Receiver<WatchEvent>,
    stop: StopHandle,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Next event, or `None` once the watch has ended and every event was read.
    pub async fn next(&self) -> Option<WatchEvent> {
        self.events.recv_async().await.ok()
    }

    /// Raw event channel, for callers that select over several sources
    pub fn events(&self) -> &flume::Receiver<WatchEvent> {
        &self.events
    }

    /// Stop polling. Events already produced remain readable.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::{dec, order, MockBroker};

    const FAST: Duration = Duration::from_millis(1);

    fn watcher(broker: &Arc<MockBroker>) -> OrderWatcher {
        OrderWatcher::new(broker.clone())
    }

    #[tokio::test]
    async fn test_emits_only_fill_deltas() {
        let broker = Arc::new(MockBroker::with_polls(vec![
            Ok(order("o1", OrderStatus::Active, "0")),
            Ok(order("o1", OrderStatus::Active, "0.3")),
            Ok(order("o1", OrderStatus::Active, "0.3")),
            Ok(order("o1", OrderStatus::Complete, "0.7")),
        ]));

        let mut fills = Vec::new();
        let exit = watcher(&broker)
            .run("o1", FAST, StopSignal::never(), |fill| fills.push(fill))
            .await
            .unwrap();

        assert_eq!(exit, WatchExit::Terminal(TerminalStatus::Complete));
        let deltas: Vec<Decimal> = fills.iter().map(|f| f.amount).collect();
        assert_eq!(deltas, vec![dec("0.3"), dec("0.4")]);
        assert_eq!(fills[1].fill_amount, dec("0.7"));
        assert_eq!(fills[1].price, dec("10000"));
        assert_eq!(broker.polls_made(), 4);
    }

    #[tokio::test]
    async fn test_failed_order_stops_polling() {
        let broker = Arc::new(MockBroker::with_polls(vec![
            Ok(order("o2", OrderStatus::Active, "0")),
            Ok(order("o2", OrderStatus::Failed, "0")),
            Ok(order("o2", OrderStatus::Active, "0")),
        ]));

        let err = watcher(&broker).watch("o2", FAST).await.unwrap_err();
        assert!(matches!(err, Error::OrderFailed(ref id) if id == "o2"));
        assert_eq!(broker.polls_made(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_is_terminal() {
        let broker = Arc::new(MockBroker::with_polls(vec![
            Ok(order("o3", OrderStatus::Other("PENDING".to_string()), "0")),
            Ok(order("o3", OrderStatus::Cancelled, "0.1")),
        ]));

        let status = watcher(&broker).watch("o3", FAST).await.unwrap();
        assert_eq!(status, TerminalStatus::Cancelled);
        assert_eq!(broker.polls_made(), 2);
    }

    #[tokio::test]
    async fn test_fill_in_final_poll_is_reported() {
        let broker = Arc::new(MockBroker::with_polls(vec![Ok(order(
            "o4",
            OrderStatus::Complete,
            "1",
        ))]));

        let mut fills = Vec::new();
        watcher(&broker)
            .run("o4", FAST, StopSignal::never(), |fill| fills.push(fill.amount))
            .await
            .unwrap();
        assert_eq!(fills, vec![dec("1")]);
    }

    #[tokio::test]
    async fn test_fill_regression_is_ignored() {
        let broker = Arc::new(MockBroker::with_polls(vec![
            Ok(order("o5", OrderStatus::Active, "0.5")),
            Ok(order("o5", OrderStatus::Active, "0.2")),
            Ok(order("o5", OrderStatus::Complete, "0.6")),
        ]));

        let mut fills = Vec::new();
        watcher(&broker)
            .run("o5", FAST, StopSignal::never(), |fill| fills.push(fill.amount))
            .await
            .unwrap();
        assert_eq!(fills, vec![dec("0.5"), dec("0.1")]);
    }

    #[tokio::test]
    async fn test_poll_error_propagates() {
        let broker = Arc::new(MockBroker::with_polls(vec![
            Ok(order("o6", OrderStatus::Active, "0")),
            Err(Error::RemoteUnavailable("broker restarting".to_string())),
        ]));

        let err = watcher(&broker).watch("o6", FAST).await.unwrap_err();
        assert!(matches!(err, Error::RemoteUnavailable(_)));
        assert_eq!(broker.polls_made(), 2);
    }

    #[tokio::test]
    async fn test_stop_before_first_poll() {
        let broker = Arc::new(MockBroker::default());
        let (handle, stop) = StopSignal::pair();
        handle.stop();

        let err = watcher(&broker)
            .watch_until("o7", FAST, stop)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WatchStopped(_)));
        assert_eq!(broker.polls_made(), 0);
    }

    #[tokio::test]
    async fn test_stop_between_polls() {
        let broker = Arc::new(MockBroker::with_polls(vec![
            Ok(order("o8", OrderStatus::Active, "0")),
            Ok(order("o8", OrderStatus::Active, "0")),
        ]));
        let (handle, stop) = StopSignal::pair();

        let w = watcher(&broker);
        let task = tokio::spawn(async move {
            w.run("o8", Duration::from_secs(60), stop, |_| {}).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();

        let exit = task.await.unwrap().unwrap();
        assert_eq!(exit, WatchExit::Stopped);
        assert_eq!(broker.polls_made(), 1);
    }

    #[tokio::test]
    async fn test_streaming_watch_events() {
        let broker = Arc::new(MockBroker::with_polls(vec![
            Ok(order("o9", OrderStatus::Active, "0.3")),
            Ok(order("o9", OrderStatus::Complete, "1")),
        ]));

        let handle = watcher(&broker).subscribe("o9", FAST);
        assert_eq!(handle.order_id(), "o9");

        let mut fills = Vec::new();
        let mut done = None;
        while let Some(event) = handle.next().await {
            match event {
                WatchEvent::Fill(fill) => fills.push(fill.amount),
                WatchEvent::Done(status) => done = Some(status),
                WatchEvent::Error(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(fills, vec![dec("0.3"), dec("0.7")]);
        assert_eq!(done, Some(TerminalStatus::Complete));
    }

    #[tokio::test]
    async fn test_streaming_watch_reports_failure_as_event() {
        let broker = Arc::new(MockBroker::with_polls(vec![Ok(order(
            "o10",
            OrderStatus::Failed,
            "0",
        ))]));

        let handle = watcher(&broker).subscribe("o10", FAST);
        match handle.next().await {
            Some(WatchEvent::Error(Error::OrderFailed(id))) => assert_eq!(id, "o10"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(handle.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_watch() {
        let broker = Arc::new(MockBroker::with_polls(vec![
            Ok(order("o11", OrderStatus::Active, "0")),
            Ok(order("o11", OrderStatus::Active, "0")),
        ]));

        let handle = watcher(&broker).subscribe("o11", Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(broker.polls_made(), 1);
    }

    #[tokio::test]
    async fn test_hung_poll_hits_deadline() {
        let broker = Arc::new(
            MockBroker::with_polls(vec![Ok(order("o12", OrderStatus::Active, "0"))])
                .with_poll_delay(Duration::from_secs(30)),
        );
        let w = watcher(&broker).with_deadline(Duration::from_millis(20));

        let started = std::time::Instant::now();
        let err = w.watch("o12", FAST).await.unwrap_err();

        assert!(matches!(err, Error::DeadlineExceeded { method: "getBlockOrder", .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(broker.polls_made(), 1);
    }
}
