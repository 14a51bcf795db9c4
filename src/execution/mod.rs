//! Execution layer - Order lifecycle observation and bulk cancellation

pub mod cancel;
pub mod watcher;

pub use cancel::{BulkCanceller, CancelOutcome};
pub use watcher::{
    OrderWatcher, StopHandle, StopSignal, WatchEvent, WatchExit, WatchHandle,
    DEFAULT_POLL_INTERVAL,
};
