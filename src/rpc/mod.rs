//! Remote calls - Deadline enforcement and the broker transport

pub mod model;
pub mod rest;

#[cfg(test)]
pub(crate) mod mock;

pub use rest::RestBroker;

use std::future::Future;
use std::time::Duration;

use crate::core::{Error, Result};

/// Per-call deadline applied to every remote request
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Run one remote call, failing with `DeadlineExceeded` if it outlives `deadline`.
pub async fn call<T, F>(method: &'static str, deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(method, ?deadline, "remote call timed out");
            Err(Error::DeadlineExceeded { method, deadline })
        }
    }
}
