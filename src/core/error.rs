//! Error handling - One flat hierarchy for every client operation

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// broker-client error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied a value outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The watched order reached the FAILED terminal state
    #[error("Order {0} failed")]
    OrderFailed(String),

    /// The broker answered with an error status
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Network/IO errors
    #[error("Network: {0}")]
    Network(#[from] reqwest::Error),

    /// A remote call did not finish within its deadline
    #[error("Deadline of {deadline:?} exceeded calling {method}")]
    DeadlineExceeded {
        method: &'static str,
        deadline: Duration,
    },

    /// Authentication is enabled but a credential is absent
    #[error("Authentication is enabled but {0} is missing")]
    AuthConfigMissing(&'static str),

    /// Configuration errors
    #[error("Config: {0}")]
    Config(String),

    /// A broker payload could not be turned into a domain value
    #[error("Decode: {0}")]
    Decode(String),

    /// Serialization
    #[error("Serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The owner of a watch stopped it before a terminal state
    #[error("Watch on order {0} was stopped")]
    WatchStopped(String),
}

impl Error {
    /// True for failures raised by the transport rather than by the caller's input.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::RemoteUnavailable(_) | Error::Network(_) | Error::DeadlineExceeded { .. }
        )
    }
}
