//! Configuration - Type-safe, validated connection settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{Error, Result};
use crate::execution::DEFAULT_POLL_INTERVAL;
use crate::rpc::DEFAULT_DEADLINE;

/// Port the broker daemon listens on when the address omits one
pub const DEFAULT_RPC_PORT: u16 = 27492;

/// Connection settings for a broker daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// `host` or `host:port`
    pub address: String,

    /// Talk plain HTTP without credentials
    pub disable_auth: bool,

    /// PEM root certificate for the broker's self-signed TLS cert
    pub cert_path: Option<PathBuf>,

    /// Basic-auth username (required unless auth is disabled)
    pub username: Option<String>,

    /// Basic-auth password (required unless auth is disabled)
    pub password: Option<String>,

    /// Delay between two order polls while watching
    pub poll_interval_ms: u64,

    /// Per-call deadline for every remote request
    pub deadline_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: format!("localhost:{}", DEFAULT_RPC_PORT),
            disable_auth: false,
            cert_path: None,
            username: None,
            password: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            deadline_ms: DEFAULT_DEADLINE.as_millis() as u64,
        }
    }
}

impl BrokerConfig {
    /// Load from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Build from process environment, reading a `.env` file first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(address) = lookup("BROKER_RPC_ADDRESS") {
            config.address = address;
        }
        if let Some(flag) = lookup("BROKER_DISABLE_AUTH") {
            config.disable_auth = parse_flag("BROKER_DISABLE_AUTH", &flag)?;
        }
        config.cert_path = lookup("BROKER_RPC_CERT_PATH").map(PathBuf::from);
        config.username = lookup("BROKER_RPC_USER");
        config.password = lookup("BROKER_RPC_PASS");

        Ok(config)
    }

    /// Reject settings that would fail on first use
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::Config("address must not be empty".to_string()));
        }
        if self.deadline_ms == 0 {
            return Err(Error::Config("deadline_ms must be positive".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".to_string()));
        }
        if !self.disable_auth {
            if self.username.as_deref().unwrap_or("").is_empty() {
                return Err(Error::AuthConfigMissing("username"));
            }
            if self.password.as_deref().unwrap_or("").is_empty() {
                return Err(Error::AuthConfigMissing("password"));
            }
        }
        Ok(())
    }

    /// `host:port`, with the default port filled in
    pub fn host_port(&self) -> String {
        let address = self.address.trim();
        match address.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => address.to_string(),
            _ => format!("{}:{}", address, DEFAULT_RPC_PORT),
        }
    }

    /// Base URL of the broker's RPC gateway
    pub fn base_url(&self) -> String {
        let scheme = if self.disable_auth { "http" } else { "https" };
        format!("{}://{}", scheme, self.host_port())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(Error::Config(format!("{} must be a boolean, got {:?}", key, other))),
    }
}
