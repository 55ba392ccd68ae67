use std::env;

use url::Url;

use crate::error::ConfigError;
use crate::reconnect::ReconnectPolicy;

pub const DEFAULT_SIGNALING_URL: &str = "ws://127.0.0.1:8080";
pub const SIGNALING_URL_ENV: &str = "SIGNALING_URL";

/// Where the relay server lives and how to retry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingConfig {
    address: Url,
    reconnect: ReconnectPolicy,
}

impl SignalingConfig {
    /// Validate a relay address. `ws` is always accepted, `wss` only when
    /// built with the `tls` feature.
    pub fn new(address: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(address).map_err(|source| ConfigError::InvalidAddress {
            address: address.to_string(),
            source,
        })?;

        match url.scheme() {
            "ws" => {}
            "wss" if cfg!(feature = "tls") => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }

        Ok(Self {
            address: url,
            reconnect: ReconnectPolicy::default(),
        })
    }

    /// Read the address from `SIGNALING_URL`, falling back to the local default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let address =
            env::var(SIGNALING_URL_ENV).unwrap_or_else(|_| DEFAULT_SIGNALING_URL.to_string());
        Self::new(&address)
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn address(&self) -> &str {
        self.address.as_str()
    }

    pub fn reconnect(&self) -> ReconnectPolicy {
        self.reconnect
    }
}
