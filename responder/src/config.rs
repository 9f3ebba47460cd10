//! Responder configuration
//!
//! Everything the responder needs is passed in explicitly; the library
//! never reads the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::allowlist::AllowedDomains;
use crate::error::{ConnectError, Result};
use crate::event::DeviceInfo;
use crate::relay::RetryPolicy;

pub const DEFAULT_BRIDGE_URL: &str = "https://bridge.tonapi.io/bridge";

/// Global id of TON mainnet as reported in `ton_addr`
pub const MAINNET_NETWORK_ID: &str = "-239";

/// Global id of TON testnet
pub const TESTNET_NETWORK_ID: &str = "-3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Bridge base URL; messages go to `{bridge_url}/message`
    pub bridge_url: String,
    /// Bound on account initialization
    pub connect_timeout_secs: u64,
    /// Bound on each manifest fetch and each relay attempt
    pub request_timeout_secs: u64,
    /// Initiator domains to accept; `None` accepts all
    pub allowed_domains: Option<Vec<String>>,
    pub network: String,
    pub device: DeviceInfo,
    pub retry: RetryPolicy,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE_URL.to_owned(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            allowed_domains: None,
            network: MAINNET_NETWORK_ID.to_owned(),
            device: DeviceInfo::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ResponderConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Normalized allow-list, `None` when unrestricted
    pub fn allowlist(&self) -> Option<AllowedDomains> {
        let raw = self.allowed_domains.as_ref()?;
        let built = AllowedDomains::build(raw);
        if built.is_none() && !raw.is_empty() {
            tracing::warn!(
                entries = raw.len(),
                "no allowed domain survived normalization; allow-list disabled"
            );
        }
        built
    }

    /// Reject settings the responder cannot run with
    pub fn validate(&self) -> Result<()> {
        let bridge = Url::parse(&self.bridge_url)
            .map_err(|e| ConnectError::InvalidConfig(format!("bridge_url: {e}")))?;
        if !matches!(bridge.scheme(), "http" | "https") {
            return Err(ConnectError::InvalidConfig(format!(
                "bridge_url must be http(s), got {}",
                bridge.scheme()
            )));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConnectError::InvalidConfig("timeouts must be non-zero".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConnectError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
