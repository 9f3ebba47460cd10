//! Bridge relay transport
//!
//! The bridge only forwards opaque base64 ciphertext between client ids.
//! Delivery is retried with exponential backoff; only the error of the
//! final attempt is reported.

use std::future::Future;
use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{ConnectError, Phase, Result};

/// Lifetime of a message on the bridge, in seconds
pub const MESSAGE_TTL_SECS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Pause after failed attempt number `attempt` (1-based): `base * 2^(attempt-1)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Run `operation` until it succeeds or the policy is exhausted
///
/// The closure receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(attempt, error = %err, ?delay, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// HTTP client for `POST {bridge}/message`
#[derive(Debug, Clone)]
pub struct RelayClient {
    endpoint: String,
    http: reqwest::Client,
    timeout: Duration,
    policy: RetryPolicy,
}

impl RelayClient {
    pub fn new(
        endpoint: &str,
        http: reqwest::Client,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            http,
            timeout,
            policy,
        }
    }

    pub fn message_url(&self) -> String {
        format!("{}/message", self.endpoint)
    }

    /// Deliver `ciphertext_b64` from `client_id` to `peer_id`
    pub async fn deliver(
        &self,
        client_id: &str,
        peer_id: &str,
        ciphertext_b64: &str,
    ) -> Result<()> {
        retry(&self.policy, move |attempt| {
            tracing::debug!(attempt, to = peer_id, "posting message to bridge");
            self.post_once(client_id, peer_id, ciphertext_b64)
        })
        .await
    }

    async fn post_once(&self, client_id: &str, peer_id: &str, ciphertext_b64: &str) -> Result<()> {
        let ttl = MESSAGE_TTL_SECS.to_string();
        let response = self
            .http
            .post(self.message_url())
            .query(&[("client_id", client_id), ("to", peer_id), ("ttl", ttl.as_str())])
            .header(CONTENT_TYPE, "text/plain")
            .timeout(self.timeout)
            .body(ciphertext_b64.to_owned())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ConnectError::Relay {
            status: Some(status.as_u16()),
            body,
        })
    }
}

fn transport_error(err: reqwest::Error) -> ConnectError {
    if err.is_timeout() {
        ConnectError::Timeout(Phase::Relay)
    } else {
        ConnectError::Relay {
            status: None,
            body: err.to_string(),
        }
    }
}
