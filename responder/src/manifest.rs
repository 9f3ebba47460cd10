//! Initiator manifest lookup
//!
//! The manifest is only used to pick the domain bound into `ton_proof`.
//! An unreachable or malformed manifest never fails a handshake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{ConnectError, Phase, Result};
use crate::link::{self, ConnectRequest};

/// Fields of `tonconnect-manifest.json` the responder looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub url: Option<String>,
    pub name: Option<String>,
    pub icon_url: Option<String>,
}

impl Manifest {
    /// Pick the string fields out of a manifest body
    ///
    /// Fields of any other type are treated as absent, so a bad `iconUrl`
    /// never hides a good `url`.
    pub fn from_json(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            url: text("url"),
            name: text("name"),
            icon_url: text("iconUrl"),
        }
    }
}

#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Manifest>;
}

/// Plain HTTP GET with a per-request deadline
#[derive(Debug, Clone)]
pub struct HttpManifestFetcher {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpManifestFetcher {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, url: &str) -> Result<Manifest> {
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConnectError::Timeout(Phase::Manifest)
                } else {
                    ConnectError::Other(format!("manifest request failed: {e}"))
                }
            })?;

        if response.status() != StatusCode::OK {
            return Err(ConnectError::Other(format!(
                "manifest returned HTTP {}",
                response.status().as_u16()
            )));
        }
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ConnectError::Other(format!("manifest is not valid JSON: {e}")))?;
        Ok(Manifest::from_json(&body))
    }
}

/// Domain to bind into the proof
///
/// Starts from the manifest URL's host; a manifest `url` field, when
/// fetched successfully, overrides it with its own host.
pub async fn resolve_app_domain(
    fetcher: &dyn ManifestFetcher,
    request: &ConnectRequest,
) -> String {
    let fallback = link::resolve_app_domain(request);
    let Some(manifest_url) = request.manifest_url() else {
        return fallback;
    };

    match fetcher.fetch(manifest_url).await {
        Ok(manifest) => match manifest.url.as_deref().filter(|url| !url.is_empty()) {
            Some(app_url) => link::extract_domain(app_url),
            None => fallback,
        },
        Err(err) => {
            tracing::warn!(
                manifest = manifest_url,
                error = %err,
                "manifest unavailable, keeping manifest host as app domain"
            );
            fallback
        }
    }
}
