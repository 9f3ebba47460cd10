//! Connect orchestrator
//!
//! [`Responder::connect`] runs one full handshake for a `tc://` link:
//! parse, allow-list gate, account init, app-domain resolution, channel
//! derivation, event assembly, encryption and relay delivery. Failures never
//! escape as errors; they are folded into a [`ConnectResult`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::account::{Account, KeyMaterial, KeyedAccount};
use crate::address::AccountAddress;
use crate::allowlist::{self, AllowedDomains};
use crate::b64;
use crate::config::ResponderConfig;
use crate::error::{ConnectError, ErrorKind, Phase, Result};
use crate::event::{ConnectEvent, WalletInfoItem};
use crate::link::{self, ConnectRequest};
use crate::manifest::{self, HttpManifestFetcher, ManifestFetcher};
use crate::proof;
use crate::relay::RelayClient;
use crate::session::{self, EncryptedChannel, SessionKeyPair, KEY_SIZE};

// ============================================================================
// Result types
// ============================================================================

/// Final outcome of a connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Connected,
    ConnectFailed,
    Forbidden,
}

/// Summary of a delivered connect event. The cleartext payload is not echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectData {
    pub id: u64,
    pub event: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectResult {
    #[serde(rename = "code")]
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ConnectData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ConnectResult {
    pub fn connected(data: ConnectData) -> Self {
        Self {
            outcome: Outcome::Connected,
            data: Some(data),
            error_code: None,
            error_message: None,
        }
    }

    pub fn forbidden() -> Self {
        Self {
            outcome: Outcome::Forbidden,
            data: None,
            error_code: Some(ErrorKind::Forbidden),
            error_message: Some(ConnectError::Forbidden.to_string()),
        }
    }

    pub fn failed(err: &ConnectError) -> Self {
        Self {
            outcome: Outcome::ConnectFailed,
            data: None,
            error_code: Some(err.kind()),
            error_message: Some(err.to_string()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.outcome == Outcome::Connected
    }
}

// ============================================================================
// Responder
// ============================================================================

/// State guarded by the handshake lock
struct HandshakeState {
    account: Box<dyn Account>,
    initialized: bool,
    /// Channel of the current or last successful handshake
    channel: Option<EncryptedChannel>,
    /// Outbound HTTP clients; `None` once closed
    transport: Option<Transport>,
}

impl HandshakeState {
    fn transport(&self) -> Result<&Transport> {
        self.transport
            .as_ref()
            .ok_or_else(|| ConnectError::Other("responder is closed".into()))
    }
}

struct Transport {
    relay: RelayClient,
    manifests: Arc<dyn ManifestFetcher>,
}

/// Headless TON Connect wallet endpoint
///
/// One instance owns one ephemeral session keypair and runs at most one
/// handshake at a time.
pub struct Responder {
    config: ResponderConfig,
    allowlist: Option<AllowedDomains>,
    keys: SessionKeyPair,
    state: Mutex<HandshakeState>,
    last_event_id: AtomicU64,
    closed: AtomicBool,
}

impl Responder {
    /// Build a responder around `account`
    ///
    /// The account is not initialized here; that happens on the first
    /// handshake that gets past the allow-list.
    pub fn new(config: ResponderConfig, account: Box<dyn Account>) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ConnectError::InvalidConfig(format!("http client: {e}")))?;
        let relay = RelayClient::new(
            &config.bridge_url,
            http.clone(),
            config.request_timeout(),
            config.retry,
        );
        let manifests = Arc::new(HttpManifestFetcher::new(http, config.request_timeout()));

        Ok(Self {
            allowlist: config.allowlist(),
            keys: SessionKeyPair::generate(),
            state: Mutex::new(HandshakeState {
                account,
                initialized: false,
                channel: None,
                transport: Some(Transport { relay, manifests }),
            }),
            last_event_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            config,
        })
    }

    /// Responder backed by a [`KeyedAccount`] built from a 24-word mnemonic
    ///
    /// Fails with `AccountNotConfigured` when `mnemonic` is blank.
    pub fn from_mnemonic(
        config: ResponderConfig,
        mnemonic: &str,
        address: &str,
        state_init: &str,
    ) -> Result<Self> {
        let material = KeyMaterial::mnemonic(mnemonic)?;
        let account = KeyedAccount::new(material, address, state_init)?;
        Self::new(config, Box::new(account))
    }

    /// Replace the HTTP manifest fetcher
    pub fn with_manifest_fetcher(mut self, fetcher: Arc<dyn ManifestFetcher>) -> Self {
        if let Some(transport) = self.state.get_mut().transport.as_mut() {
            transport.manifests = fetcher;
        }
        self
    }

    /// Use a fixed session keypair instead of a random one
    pub fn with_session_keys(mut self, keys: SessionKeyPair) -> Self {
        self.keys = keys;
        self
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    pub fn allowlist(&self) -> Option<&AllowedDomains> {
        self.allowlist.as_ref()
    }

    /// Our id on the bridge: lowercase hex of the session public key
    pub fn client_id(&self) -> String {
        self.keys.client_id()
    }

    /// Run one handshake for `link`
    pub async fn connect(&self, link: &str) -> ConnectResult {
        let started = Instant::now();

        let request = match link::parse(link) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(error = %err, "rejecting link");
                return ConnectResult::failed(&err);
            }
        };

        if !self.domain_permitted(&request) {
            tracing::info!(
                manifest = request.manifest_url().unwrap_or_default(),
                "initiator domain not in allow-list"
            );
            return ConnectResult::forbidden();
        }

        match self.handshake(&request).await {
            Ok(event) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::info!(id = event.id, elapsed_ms, "connect event delivered");
                ConnectResult::connected(ConnectData {
                    id: event.id,
                    event: event.event,
                    elapsed_ms,
                })
            }
            Err(err) => {
                tracing::warn!(kind = ?err.kind(), error = %err, "connect failed");
                ConnectResult::failed(&err)
            }
        }
    }

    /// Derive and store the channel bound to the initiator `session_id`
    pub async fn prepare_connection(&self, session_id: &str) -> Result<()> {
        let mut guard = self.state.lock().await;
        bind_channel(&self.keys, &mut guard, session_id).map(|_| ())
    }

    /// Peer key of the live channel, if any
    pub async fn channel_peer(&self) -> Option<[u8; KEY_SIZE]> {
        let guard = self.state.lock().await;
        guard.channel.as_ref().map(|channel| *channel.peer_public_key())
    }

    /// Release the account and the HTTP clients; a shutdown that overruns
    /// `request_timeout` is logged and otherwise ignored. Calling it again is
    /// a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let timeout = self.config.request_timeout();
        let mut guard = self.state.lock().await;
        guard.channel = None;
        guard.transport = None;
        match tokio::time::timeout(timeout, guard.account.close(timeout)).await {
            Ok(Ok(())) => tracing::debug!("account closed"),
            Ok(Err(err)) => tracing::warn!(error = %err, "account close failed"),
            Err(_) => {
                tracing::warn!(phase = %Phase::Shutdown, ?timeout, "account close timed out")
            }
        }
        guard.initialized = false;
    }

    #[cfg(test)]
    pub(crate) async fn holds_transport(&self) -> bool {
        self.state.lock().await.transport.is_some()
    }

    fn domain_permitted(&self, request: &ConnectRequest) -> bool {
        let Some(allowed) = self.allowlist.as_ref() else {
            return true;
        };
        let domain = link::resolve_app_domain(request);
        !domain.is_empty() && allowlist::is_allowed(Some(allowed), &domain)
    }

    /// Steps that run under the handshake lock
    async fn handshake(&self, request: &ConnectRequest) -> Result<ConnectEvent> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectError::Other("responder is closed".into()));
        }
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let result = self.run_locked(state, request).await;
        if result.is_err() {
            state.channel = None;
        }
        result
    }

    async fn run_locked(
        &self,
        state: &mut HandshakeState,
        request: &ConnectRequest,
    ) -> Result<ConnectEvent> {
        let manifests = Arc::clone(&state.transport()?.manifests);

        if !state.initialized {
            tracing::debug!("initializing account");
            let timeout = self.config.connect_timeout();
            tokio::time::timeout(timeout, state.account.init(timeout))
                .await
                .map_err(|_| ConnectError::Timeout(Phase::AccountInit))??;
            state.initialized = true;
        }

        if request.items.is_empty() {
            return Err(ConnectError::NoRequestItems);
        }

        let app_domain = manifest::resolve_app_domain(manifests.as_ref(), request).await;
        tracing::debug!(app_domain = %app_domain, "app domain resolved");

        let peer = bind_channel(&self.keys, state, &request.session_id)?;

        let account = state.account.as_ref();
        let address: AccountAddress = account.address()?.parse()?;
        let wallet = WalletInfoItem {
            address: address.to_raw(),
            network: self.config.network.clone(),
            public_key: hex::encode(account.public_key()?),
            wallet_state_init: b64::encode(&account.serialized_state()?),
        };
        let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let proof = proof::build(request, &app_domain, timestamp, &address, account)?;
        let event = ConnectEvent::connect(
            self.next_event_id(),
            wallet,
            proof,
            self.config.device.clone(),
        );

        let channel = state
            .channel
            .as_ref()
            .filter(|channel| channel.is_bound_to(&peer))
            .ok_or_else(|| {
                ConnectError::ChannelDerivationFailed("no channel for initiator".into())
            })?;
        let sealed = b64::encode(&channel.encrypt(&event)?);

        tracing::debug!(id = event.id, "delivering connect event");
        state
            .transport()?
            .relay
            .deliver(&self.keys.client_id(), &request.session_id, &sealed)
            .await?;
        Ok(event)
    }

    /// Wall-clock milliseconds, bumped to stay strictly increasing
    fn next_event_id(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let previous = self
            .last_event_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

fn bind_channel(
    keys: &SessionKeyPair,
    state: &mut HandshakeState,
    session_id: &str,
) -> Result<[u8; KEY_SIZE]> {
    state.channel = None;
    let peer = session::decode_peer_id(session_id)?;
    state.channel = Some(EncryptedChannel::derive(keys, &peer)?);
    Ok(peer)
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("client_id", &self.client_id())
            .field("bridge_url", &self.config.bridge_url)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Build a responder, run a single handshake, and close it again
pub async fn connect_once(
    config: ResponderConfig,
    account: Box<dyn Account>,
    link: &str,
) -> ConnectResult {
    let responder = match Responder::new(config, account) {
        Ok(responder) => responder,
        Err(err) => return ConnectResult::failed(&err),
    };
    let result = responder.connect(link).await;
    responder.close().await;
    result
}
