//! Error kinds surfaced by the responder
//!
//! Every failure inside a handshake is mapped to exactly one [`ErrorKind`],
//! which is what callers see in [`crate::ConnectResult::error_code`].

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Handshake phase a timeout belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AccountInit,
    Manifest,
    Relay,
    Shutdown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::AccountInit => "account init",
            Phase::Manifest => "manifest fetch",
            Phase::Relay => "relay delivery",
            Phase::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Machine-readable error code reported in a connect result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MalformedLink,
    Forbidden,
    AccountNotConfigured,
    AccountInitFailed,
    NoRequestItems,
    InvalidPeerKey,
    ChannelDerivationFailed,
    RelayError,
    Timeout,
    ConnectFailed,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid tc:// link: {0}")]
    MalformedLink(String),

    #[error("domain is not allowed")]
    Forbidden,

    #[error("account is not configured: {0}")]
    AccountNotConfigured(String),

    #[error("account initialization failed: {0}")]
    AccountInitFailed(String),

    #[error("no connection request items")]
    NoRequestItems,

    #[error("invalid initiator public key: {0}")]
    InvalidPeerKey(String),

    #[error("cannot derive session channel: {0}")]
    ChannelDerivationFailed(String),

    /// Relay rejected the message or could not be reached.
    /// `status` is `None` for transport-level failures.
    #[error("bridge error{}: {body}", status_suffix(.status))]
    Relay { status: Option<u16>, body: String },

    #[error("{0} timed out")]
    Timeout(Phase),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("connect failed: {0}")]
    Other(String),
}

impl ConnectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectError::MalformedLink(_) => ErrorKind::MalformedLink,
            ConnectError::Forbidden => ErrorKind::Forbidden,
            ConnectError::AccountNotConfigured(_) => ErrorKind::AccountNotConfigured,
            ConnectError::AccountInitFailed(_) => ErrorKind::AccountInitFailed,
            ConnectError::NoRequestItems => ErrorKind::NoRequestItems,
            ConnectError::InvalidPeerKey(_) => ErrorKind::InvalidPeerKey,
            ConnectError::ChannelDerivationFailed(_) => ErrorKind::ChannelDerivationFailed,
            ConnectError::Relay { .. } => ErrorKind::RelayError,
            ConnectError::Timeout(_) => ErrorKind::Timeout,
            ConnectError::InvalidConfig(_) | ConnectError::Other(_) => ErrorKind::ConnectFailed,
        }
    }
}

/// Failures reported by an [`crate::Account`] implementation
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("no key material supplied")]
    NotConfigured,

    #[error("account used before init")]
    NotInitialized,

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("invalid account address: {0}")]
    InvalidAddress(String),

    #[error("invalid wallet state: {0}")]
    InvalidState(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("account init timed out")]
    Timeout,

    #[error("{0}")]
    Backend(String),
}

impl From<AccountError> for ConnectError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotConfigured => {
                ConnectError::AccountNotConfigured("no key material supplied".into())
            }
            AccountError::Timeout => ConnectError::Timeout(Phase::AccountInit),
            AccountError::Signing(msg) => ConnectError::Other(format!("signing failed: {msg}")),
            other => ConnectError::AccountInitFailed(other.to_string()),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ConnectError>;
