//! Headless TON Connect responder
//!
//! Answers `tc://` connection requests on behalf of a TON wallet: decodes
//! the deep link, checks the initiator against an allow-list, opens a NaCl
//! box channel to the initiator's session key, signs a `ton_proof` when
//! asked, and hands the encrypted `connect` event to the bridge.
//!
//! ```no_run
//! use tonconnect_responder::{Responder, ResponderConfig};
//!
//! # async fn run(mnemonic: &str, address: &str, state_init: &str, link: &str) {
//! let config = ResponderConfig::default();
//! let responder = Responder::from_mnemonic(config, mnemonic, address, state_init)
//!     .expect("responder");
//! let result = responder.connect(link).await;
//! println!("{}", serde_json::to_string(&result).unwrap());
//! responder.close().await;
//! # }
//! ```

pub mod account;
pub mod address;
pub mod allowlist;
mod b64;
pub mod config;
pub mod error;
pub mod event;
pub mod link;
pub mod manifest;
pub mod proof;
pub mod relay;
pub mod responder;
pub mod session;

pub use account::{mnemonic_to_seed, Account, KeyMaterial, KeyedAccount};
pub use address::AccountAddress;
pub use allowlist::AllowedDomains;
pub use config::ResponderConfig;
pub use error::{AccountError, ConnectError, ErrorKind, Phase};
pub use event::{ConnectEvent, DeviceInfo, ProofItem, ReplyItem, WalletInfoItem};
pub use link::ConnectRequest;
pub use manifest::{HttpManifestFetcher, Manifest, ManifestFetcher};
pub use relay::{RelayClient, RetryPolicy};
pub use responder::{connect_once, ConnectData, ConnectResult, Outcome, Responder};
pub use session::{EncryptedChannel, SessionKeyPair};


#[cfg(test)]
mod test_vectors;


#[cfg(test)]
mod integration_tests;
