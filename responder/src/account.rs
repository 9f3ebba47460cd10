//! Account collaborator
//!
//! The responder never touches ledger state directly. Everything it needs
//! from the wallet (address, public key, state init, signatures) comes
//! through the [`Account`] trait.
//!
//! [`KeyedAccount`] is the bundled implementation: it derives an ed25519
//! key from a TON mnemonic (or a raw seed) and serves a wallet address and
//! state init supplied by the caller.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::address::AccountAddress;
use crate::b64;
use crate::error::AccountError;

/// Number of words in a TON mnemonic
pub const MNEMONIC_WORDS: usize = 24;

/// PBKDF2 salt and rounds of the TON mnemonic scheme
const TON_SEED_SALT: &[u8] = b"TON default seed";
const TON_SEED_ROUNDS: u32 = 100_000;

type HmacSha512 = Hmac<Sha512>;

#[async_trait]
pub trait Account: Send + Sync {
    /// Prepare the account. Must be idempotent.
    async fn init(&mut self, timeout: Duration) -> Result<(), AccountError>;

    /// Release held resources. Must be idempotent.
    async fn close(&mut self, timeout: Duration) -> Result<(), AccountError>;

    /// Wallet address in raw `wc:hex` form
    fn address(&self) -> Result<String, AccountError>;

    fn public_key(&self) -> Result<[u8; 32], AccountError>;

    /// Serialized wallet state init (BoC bytes)
    fn serialized_state(&self) -> Result<Vec<u8>, AccountError>;

    /// Sign a 32-byte digest with the wallet key
    fn sign(&self, hash: &[u8; 32]) -> Result<Vec<u8>, AccountError>;
}

// ============================================================================
// Key Material
// ============================================================================

/// Secret input for [`KeyedAccount`]; wiped on drop
pub enum KeyMaterial {
    /// Normalized 24-word TON mnemonic
    Mnemonic(Zeroizing<String>),
    /// Raw ed25519 seed
    Seed(Zeroizing<[u8; 32]>),
}

impl KeyMaterial {
    /// Validate and normalize a mnemonic phrase
    ///
    /// Words are lower-cased and must all come from the BIP-39 English
    /// wordlist, which TON mnemonics share.
    pub fn mnemonic(phrase: &str) -> Result<Self, AccountError> {
        if phrase.trim().is_empty() {
            return Err(AccountError::NotConfigured);
        }
        let words: Zeroizing<Vec<String>> = Zeroizing::new(
            phrase
                .split_whitespace()
                .map(str::to_lowercase)
                .collect(),
        );
        if words.len() != MNEMONIC_WORDS {
            return Err(AccountError::InvalidMnemonic(format!(
                "expected {} words, got {}",
                MNEMONIC_WORDS,
                words.len()
            )));
        }
        if let Some(position) = words
            .iter()
            .position(|word| bip39::Language::English.find_word(word).is_none())
        {
            return Err(AccountError::InvalidMnemonic(format!(
                "word {} is not in the wordlist",
                position + 1
            )));
        }
        Ok(KeyMaterial::Mnemonic(Zeroizing::new(words.join(" "))))
    }

    /// Raw 32-byte seed given as hex
    pub fn seed_hex(seed: &str) -> Result<Self, AccountError> {
        let bytes = Zeroizing::new(
            hex::decode(seed.trim())
                .map_err(|_| AccountError::InvalidMnemonic("seed is not hex".into()))?,
        );
        let seed = <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| AccountError::InvalidMnemonic("seed must be 32 bytes".into()))?;
        Ok(KeyMaterial::Seed(Zeroizing::new(seed)))
    }

    /// Derive the signing key, consuming (and wiping) the material
    pub fn into_signing_key(self) -> Result<SigningKey, AccountError> {
        let seed = match &self {
            KeyMaterial::Mnemonic(phrase) => mnemonic_to_seed(phrase, "")?,
            KeyMaterial::Seed(seed) => Zeroizing::new(**seed),
        };
        Ok(SigningKey::from_bytes(&seed))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Mnemonic(_) => f.write_str("KeyMaterial::Mnemonic(<redacted>)"),
            KeyMaterial::Seed(_) => f.write_str("KeyMaterial::Seed(<redacted>)"),
        }
    }
}

/// TON mnemonic to ed25519 seed
///
/// entropy = HMAC-SHA512(key = phrase, data = password)
/// seed    = PBKDF2-HMAC-SHA512(entropy, "TON default seed", 100000)[..32]
pub fn mnemonic_to_seed(phrase: &str, password: &str) -> Result<Zeroizing<[u8; 32]>, AccountError> {
    let mut mac = <HmacSha512 as Mac>::new_from_slice(phrase.as_bytes())
        .map_err(|e| AccountError::InvalidMnemonic(e.to_string()))?;
    mac.update(password.as_bytes());

    let mut entropy = Zeroizing::new([0u8; 64]);
    entropy.copy_from_slice(&mac.finalize().into_bytes());

    let mut stretched = Zeroizing::new([0u8; 64]);
    pbkdf2::pbkdf2_hmac::<Sha512>(
        entropy.as_slice(),
        TON_SEED_SALT,
        TON_SEED_ROUNDS,
        stretched.as_mut_slice(),
    );

    let mut seed = Zeroizing::new([0u8; 32]);
    seed.copy_from_slice(&stretched[..32]);
    Ok(seed)
}

// ============================================================================
// Keyed Account
// ============================================================================

/// Account backed by a locally held ed25519 key
///
/// Key derivation is deferred to [`Account::init`] (PBKDF2 with 100k
/// rounds) and runs on the blocking pool. The key material is taken out
/// of the account on the first `init` and wiped whether derivation
/// succeeds or not.
pub struct KeyedAccount {
    material: Option<KeyMaterial>,
    address: AccountAddress,
    state_init: Vec<u8>,
    signing_key: Option<SigningKey>,
}

impl KeyedAccount {
    /// `address` may be raw or user-friendly; `state_init` is base64 BoC
    pub fn new(
        material: KeyMaterial,
        address: &str,
        state_init: &str,
    ) -> Result<Self, AccountError> {
        let address: AccountAddress = address.parse()?;
        let state_init = b64::decode_any(state_init.trim())
            .filter(|state| !state.is_empty())
            .ok_or_else(|| {
                AccountError::InvalidState("state init must be non-empty base64".into())
            })?;

        Ok(Self {
            material: Some(material),
            address,
            state_init,
            signing_key: None,
        })
    }

    pub fn account_address(&self) -> &AccountAddress {
        &self.address
    }

    pub fn is_initialized(&self) -> bool {
        self.signing_key.is_some()
    }

    fn key(&self) -> Result<&SigningKey, AccountError> {
        self.signing_key.as_ref().ok_or(AccountError::NotInitialized)
    }
}

#[async_trait]
impl Account for KeyedAccount {
    async fn init(&mut self, timeout: Duration) -> Result<(), AccountError> {
        if self.signing_key.is_some() {
            return Ok(());
        }
        let material = self.material.take().ok_or_else(|| {
            AccountError::Backend("key material was consumed by an earlier failed init".into())
        })?;

        let derive = tokio::task::spawn_blocking(move || material.into_signing_key());
        let key = match tokio::time::timeout(timeout, derive).await {
            Ok(Ok(derived)) => derived?,
            Ok(Err(join_error)) => {
                return Err(AccountError::Backend(format!(
                    "key derivation task failed: {join_error}"
                )))
            }
            Err(_) => return Err(AccountError::Timeout),
        };

        tracing::debug!(address = %self.address, "account key derived");
        self.signing_key = Some(key);
        Ok(())
    }

    async fn close(&mut self, _timeout: Duration) -> Result<(), AccountError> {
        self.signing_key = None;
        self.material = None;
        Ok(())
    }

    fn address(&self) -> Result<String, AccountError> {
        Ok(self.address.to_raw())
    }

    fn public_key(&self) -> Result<[u8; 32], AccountError> {
        Ok(self.key()?.verifying_key().to_bytes())
    }

    fn serialized_state(&self) -> Result<Vec<u8>, AccountError> {
        Ok(self.state_init.clone())
    }

    fn sign(&self, hash: &[u8; 32]) -> Result<Vec<u8>, AccountError> {
        Ok(self.key()?.sign(hash).to_bytes().to_vec())
    }
}

impl fmt::Debug for KeyedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedAccount")
            .field("address", &self.address.to_raw())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
