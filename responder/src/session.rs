//! Session keys and the per-connection encrypted channel
//!
//! The bridge only ever sees `nonce || ciphertext` produced by NaCl
//! `crypto_box` (X25519 + XSalsa20-Poly1305), keyed by the responder's
//! ephemeral session key and the initiator's public key.

use crypto_box::{
    aead::{Aead, AeadCore, Nonce},
    PublicKey, SalsaBox, SecretKey,
};
use rand::rngs::OsRng;
use serde::Serialize;
use std::fmt;

use crate::b64;
use crate::error::{ConnectError, Result};

/// Size of an X25519 public key
pub const KEY_SIZE: usize = 32;

/// Size of the random nonce prefixed to every ciphertext
pub const NONCE_SIZE: usize = 24;

// ============================================================================
// Session Keypair
// ============================================================================

/// Ephemeral X25519 keypair, one per responder instance
///
/// The secret is zeroized on drop by `crypto_box`. Clone is deliberately
/// not implemented.
pub struct SessionKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl SessionKeyPair {
    /// Generate a fresh keypair from OS entropy
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Rebuild a keypair from raw secret bytes
    pub fn from_secret_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &[u8; KEY_SIZE] {
        self.public.as_bytes()
    }

    /// Bridge identifier: lowercase hex of the public key
    pub fn client_id(&self) -> String {
        hex::encode(self.public.as_bytes())
    }
}

impl fmt::Debug for SessionKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeyPair")
            .field("client_id", &self.client_id())
            .finish_non_exhaustive()
    }
}

/// Decode an initiator id from the link's `id` parameter
///
/// Exactly 64 hex characters are read as hex; anything else is tried as
/// base64 in either alphabet.
pub fn decode_peer_id(raw: &str) -> Result<[u8; KEY_SIZE]> {
    let hex_bytes = if raw.len() == 2 * KEY_SIZE {
        hex::decode(raw).ok()
    } else {
        None
    };
    let bytes = hex_bytes
        .or_else(|| b64::decode_any(raw))
        .ok_or_else(|| ConnectError::InvalidPeerKey("neither hex nor base64".into()))?;

    <[u8; KEY_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
        ConnectError::InvalidPeerKey(format!(
            "expected {} bytes, got {}",
            KEY_SIZE,
            bytes.len()
        ))
    })
}

// ============================================================================
// Encrypted Channel
// ============================================================================

/// Authenticated-encryption channel bound to one initiator public key
pub struct EncryptedChannel {
    peer: [u8; KEY_SIZE],
    cipher: SalsaBox,
}

impl EncryptedChannel {
    /// Derive the shared channel between our session key and `peer_public`
    pub fn derive(own: &SessionKeyPair, peer_public: &[u8]) -> Result<Self> {
        let peer = <[u8; KEY_SIZE]>::try_from(peer_public).map_err(|_| {
            ConnectError::ChannelDerivationFailed(format!(
                "peer key must be {} bytes, got {}",
                KEY_SIZE,
                peer_public.len()
            ))
        })?;
        if peer.iter().all(|&b| b == 0) {
            return Err(ConnectError::ChannelDerivationFailed(
                "peer key is the all-zero point".into(),
            ));
        }

        let cipher = SalsaBox::new(&PublicKey::from(peer), &own.secret);
        Ok(Self { peer, cipher })
    }

    pub fn peer_public_key(&self) -> &[u8; KEY_SIZE] {
        &self.peer
    }

    pub fn is_bound_to(&self, peer: &[u8; KEY_SIZE]) -> bool {
        &self.peer == peer
    }

    /// Serialize `message` to JSON and seal it
    pub fn encrypt<T: Serialize>(&self, message: &T) -> Result<Vec<u8>> {
        let plaintext = serde_json::to_vec(message)
            .map_err(|e| ConnectError::Other(format!("cannot serialize message: {e}")))?;
        self.seal(&plaintext)
    }

    /// Seal raw bytes, returning `nonce || ciphertext`
    ///
    /// A fresh random nonce is drawn on every call.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = SalsaBox::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| ConnectError::Other("encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open `nonce || ciphertext` produced by the peer (or by [`Self::seal`])
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE {
            return Err(ConnectError::Other("ciphertext shorter than nonce".into()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::<SalsaBox>::from_slice(nonce), ciphertext)
            .map_err(|_| ConnectError::Other("decryption failed".into()))
    }
}

impl fmt::Debug for EncryptedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedChannel")
            .field("peer", &hex::encode(self.peer))
            .finish_non_exhaustive()
    }
}
