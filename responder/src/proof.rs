//! `ton_proof` ownership proof
//!
//! Signable message (integers little-endian):
//!
//! ```text
//! "ton-proof-item-v2/" || wc:i32 || hash:32 || domain_len:u32 || domain
//!     || timestamp:u64 || payload
//! ```
//!
//! The account signs `SHA256(0xffff || "ton-connect" || SHA256(message))`.
//! The prefix keeps a proof signature from ever being valid as a
//! transaction signature for the same key.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::account::Account;
use crate::address::AccountAddress;
use crate::b64;
use crate::error::Result;
use crate::event::{ProofDomain, ProofItem, TonProof};
use crate::link::ConnectRequest;

/// Message prefix of proof version 2
pub const PROOF_PREFIX: &[u8] = b"ton-proof-item-v2/";

/// Domain separator of the signed envelope
const SIGN_PREFIX: &[u8] = b"\xff\xffton-connect";

/// Assemble the signable proof message
pub fn build_message(
    address: &AccountAddress,
    domain: &str,
    timestamp: u64,
    payload: &[u8],
) -> Vec<u8> {
    let domain = domain.as_bytes();
    let mut message =
        Vec::with_capacity(PROOF_PREFIX.len() + 4 + 32 + 4 + domain.len() + 8 + payload.len());
    message.extend_from_slice(PROOF_PREFIX);
    message.extend_from_slice(&address.workchain.to_le_bytes());
    message.extend_from_slice(&address.hash);
    message.extend_from_slice(&(domain.len() as u32).to_le_bytes());
    message.extend_from_slice(domain);
    message.extend_from_slice(&timestamp.to_le_bytes());
    message.extend_from_slice(payload);
    message
}

/// SHA256 of the proof message
pub fn inner_hash(message: &[u8]) -> [u8; 32] {
    Sha256::digest(message).into()
}

/// Digest handed to the signer
pub fn signing_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(SIGN_PREFIX);
    hasher.update(inner_hash(message));
    hasher.finalize().into()
}

/// Build the `ton_proof` reply for `request`
///
/// Returns `Ok(None)` when the request has no `ton_proof` item or its
/// challenge payload is empty.
pub fn build(
    request: &ConnectRequest,
    app_domain: &str,
    timestamp: u64,
    address: &AccountAddress,
    signer: &dyn Account,
) -> Result<Option<ProofItem>> {
    let Some(payload) = request
        .proof_request()
        .and_then(|item| item.payload.as_deref())
        .filter(|payload| !payload.is_empty())
    else {
        return Ok(None);
    };

    let message = build_message(address, app_domain, timestamp, payload.as_bytes());
    let signature = signer.sign(&signing_hash(&message))?;

    Ok(Some(ProofItem {
        proof: TonProof {
            timestamp,
            domain: ProofDomain {
                length_bytes: app_domain.len() as u32,
                value: app_domain.to_owned(),
            },
            signature: b64::encode(&signature),
            payload: payload.to_owned(),
        },
    }))
}

/// Check a proof against the wallet address and public key
pub fn verify(item: &ProofItem, address: &AccountAddress, public_key: &[u8; 32]) -> bool {
    let proof = &item.proof;
    if proof.domain.length_bytes as usize != proof.domain.value.len() {
        return false;
    }
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Some(signature) = b64::decode(&proof.signature)
        .and_then(|bytes| <[u8; 64]>::try_from(bytes.as_slice()).ok())
        .map(|bytes| Signature::from_bytes(&bytes))
    else {
        return false;
    };

    let message = build_message(
        address,
        &proof.domain.value,
        proof.timestamp,
        proof.payload.as_bytes(),
    );
    key.verify(&signing_hash(&message), &signature).is_ok()
}
