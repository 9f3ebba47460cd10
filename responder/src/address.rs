//! TON account addresses
//!
//! Accepts the raw form `<workchain>:<64 hex>` and the 48-character
//! user-friendly form (base64 or base64url of
//! `flags(1) || workchain(1) || hash(32) || crc16(2)`).

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE, Engine};

use crate::b64;
use crate::error::AccountError;

const FRIENDLY_LEN: usize = 48;
const FRIENDLY_BYTES: usize = 36;

const FLAG_BOUNCEABLE: u8 = 0x11;
const FLAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TESTNET: u8 = 0x80;

/// Workchain id and 256-bit account hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountAddress {
    pub workchain: i32,
    pub hash: [u8; 32],
}

impl AccountAddress {
    pub fn new(workchain: i32, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// Raw form, e.g. `0:ab12...`
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// User-friendly base64url form
    pub fn to_friendly(&self, bounceable: bool, testnet: bool) -> String {
        let mut flags = if bounceable {
            FLAG_BOUNCEABLE
        } else {
            FLAG_NON_BOUNCEABLE
        };
        if testnet {
            flags |= FLAG_TESTNET;
        }

        let mut bytes = Vec::with_capacity(FRIENDLY_BYTES);
        bytes.push(flags);
        bytes.push(self.workchain as i8 as u8);
        bytes.extend_from_slice(&self.hash);
        let crc = crc16(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());
        URL_SAFE.encode(bytes)
    }

    fn parse_raw(input: &str) -> Result<Self, AccountError> {
        let (workchain, hash) = input
            .split_once(':')
            .ok_or_else(|| AccountError::InvalidAddress(input.to_owned()))?;
        let workchain: i32 = workchain
            .parse()
            .map_err(|_| AccountError::InvalidAddress(format!("bad workchain in {input}")))?;
        let hash = hex::decode(hash)
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes.as_slice()).ok())
            .ok_or_else(|| AccountError::InvalidAddress(format!("bad hash in {input}")))?;
        Ok(Self { workchain, hash })
    }

    fn parse_friendly(input: &str) -> Result<Self, AccountError> {
        let bytes = b64::decode_any(input)
            .filter(|bytes| bytes.len() == FRIENDLY_BYTES)
            .ok_or_else(|| AccountError::InvalidAddress(format!("not a TON address: {input}")))?;

        let (body, crc) = bytes.split_at(FRIENDLY_BYTES - 2);
        if crc16(body).to_be_bytes().as_slice() != crc {
            return Err(AccountError::InvalidAddress(format!(
                "checksum mismatch in {input}"
            )));
        }
        let flags = body[0] & !FLAG_TESTNET;
        if flags != FLAG_BOUNCEABLE && flags != FLAG_NON_BOUNCEABLE {
            return Err(AccountError::InvalidAddress(format!(
                "unknown address flags {:#04x}",
                body[0]
            )));
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&body[2..]);
        Ok(Self {
            workchain: body[1] as i8 as i32,
            hash,
        })
    }
}

impl FromStr for AccountAddress {
    type Err = AccountError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.contains(':') {
            Self::parse_raw(input)
        } else if input.len() == FRIENDLY_LEN {
            Self::parse_friendly(input)
        } else {
            Err(AccountError::InvalidAddress(input.to_owned()))
        }
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

/// CRC-16/XMODEM as used by user-friendly addresses
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
