//! Wire types of the `connect` event sent to the initiator

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONNECT_EVENT: &str = "connect";

/// Device descriptor announced to the initiator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    pub app_name: String,
    pub app_version: String,
    pub max_protocol_version: u32,
    #[serde(default)]
    pub features: Vec<Value>,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            platform: "android".into(),
            app_name: "Tonkeeper".into(),
            app_version: "5.4.43".into(),
            max_protocol_version: 2,
            features: Vec::new(),
        }
    }
}

/// `ton_addr` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfoItem {
    /// Raw `wc:hex` address
    pub address: String,
    pub network: String,
    /// Hex-encoded ed25519 public key
    pub public_key: String,
    /// Base64 state init BoC
    pub wallet_state_init: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDomain {
    #[serde(rename = "lengthBytes")]
    pub length_bytes: u32,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonProof {
    pub timestamp: u64,
    pub domain: ProofDomain,
    /// Base64 ed25519 signature
    pub signature: String,
    pub payload: String,
}

/// `ton_proof` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofItem {
    pub proof: TonProof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum ReplyItem {
    #[serde(rename = "ton_addr")]
    TonAddr(WalletInfoItem),
    #[serde(rename = "ton_proof")]
    TonProof(ProofItem),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectPayload {
    pub items: Vec<ReplyItem>,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectEvent {
    pub event: String,
    pub id: u64,
    pub payload: ConnectPayload,
}

impl ConnectEvent {
    /// `items` is the wallet info followed by the proof, when present
    pub fn connect(
        id: u64,
        wallet: WalletInfoItem,
        proof: Option<ProofItem>,
        device: DeviceInfo,
    ) -> Self {
        let mut items = vec![ReplyItem::TonAddr(wallet)];
        items.extend(proof.map(ReplyItem::TonProof));
        Self {
            event: CONNECT_EVENT.to_owned(),
            id,
            payload: ConnectPayload { items, device },
        }
    }
}
