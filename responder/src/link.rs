//! `tc://` deep-link codec
//!
//! A connection request arrives as
//! `tc://?v=<version>&id=<initiator_pubkey>&r=<request>&ret=<return_url>`,
//! where `r` is either URL-encoded JSON or base64(url) encoded JSON.

use serde::Deserialize;
use serde_json::{Map, Value};
use url::{form_urlencoded, Url};

use crate::b64;
use crate::error::{ConnectError, Result};

const LINK_PREFIX: &str = "tc://";

/// Protocol version assumed when the link carries no `v` parameter
pub const DEFAULT_PROTOCOL_VERSION: &str = "2";

/// Request item asking for the wallet address
pub const ADDRESS_ITEM: &str = "ton_addr";

/// Request item asking for an ownership proof
pub const PROOF_ITEM: &str = "ton_proof";

/// One capability requested by the initiator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestItem {
    pub name: String,
    /// Opaque challenge, only meaningful for `ton_proof`
    #[serde(default)]
    pub payload: Option<String>,
}

/// A parsed connection request. Immutable once produced by [`parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    pub version: String,
    /// Initiator public key, hex or base64
    pub session_id: String,
    pub return_url: Option<String>,
    /// The decoded `r` object exactly as sent
    pub request: Value,
    /// Well-formed entries of `request.items`, in order
    pub items: Vec<RequestItem>,
}

impl ConnectRequest {
    pub fn manifest_url(&self) -> Option<&str> {
        self.request
            .get("manifestUrl")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    /// First `ton_proof` item, if any
    pub fn proof_request(&self) -> Option<&RequestItem> {
        self.items.iter().find(|item| item.name == PROOF_ITEM)
    }
}

fn is_link_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-._~:/?#[]@!$&'()*+,;=%".contains(c)
}

fn query_of(link: &str) -> Option<&str> {
    let rest = link.strip_prefix(LINK_PREFIX)?;
    let (_, after) = rest.split_once('?')?;
    let query = after.split('#').next().unwrap_or_default();
    (!query.is_empty()).then_some(query)
}

/// Check the link shape without decoding the request
pub fn validate(link: &str) -> bool {
    if !link.chars().all(is_link_char) {
        return false;
    }
    let Some(query) = query_of(link) else {
        return false;
    };

    let mut has_id = false;
    let mut has_request = false;
    for (key, _) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "id" => has_id = true,
            "r" => has_request = true,
            _ => {}
        }
    }
    has_id && has_request
}

/// Parse and decode a `tc://` link
///
/// Repeated query keys keep their first value.
pub fn parse(link: &str) -> Result<ConnectRequest> {
    if !validate(link) {
        return Err(ConnectError::MalformedLink(
            "expected tc://?id=<key>&r=<request>".into(),
        ));
    }
    let query = query_of(link).unwrap_or_default();

    let mut version = None;
    let mut session_id = None;
    let mut return_url = None;
    let mut raw_request = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let slot = match key.as_ref() {
            "v" => &mut version,
            "id" => &mut session_id,
            "ret" => &mut return_url,
            "r" => &mut raw_request,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    let request = match raw_request.as_deref() {
        Some(raw) if !raw.is_empty() => decode_request(raw)?,
        _ => Value::Object(Map::new()),
    };
    if !request.is_object() {
        return Err(ConnectError::MalformedLink("`r` is not a JSON object".into()));
    }
    let items = request
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| RequestItem::deserialize(item).ok())
                .collect()
        })
        .unwrap_or_default();

    Ok(ConnectRequest {
        version: version.unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_owned()),
        session_id: session_id.unwrap_or_default(),
        return_url,
        request,
        items,
    })
}

fn decode_request(raw: &str) -> Result<Value> {
    let text = if raw.trim().starts_with('{') {
        raw.to_owned()
    } else {
        // form decoding turned any '+' of standard base64 into a space
        let bytes = b64::decode_any(&raw.replace(' ', "+")).ok_or_else(|| {
            ConnectError::MalformedLink("`r` is neither JSON nor base64".into())
        })?;
        String::from_utf8(bytes)
            .map_err(|_| ConnectError::MalformedLink("`r` is not valid UTF-8".into()))?
    };
    serde_json::from_str(&text)
        .map_err(|e| ConnectError::MalformedLink(format!("`r` is not valid JSON: {e}")))
}

/// Host component of `url`, or `url` itself when it has none
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .host_str()
                .filter(|host| !host.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| url.to_owned())
}

/// Host of the request's `manifestUrl`; empty when the request has none
pub fn resolve_app_domain(request: &ConnectRequest) -> String {
    request
        .manifest_url()
        .map(extract_domain)
        .unwrap_or_default()
}
