// Base64 helpers shared by the link codec and the session key decoder

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine,
};

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode(s: &str) -> Option<Vec<u8>> {
    STANDARD.decode(s).ok()
}

/// Decode base64 in either alphabet, tolerating missing `=` padding.
///
/// URL-safe is tried first; the standard alphabet is the fallback.
pub fn decode_any(data: &str) -> Option<Vec<u8>> {
    let padding = (4 - data.len() % 4) % 4;
    let mut padded = String::with_capacity(data.len() + padding);
    padded.push_str(data);
    padded.extend(std::iter::repeat('=').take(padding));

    URL_SAFE
        .decode(&padded)
        .or_else(|_| STANDARD.decode(&padded))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_any_accepts_both_alphabets() {
        // 0xfb 0xff encodes to "+/8" (standard) and "-_8" (url-safe)
        assert_eq!(decode_any("-_8").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_any("+/8").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_any("+/8=").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_decode_any_rejects_garbage() {
        assert!(decode_any("not base64!").is_none());
    }
}
