//! Base64url key material codec.
//!
//! Subscriptions and VAPID keys travel as unpadded base64url text; the
//! crypto layers work on raw bytes. All base64 handling lives here.

use base64::{
    engine::general_purpose::{URL_SAFE as BASE64URL_PADDED, URL_SAFE_NO_PAD as BASE64URL},
    Engine,
};

use crate::error::{PushError, Result};

/// Decode base64url text, with or without trailing `=` padding.
///
/// Omitted padding is restored before decoding so both forms produced by
/// browsers are accepted. Characters outside the URL-safe alphabet fail.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let trimmed = text.trim();
    let mut padded = String::with_capacity(trimmed.len() + 3);
    padded.push_str(trimmed);
    if !trimmed.ends_with('=') {
        while padded.len() % 4 != 0 {
            padded.push('=');
        }
    }

    BASE64URL_PADDED
        .decode(padded.as_bytes())
        .map_err(|e| PushError::Decode(format!("invalid base64url: {e}")))
}

/// Encode bytes as unpadded base64url (no `+`, `/` or `=`).
pub fn encode(bytes: &[u8]) -> String {
    BASE64URL.encode(bytes)
}

/// Decode and require an exact byte length.
pub fn decode_exact(text: &str, expected: usize, what: &str) -> Result<Vec<u8>> {
    let bytes = decode(text)?;
    if bytes.len() != expected {
        return Err(PushError::Decode(format!(
            "{what} must be {expected} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_lengths_0_to_100() {
        for len in 0..=100u8 {
            let bytes: Vec<u8> = (0..len).map(|i| i.wrapping_mul(37).wrapping_add(len)).collect();
            let text = encode(&bytes);
            assert_eq!(decode(&text).expect("decode"), bytes, "length {len}");
        }
    }

    #[test]
    fn test_encode_is_url_safe_and_unpadded() {
        let text = encode(&[0xfb, 0xff, 0xfe, 0x00]);
        assert!(!text.contains('+'));
        assert!(!text.contains('/'));
        assert!(!text.ends_with('='));
        assert_eq!(text, "-__-AA");
    }

    #[test]
    fn test_decode_accepts_padding() {
        assert_eq!(decode("-__-AA==").expect("padded"), vec![0xfb, 0xff, 0xfe, 0x00]);
        assert_eq!(decode("-__-AA").expect("unpadded"), vec![0xfb, 0xff, 0xfe, 0x00]);
    }

    #[test]
    fn test_decode_rejects_non_alphabet() {
        assert!(matches!(decode("ab+/"), Err(PushError::Decode(_))));
        assert!(matches!(decode("a b!"), Err(PushError::Decode(_))));
    }

    #[test]
    fn test_decode_exact_checks_length() {
        let text = encode(&[1u8; 16]);
        assert_eq!(decode_exact(&text, 16, "auth").expect("16 bytes").len(), 16);
        let err = decode_exact(&text, 65, "p256dh").expect_err("wrong length");
        assert!(err.to_string().contains("p256dh must be 65 bytes"));
    }
}
