//! Normalise secret keys between base58 and base64 representations.
//!
//! The upstream exchange API only accepts base58-encoded 64-byte secret
//! keys; wallet files may store either encoding.

use base64::Engine;
use thiserror::Error;

const SECRET_KEY_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum KeyFormatError {
    #[error("key does not decode to a {SECRET_KEY_LEN}-byte secret key in base58 or base64")]
    KeyFormat,
}

/// True iff `s` decodes under base58 to a fixed 64-byte sequence.
pub fn is_canonical(s: &str) -> bool {
    bs58::decode(s)
        .into_vec()
        .map(|bytes| bytes.len() == SECRET_KEY_LEN)
        .unwrap_or(false)
}

/// Return the base58 canonical form of `s`. If already canonical, returned
/// unchanged. Otherwise try base64; if that decodes to 64 bytes, re-encode
/// as base58. Fails with [`KeyFormatError::KeyFormat`] if neither works.
pub fn to_canonical(s: &str) -> Result<String, KeyFormatError> {
    if is_canonical(s) {
        return Ok(s.to_string());
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|_| KeyFormatError::KeyFormat)?;

    if decoded.len() != SECRET_KEY_LEN {
        return Err(KeyFormatError::KeyFormat);
    }

    Ok(bs58::encode(decoded).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes() -> [u8; 64] {
        let mut bytes = [0u8; 64];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        bytes
    }

    #[test]
    fn base58_is_canonical() {
        let b58 = bs58::encode(sample_bytes()).into_string();
        assert!(is_canonical(&b58));
    }

    #[test]
    fn base64_is_not_canonical() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(sample_bytes());
        assert!(!is_canonical(&b64));
    }

    #[test]
    fn to_canonical_passes_through_base58() {
        let b58 = bs58::encode(sample_bytes()).into_string();
        assert_eq!(to_canonical(&b58).unwrap(), b58);
    }

    #[test]
    fn to_canonical_converts_base64() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(sample_bytes());
        let b58 = bs58::encode(sample_bytes()).into_string();
        assert_eq!(to_canonical(&b64).unwrap(), b58);
    }

    #[test]
    fn to_canonical_rejects_wrong_length() {
        let short = bs58::encode([1u8, 2, 3]).into_string();
        assert!(matches!(
            to_canonical(&short),
            Err(KeyFormatError::KeyFormat)
        ));
    }

    #[test]
    fn to_canonical_is_idempotent() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(sample_bytes());
        let once = to_canonical(&b64).unwrap();
        let twice = to_canonical(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn to_canonical_decodes_to_64_bytes() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(sample_bytes());
        let canonical = to_canonical(&b64).unwrap();
        let decoded = bs58::decode(&canonical).into_vec().unwrap();
        assert_eq!(decoded.len(), SECRET_KEY_LEN);
    }
}
