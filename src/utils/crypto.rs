use ring::digest::{Context, SHA256};

use crate::error::{NodeError, Result};
use data_encoding::HEXLOWER;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in whole seconds since the Unix epoch.
pub fn current_timestamp() -> Result<u64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| NodeError::Crypto(format!("System time error: {e}")))?;
    Ok(duration.as_secs())
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// SHA-256 of the input, as a lowercase hex string. This is the hash form
/// that block hashes and transaction ids use on the wire.
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(sha256_digest(data).as_slice())
}

pub fn hex_encode(data: &[u8]) -> String {
    HEXLOWER.encode(data)
}

pub fn hex_decode(data: &str) -> Result<Vec<u8>> {
    HEXLOWER
        .decode(data.as_bytes())
        .map_err(|e| NodeError::Serialization(format!("Invalid hex encoding: {e}")))
}

/// True when the string is entirely lowercase hex digits.
pub fn is_hex(data: &str) -> bool {
    !data.is_empty() && data.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hex_round_trip() {
        let bytes = vec![0x00, 0x01, 0xab, 0xff];
        let encoded = hex_encode(&bytes);
        assert_eq!(encoded, "0001abff");
        assert_eq!(hex_decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_hex_decode_rejects_garbage() {
        assert!(hex_decode("zz").is_err());
        assert!(hex_decode("abc").is_err()); // odd length
    }

    #[test]
    fn test_is_hex() {
        assert!(is_hex("04abcdef"));
        assert!(!is_hex("04ABCDEF")); // uppercase is not canonical
        assert!(!is_hex("xyz"));
        assert!(!is_hex(""));
    }
}
