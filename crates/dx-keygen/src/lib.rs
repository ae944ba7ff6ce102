//! DXplorer access key derivation
//!
//! This crate derives the short, URL-safe keys that let an operator reach
//! DXplorer with a specific device. It is used both natively (by the `dxkey`
//! CLI) and from a browser config page (compiled to WASM).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
pub(crate) use sha2::{Digest, Sha256};
use wasm_bindgen::prelude::*;

pub mod varint;

mod packed;
pub use packed::{Descriptor, PackedKey, PackedKeyError, DIGEST_LEN};

mod key;
pub use key::{Key, KeyError};

mod secret;
pub use secret::{DeviceSecret, SecretError};

/// Error type for base64url decoding failures
#[derive(Debug, thiserror::Error)]
#[error("invalid base64url encoding: {0}")]
pub struct DecodeError(#[from] base64::DecodeError);

/// Generate the access key for a device.
///
/// The key is computed as:
/// `base64url(descriptor ‖ varint(device_id) ‖ varint(change_counter) ‖ SHA-256(hash_input)[0:16])`
/// where `hash_input` is the decimal device id, the decimal change counter,
/// the uppercased callsign and the secret bytes, concatenated.
///
/// Deterministic and total: the same inputs always produce the same key, and
/// callsign case does not matter.
///
/// # Arguments
/// * `device_id` - Identifier of the physical device
/// * `device_secret` - Secret bytes held by the device; never part of the output
/// * `change_counter` - Incremented each time the operator regenerates a key
/// * `callsign` - Operator callsign, any case
///
/// # Returns
/// A base64url-encoded string (without padding)
#[wasm_bindgen]
#[must_use]
pub fn generate_key(
    device_id: u64,
    device_secret: &[u8],
    change_counter: u64,
    callsign: &str,
) -> String {
    Key::generate(device_id, device_secret, change_counter, callsign).into_string()
}

/// Encode bytes as base64url (RFC 4648) without padding.
///
/// # Arguments
/// * `bytes` - The bytes to encode
///
/// # Returns
/// A base64url-encoded string without padding characters
#[must_use]
pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a base64url-encoded string (RFC 4648) to bytes (WASM binding).
///
/// For native Rust code, use [`decode_base64url`] instead.
///
/// # Errors
/// Returns `JsError` if the input is not valid base64url
#[wasm_bindgen(js_name = "decode_base64url")]
pub fn decode_base64url_js(encoded: &str) -> Result<Vec<u8>, JsError> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| JsError::new(&e.to_string()))
}

/// Decode an unpadded base64url-encoded string (RFC 4648) to bytes.
///
/// # Errors
/// Returns `DecodeError` if the input is not valid base64url
pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(encoded).map_err(DecodeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 2] = [0xAA, 0xBB];

    #[test]
    fn test_generate_key_known_vector() {
        // This is the expected output - if this changes, the verifying service rejects every key
        assert_eq!(generate_key(1, &SECRET, 1, "AB"), "AAEBf-3PK38d4fwil94fz9IEQQ");
    }

    #[test]
    fn test_generate_key_more_vectors() {
        let cases = [
            (0x1FF, b"secret".as_slice(), 0, "g0abc", "Af8BAGkcvi7EJ1twpQO9psXAGq0"),
            (12345, &[0x11u8, 0x22][..], 7, "M0XYZ", "ATkwBxKf5EsuV6Rw0s_qfPBkGRA"),
            (0, b"".as_slice(), 0, "", "AAAA8VNDkieb3b-dQ93ocBy1vg"),
        ];

        for (device_id, secret, counter, callsign, expected) in cases {
            assert_eq!(
                generate_key(device_id, secret, counter, callsign),
                expected,
                "case device_id={device_id} counter={counter}"
            );
        }
    }

    #[test]
    fn test_generate_key_boundary_vector() {
        let key = generate_key(u64::MAX, &SECRET, u64::MAX, "G0ABC");
        assert_eq!(key, "P_____________________-7BFd_GrJ5YyrioGUZwM6i");

        let bytes = decode_base64url(&key).expect("decode");
        assert_eq!(bytes[0], 0x3F);
        assert_eq!(bytes.len(), 1 + 8 + 8 + DIGEST_LEN);
    }

    #[test]
    fn test_generate_key_deterministic() {
        let key1 = generate_key(99, &SECRET, 3, "K1ABC");
        let key2 = generate_key(99, &SECRET, 3, "K1ABC");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_generate_key_callsign_case_insensitive() {
        assert_eq!(
            generate_key(5, &SECRET, 2, "g0abc"),
            generate_key(5, &SECRET, 2, "G0ABC")
        );
        assert_eq!(
            generate_key(5, &SECRET, 2, "g0AbC"),
            generate_key(5, &SECRET, 2, "G0ABC")
        );
    }

    #[test]
    fn test_generate_key_counter_sensitive() {
        assert_ne!(
            generate_key(5, &SECRET, 1, "G0ABC"),
            generate_key(5, &SECRET, 2, "G0ABC")
        );
    }

    #[test]
    fn test_device_id_zero_is_one_byte() {
        let bytes = decode_base64url(&generate_key(0, &SECRET, 0, "AB")).expect("decode");
        assert_eq!(bytes[0] & 0b111, 0);
        assert_eq!(bytes.len(), 1 + 1 + 1 + DIGEST_LEN);
    }

    #[test]
    fn test_device_id_0x1ff_is_two_bytes() {
        let bytes = decode_base64url(&generate_key(0x1FF, &SECRET, 0, "AB")).expect("decode");
        assert_eq!(bytes[0] & 0b111, 1);
        assert_eq!(&bytes[1..3], &[0xFF, 0x01]);
    }

    #[test]
    fn test_encode_base64url() {
        let bytes = b"Hello";
        let encoded = encode_base64url(bytes);
        assert_eq!(encoded, "SGVsbG8");
    }

    #[test]
    fn test_decode_base64url() {
        let encoded = "SGVsbG8";
        let decoded = decode_base64url(encoded).expect("decode should succeed");
        assert_eq!(decoded, b"Hello");
    }

    #[test]
    fn test_decode_invalid_base64url() {
        let invalid = "not valid base64!!!";
        let result = decode_base64url(invalid);
        assert!(result.is_err());
    }
}
