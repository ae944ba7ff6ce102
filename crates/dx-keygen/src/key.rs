//! Access key: a validated, type-safe wrapper for generated keys.
//!
//! A key is `base64url(packed frame)` without padding, so it only ever uses
//! the alphabet `[A-Za-z0-9_-]` and can be placed in a URL as-is.

use crate::packed::{PackedKey, PackedKeyError, DIGEST_LEN};
use crate::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// A generated access key.
///
/// Construct via [`Key::generate`] (from device inputs) or [`Key::from_str`]
/// (from a string, e.g. read back from a config file). A parsed key always
/// holds a well-formed frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(String);

/// Error returned when a string is not a well-formed key.
#[derive(Debug, thiserror::Error)]
#[error("invalid key: {reason}")]
pub struct KeyError {
    reason: &'static str,
}

impl Key {
    /// Derive the key for one device, counter and callsign.
    ///
    /// The digest covers the decimal device id, the decimal change counter,
    /// the uppercased callsign and the raw secret, concatenated without
    /// separators. Only its first 16 bytes are kept.
    #[must_use]
    pub fn generate(
        device_id: u64,
        device_secret: &[u8],
        change_counter: u64,
        callsign: &str,
    ) -> Self {
        let callsign = callsign.to_ascii_uppercase();

        let prefix = format!("{device_id}{change_counter}{callsign}");
        let mut hash_input =
            Zeroizing::new(Vec::with_capacity(prefix.len() + device_secret.len()));
        hash_input.extend_from_slice(prefix.as_bytes());
        hash_input.extend_from_slice(device_secret);

        let hash = Sha256::digest(hash_input.as_slice());
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&hash[..DIGEST_LEN]);

        Self(PackedKey::new(device_id, change_counter, digest).encode())
    }

    /// Return the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Split the key into its packed fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the decoded bytes are not a well-formed frame.
    pub fn unpack(&self) -> Result<PackedKey, PackedKeyError> {
        PackedKey::from_key(&self.0)
    }

    fn validate(s: &str) -> Result<(), KeyError> {
        if s.is_empty() {
            return Err(KeyError {
                reason: "must not be empty",
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(KeyError {
                reason: "contains invalid characters (expected base64url)",
            });
        }
        if PackedKey::from_key(s).is_err() {
            return Err(KeyError {
                reason: "does not decode to a packed key frame",
            });
        }
        Ok(())
    }
}

impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for Key {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
