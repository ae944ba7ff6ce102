//! Device secret: the bytes that prove possession of the hardware.
//!
//! The secret never appears in a key, a log line or a `Debug` dump. Memory is
//! zeroed on drop.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret bytes shared between a device and the issuing service.
///
/// Access to the bytes is explicit through [`DeviceSecret::expose_secret`],
/// so every use is easy to audit.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DeviceSecret(Vec<u8>);

/// Errors from constructing a [`DeviceSecret`].
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Device secret is empty")]
    Empty,
    #[error("Device secret is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl DeviceSecret {
    /// Wrap secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::Empty` if `bytes` is empty.
    pub fn new(bytes: Vec<u8>) -> Result<Self, SecretError> {
        if bytes.is_empty() {
            return Err(SecretError::Empty);
        }
        Ok(Self(bytes))
    }

    /// Parse a hex-encoded secret. Surrounding whitespace is ignored and
    /// either letter case is accepted.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::InvalidHex` for malformed hex and
    /// `SecretError::Empty` if nothing remains after trimming.
    pub fn from_hex(encoded: &str) -> Result<Self, SecretError> {
        let trimmed = encoded.trim();
        if trimmed.is_empty() {
            return Err(SecretError::Empty);
        }
        Self::new(hex::decode(trimmed)?)
    }

    /// The raw secret bytes.
    #[must_use]
    pub fn expose_secret(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for DeviceSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for DeviceSecret {}

impl fmt::Debug for DeviceSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceSecret([REDACTED; {} bytes])", self.0.len())
    }
}
