//! Command implementations, kept free of terminal I/O so they can be tested.

use crate::config::KeyRequest;
use dx_keygen::{Key, PackedKey, PackedKeyError};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Generate the key described by a resolved request.
#[must_use]
pub fn generate(request: &KeyRequest) -> Key {
    let key = Key::generate(
        request.device_id,
        request.secret.expose_secret(),
        request.change_counter,
        &request.callsign,
    );
    tracing::info!(
        device_id = request.device_id,
        change_counter = request.change_counter,
        callsign = %request.callsign.to_ascii_uppercase(),
        key_len = key.as_str().len(),
        "generated access key"
    );
    key
}

/// Read a hex secret from a file. Surrounding whitespace is dropped later by
/// [`dx_keygen::DeviceSecret::from_hex`].
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_secret_file(path: &Path) -> std::io::Result<String> {
    let contents = std::fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), "read device secret from file");
    Ok(contents)
}

/// The fields recovered from a key, without any check of its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub device_id: u64,
    pub change_counter: u64,
    pub digest: String,
}

impl From<&PackedKey> for Inspection {
    fn from(packed: &PackedKey) -> Self {
        Self {
            device_id: packed.device_id(),
            change_counter: packed.change_counter(),
            digest: hex::encode(packed.digest()),
        }
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "device_id: {}", self.device_id)?;
        writeln!(f, "change_counter: {}", self.change_counter)?;
        write!(f, "digest: {}", self.digest)
    }
}

/// Split a key into its fields.
///
/// # Errors
/// Returns an error if the key is not a well-formed packed frame.
pub fn inspect(key: &str) -> Result<Inspection, PackedKeyError> {
    let packed = PackedKey::from_key(key.trim())?;
    tracing::debug!(?packed, "unpacked key");
    Ok(Inspection::from(&packed))
}
