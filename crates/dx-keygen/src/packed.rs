//! Packed key frame: the binary layout behind every access key.
//!
//! Variable layout, no delimiters:
//!
//! | Offset        | Size      | Field                                  |
//! |---------------|-----------|----------------------------------------|
//! | 0             | 1         | descriptor                             |
//! | 1             | `L_id+1`  | device id (LE, minimal)                |
//! | 2 + `L_id`    | `L_ctr+1` | change counter (LE, minimal)           |
//! | 3 + `L_id+L_ctr` | 16     | SHA-256 digest, first 16 bytes         |
//!
//! Descriptor bits 0-2 hold `L_id`, bits 3-5 hold `L_ctr`, bits 6-7 are zero.

use crate::varint::{load_int, store_int};
use crate::{decode_base64url, encode_base64url, DecodeError};
use std::fmt;

/// Number of digest bytes kept in a key.
pub const DIGEST_LEN: usize = 16;
/// Width mask of one length indicator.
const INDICATOR_MASK: u8 = 0b0000_0111;
/// Shift of the change counter indicator within the descriptor.
const COUNTER_SHIFT: u8 = 3;
/// Bits that must stay clear in a well-formed descriptor.
const RESERVED_MASK: u8 = 0b1100_0000;
/// Smallest possible frame: descriptor + 1-byte id + 1-byte counter + digest.
const MIN_FRAME_SIZE: usize = 1 + 1 + 1 + DIGEST_LEN; // 19
/// Largest possible frame: descriptor + 8-byte id + 8-byte counter + digest.
const MAX_FRAME_SIZE: usize = 1 + 8 + 8 + DIGEST_LEN; // 33

/// The descriptor byte: two 3-bit length indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    id_indicator: u8,
    counter_indicator: u8,
}

impl Descriptor {
    /// Pack two length indicators. Each is masked to 3 bits.
    #[must_use]
    pub const fn new(id_indicator: u8, counter_indicator: u8) -> Self {
        Self {
            id_indicator: id_indicator & INDICATOR_MASK,
            counter_indicator: counter_indicator & INDICATOR_MASK,
        }
    }

    /// Unpack a descriptor byte.
    ///
    /// # Errors
    ///
    /// Returns `PackedKeyError::ReservedBitsSet` if bit 6 or 7 is set.
    pub fn from_byte(byte: u8) -> Result<Self, PackedKeyError> {
        if byte & RESERVED_MASK != 0 {
            return Err(PackedKeyError::ReservedBitsSet(byte));
        }
        Ok(Self::new(byte, byte >> COUNTER_SHIFT))
    }

    /// The on-wire byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self.id_indicator | (self.counter_indicator << COUNTER_SHIFT)
    }

    /// Byte length of the encoded device id.
    #[must_use]
    pub const fn id_len(self) -> usize {
        self.id_indicator as usize + 1
    }

    /// Byte length of the encoded change counter.
    #[must_use]
    pub const fn counter_len(self) -> usize {
        self.counter_indicator as usize + 1
    }

    /// Total frame size this descriptor announces.
    #[must_use]
    pub const fn frame_len(self) -> usize {
        1 + self.id_len() + self.counter_len() + DIGEST_LEN
    }
}

/// Errors from splitting a key back into its fields.
#[derive(Debug, thiserror::Error)]
pub enum PackedKeyError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Packed key too short ({0} bytes)")]
    TooShort(usize),
    #[error("Packed key too long ({0} bytes)")]
    TooLong(usize),
    #[error("Descriptor byte {0:#04x} has reserved bits set")]
    ReservedBitsSet(u8),
    #[error("Packed key has {0} trailing bytes after the digest")]
    TrailingBytes(usize),
    #[error("Packed key {0} field is not minimally encoded")]
    NonCanonical(&'static str),
}

/// A key frame split into its fields.
///
/// Construct via [`PackedKey::new`] (when generating) or
/// [`PackedKey::parse`] / [`PackedKey::from_key`] (when reading a key back).
/// Parsing only splits the frame; it says nothing about whether the digest
/// was produced from the right secret.
#[derive(Clone, PartialEq, Eq)]
pub struct PackedKey {
    device_id: u64,
    change_counter: u64,
    digest: [u8; DIGEST_LEN],
}

impl PackedKey {
    #[must_use]
    pub const fn new(device_id: u64, change_counter: u64, digest: [u8; DIGEST_LEN]) -> Self {
        Self {
            device_id,
            change_counter,
            digest,
        }
    }

    /// Assemble the frame bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(MAX_FRAME_SIZE);
        // Descriptor placeholder, filled once both lengths are known
        raw.push(0);
        let id_indicator = store_int(&mut raw, self.device_id);
        let counter_indicator = store_int(&mut raw, self.change_counter);
        raw[0] = Descriptor::new(id_indicator, counter_indicator).to_byte();
        raw.extend_from_slice(&self.digest);
        raw
    }

    /// Encode the frame as URL-safe unpadded base64.
    #[must_use]
    pub fn encode(&self) -> String {
        encode_base64url(&self.to_bytes())
    }

    /// Split raw frame bytes into fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is shorter or longer than its descriptor
    /// announces, if the descriptor's reserved bits are set, or if an integer
    /// field carries a zero high byte.
    pub fn parse(bytes: &[u8]) -> Result<Self, PackedKeyError> {
        if bytes.len() < MIN_FRAME_SIZE {
            return Err(PackedKeyError::TooShort(bytes.len()));
        }
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(PackedKeyError::TooLong(bytes.len()));
        }

        let descriptor = Descriptor::from_byte(bytes[0])?;
        let expected = descriptor.frame_len();
        if bytes.len() < expected {
            return Err(PackedKeyError::TooShort(bytes.len()));
        }
        if bytes.len() > expected {
            return Err(PackedKeyError::TrailingBytes(bytes.len() - expected));
        }

        let id_end = 1 + descriptor.id_len();
        let counter_end = id_end + descriptor.counter_len();
        let device_id = load_field(&bytes[1..id_end], "device id")?;
        let change_counter = load_field(&bytes[id_end..counter_end], "change counter")?;

        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[counter_end..]);

        Ok(Self {
            device_id,
            change_counter,
            digest,
        })
    }

    /// Decode a base64url key and split it into fields.
    ///
    /// # Errors
    ///
    /// Returns `PackedKeyError::Decode` for invalid base64url, otherwise the
    /// same errors as [`PackedKey::parse`].
    pub fn from_key(key: &str) -> Result<Self, PackedKeyError> {
        let bytes = decode_base64url(key)?;
        Self::parse(&bytes)
    }

    #[must_use]
    pub const fn device_id(&self) -> u64 {
        self.device_id
    }

    #[must_use]
    pub const fn change_counter(&self) -> u64 {
        self.change_counter
    }

    /// The truncated digest, in digest order.
    #[must_use]
    pub const fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }
}

/// Read one integer field, refusing encodings the generator never emits.
fn load_field(bytes: &[u8], field: &'static str) -> Result<u64, PackedKeyError> {
    if bytes.len() > 1 && bytes.last() == Some(&0) {
        return Err(PackedKeyError::NonCanonical(field));
    }
    load_int(bytes).ok_or(PackedKeyError::TooShort(bytes.len()))
}

impl fmt::Debug for PackedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedKey")
            .field("device_id", &self.device_id)
            .field("change_counter", &self.change_counter)
            .field("digest", &hex::encode(self.digest))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: [u8; DIGEST_LEN] = [0xAB; DIGEST_LEN];

    #[test]
    fn descriptor_packs_indicators() {
        assert_eq!(Descriptor::new(0, 0).to_byte(), 0x00);
        assert_eq!(Descriptor::new(1, 0).to_byte(), 0x01);
        assert_eq!(Descriptor::new(0, 1).to_byte(), 0x08);
        assert_eq!(Descriptor::new(7, 7).to_byte(), 0x3F);
    }

    #[test]
    fn descriptor_rejects_reserved_bits() {
        assert!(matches!(
            Descriptor::from_byte(0x40),
            Err(PackedKeyError::ReservedBitsSet(0x40))
        ));
        assert!(matches!(
            Descriptor::from_byte(0x80),
            Err(PackedKeyError::ReservedBitsSet(0x80))
        ));
    }

    #[test]
    fn descriptor_byte_roundtrip() {
        for byte in 0u8..=0x3F {
            let descriptor = Descriptor::from_byte(byte).expect("valid");
            assert_eq!(descriptor.to_byte(), byte);
        }
    }

    #[test]
    fn small_frame_layout() {
        let bytes = PackedKey::new(1, 1, DIGEST).to_bytes();
        assert_eq!(bytes.len(), MIN_FRAME_SIZE);
        assert_eq!(&bytes[..3], &[0x00, 0x01, 0x01]);
        assert_eq!(&bytes[3..], &DIGEST);
    }

    #[test]
    fn max_frame_layout() {
        let bytes = PackedKey::new(u64::MAX, u64::MAX, DIGEST).to_bytes();
        assert_eq!(bytes.len(), MAX_FRAME_SIZE);
        assert_eq!(bytes[0], 0x3F);
        assert_eq!(&bytes[1..17], &[0xFF; 16]);
    }

    #[test]
    fn mixed_width_frame_layout() {
        let bytes = PackedKey::new(0x1FF, 0, DIGEST).to_bytes();
        assert_eq!(&bytes[..4], &[0x01, 0xFF, 0x01, 0x00]);
    }

    #[test]
    fn parse_recovers_fields() {
        let packed = PackedKey::new(0x1234_5678, 42, DIGEST);
        let parsed = PackedKey::parse(&packed.to_bytes()).expect("parse");
        assert_eq!(parsed, packed);
        assert_eq!(parsed.device_id(), 0x1234_5678);
        assert_eq!(parsed.change_counter(), 42);
        assert_eq!(parsed.digest(), &DIGEST);
    }

    #[test]
    fn parse_rejects_too_short() {
        assert!(matches!(
            PackedKey::parse(&[0u8; 10]),
            Err(PackedKeyError::TooShort(10))
        ));
    }

    #[test]
    fn parse_rejects_too_long() {
        assert!(matches!(
            PackedKey::parse(&[0u8; MAX_FRAME_SIZE + 1]),
            Err(PackedKeyError::TooLong(_))
        ));
    }

    #[test]
    fn parse_rejects_frame_shorter_than_descriptor_says() {
        // Descriptor announces an 8-byte id, only 19 bytes present
        let mut raw = vec![0u8; MIN_FRAME_SIZE];
        raw[0] = 0x07;
        assert!(matches!(
            PackedKey::parse(&raw),
            Err(PackedKeyError::TooShort(19))
        ));
    }

    #[test]
    fn parse_rejects_trailing_bytes() {
        let mut raw = PackedKey::new(1, 1, DIGEST).to_bytes();
        raw.push(0);
        assert!(matches!(
            PackedKey::parse(&raw),
            Err(PackedKeyError::TrailingBytes(1))
        ));
    }

    #[test]
    fn parse_rejects_non_canonical_fields() {
        let cases = [
            (vec![0x01, 0x01, 0x00, 0x01], "device id", "zero top byte in id"),
            (vec![0x08, 0x01, 0x01, 0x00], "change counter", "zero top byte in counter"),
            (vec![0x01, 0x00, 0x00, 0x00], "device id", "zero padded to two bytes"),
            (vec![0x09, 0x01, 0x00, 0x02, 0x00], "device id", "both fields padded"),
        ];

        for (head, field, desc) in cases {
            let mut raw = head;
            raw.extend_from_slice(&DIGEST);
            match PackedKey::parse(&raw) {
                Err(PackedKeyError::NonCanonical(got)) => assert_eq!(got, field, "case '{desc}'"),
                other => panic!("case '{desc}': expected NonCanonical, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_accepts_high_zero_free_multibyte_fields() {
        let mut raw = vec![0x09, 0x00, 0x01, 0x00, 0x01];
        raw.extend_from_slice(&DIGEST);
        let parsed = PackedKey::parse(&raw).expect("parse");
        assert_eq!(parsed.device_id(), 0x100);
        assert_eq!(parsed.change_counter(), 0x100);
        assert_eq!(parsed.to_bytes(), raw);
    }

    #[test]
    fn parse_rejects_reserved_bits() {
        let mut raw = PackedKey::new(1, 1, DIGEST).to_bytes();
        raw[0] |= 0x80;
        assert!(matches!(
            PackedKey::parse(&raw),
            Err(PackedKeyError::ReservedBitsSet(_))
        ));
    }

    #[test]
    fn from_key_rejects_invalid_base64url() {
        assert!(matches!(
            PackedKey::from_key("not valid base64!!!"),
            Err(PackedKeyError::Decode(_))
        ));
    }

    #[test]
    fn debug_shows_digest_as_hex() {
        let packed = PackedKey::new(7, 3, [0u8; DIGEST_LEN]);
        let debug = format!("{packed:?}");
        assert!(debug.contains("device_id: 7"));
        assert!(debug.contains(&"00".repeat(DIGEST_LEN)));
    }
}
