//! Minimal little-endian integer encoding used inside packed keys.
//!
//! An integer is stored as the fewest bytes that represent it, least
//! significant byte first. Zero still takes one byte. The byte count is
//! reported as a 3-bit length indicator (`byte_count - 1`), which the
//! descriptor byte carries so a reader can find field boundaries.

/// Largest number of bytes a `u64` can occupy.
pub const MAX_INT_BYTES: usize = 8;

/// Append the minimal little-endian encoding of `value` to `dest`.
///
/// Returns the length indicator: the number of bytes written minus one.
/// Always in `0..=7`.
#[allow(clippy::cast_possible_truncation)]
pub fn store_int(dest: &mut Vec<u8>, mut value: u64) -> u8 {
    let mut byte_count: u8 = 0;
    loop {
        dest.push((value & 0xFF) as u8);
        value >>= 8;
        byte_count += 1;
        if value == 0 {
            break;
        }
    }
    byte_count - 1
}

/// Read a little-endian integer of 1 to 8 bytes.
///
/// Returns `None` for an empty slice or one longer than eight bytes.
#[must_use]
pub fn load_int(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > MAX_INT_BYTES {
        return None;
    }
    let mut buf = [0u8; MAX_INT_BYTES];
    buf[..bytes.len()].copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}
