//! Byte Codec.
//!
//! Converts between byte sequences and unsigned integers of 1 to 8 bytes. The byte order is
//! chosen per operation, and a caller may pack [`FORCE_LITTLE_ENDIAN`] into the length argument
//! to override it. Bus-side hardware that is always little-endian (PCI windows, for example) uses
//! the flag so the same length argument can travel through generic access paths.

use serde::Deserialize;

/// Flag bit that may be OR'd into a length argument to force little-endian conversion.
pub const FORCE_LITTLE_ENDIAN: usize = 0x100;

const LEN_MASK: usize = 0xff;

/// Byte order of multi-byte values in emulated memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ByteOrder {
    /// Least significant byte at the lowest address.
    #[default]
    Little,
    /// Most significant byte at the lowest address.
    Big,
}

impl ByteOrder {
    /// Resolves the effective byte order for a packed length argument.
    #[inline(always)]
    const fn effective(self, len: usize) -> Self {
        if len & FORCE_LITTLE_ENDIAN != 0 {
            Self::Little
        } else {
            self
        }
    }
}

/// Returns the number of significant bytes encoded in a packed length argument.
#[inline(always)]
pub const fn byte_count(len: usize) -> usize {
    len & LEN_MASK
}

/// Decodes `len` bytes from `buf` into an integer.
///
/// # Arguments
///
/// * `buf` - Source bytes; must hold at least `byte_count(len)` bytes.
/// * `len` - Byte count (1 to 8), optionally OR'd with [`FORCE_LITTLE_ENDIAN`].
/// * `order` - Byte order used unless the flag overrides it.
///
/// # Returns
///
/// The decoded value, zero-extended to 64 bits.
pub fn decode(buf: &[u8], len: usize, order: ByteOrder) -> u64 {
    let bytes = &buf[..byte_count(len)];
    match order.effective(len) {
        ByteOrder::Little => bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
        ByteOrder::Big => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
    }
}

/// Encodes the low `len` bytes of `value` into `buf`.
///
/// Higher bytes of `value` are discarded.
///
/// # Arguments
///
/// * `value` - Value to encode.
/// * `len` - Byte count (1 to 8), optionally OR'd with [`FORCE_LITTLE_ENDIAN`].
/// * `order` - Byte order used unless the flag overrides it.
/// * `buf` - Destination; must hold at least `byte_count(len)` bytes.
pub fn encode(value: u64, len: usize, order: ByteOrder, buf: &mut [u8]) {
    let n = byte_count(len);
    let dest = &mut buf[..n];
    match order.effective(len) {
        ByteOrder::Little => {
            for (i, b) in dest.iter_mut().enumerate() {
                *b = (value >> (8 * i)) as u8;
            }
        }
        ByteOrder::Big => {
            for (i, b) in dest.iter_mut().enumerate() {
                *b = (value >> (8 * (n - 1 - i))) as u8;
            }
        }
    }
}
