//! Memory Access Types.
//!
//! This module defines the direction of a memory access. It is used for:
//! 1. **Allocation:** Reads of unbacked RAM return zeroes; writes allocate a block.
//! 2. **Device Dispatch:** Devices receive the direction alongside the buffer.
//! 3. **Dirty Tracking:** Writes to dynamic-translation windows widen the dirty range.

use std::fmt;

/// Direction of a memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessType {
    /// Data moves from memory into the caller's buffer.
    Read,

    /// Data moves from the caller's buffer into memory.
    Write,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}
