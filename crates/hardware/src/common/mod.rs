//! Common utilities and types used throughout the memory subsystem.
//!
//! This module provides the building blocks shared by the bus, the device registry and the
//! loaders. It includes:
//! 1. **Byte Codec:** Endian-aware conversion between byte sequences and integers.
//! 2. **Constants:** MIPS register indices and syscall encoding used by the loaders.
//! 3. **Memory Access:** The direction of a memory access (read or write).
//! 4. **Error Handling:** Memory and loader error types.

/// Endian-aware integer encoding and decoding.
pub mod codec;

/// MIPS and PSP constants used by the loaders.
pub mod constants;

/// Memory access type definitions.
pub mod data;

/// Memory and loader error types.
pub mod error;

pub use codec::{ByteOrder, FORCE_LITTLE_ENDIAN};
pub use data::AccessType;
pub use error::{LoadError, MemoryError};
