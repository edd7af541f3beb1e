//! MIPS and PSP Constants.
//!
//! This module defines constants shared by the loaders. It includes:
//! 1. **Registers:** General-purpose register indices used for initial machine state.
//! 2. **Syscall Encoding:** The instruction patched into PSP import stubs.
//! 3. **Sniffing:** Magic numbers recognized by the format sniffer.

/// MIPS general-purpose register `a0` (first argument).
pub const REG_A0: u8 = 4;

/// MIPS general-purpose register `a1` (second argument).
pub const REG_A1: u8 = 5;

/// MIPS general-purpose register `a2` (third argument).
pub const REG_A2: u8 = 6;

/// MIPS general-purpose register `gp` (global pointer).
pub const REG_GP: u8 = 28;

/// Function field of the MIPS `syscall` instruction.
pub const SYSCALL_FUNCT: u32 = 0x0C;

/// Position of the 20-bit code field in the MIPS `syscall` instruction.
pub const SYSCALL_CODE_SHIFT: u32 = 6;

/// Syscall code written for imports whose NID has no known handler.
pub const UNRESOLVED_NID_SYSCALL: u32 = 0x0C;

/// Offset of the second instruction slot within an 8-byte import stub.
pub const STUB_SYSCALL_OFFSET: u64 = 4;

/// Size of one import stub in bytes (`jr ra` followed by `syscall`).
pub const STUB_SIZE: u64 = 8;

/// ELF identification magic.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// gzip stream magic.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// PC boot-sector signature found at offset 510.
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xaa];

/// Encodes a MIPS `syscall` instruction carrying `code`.
#[inline(always)]
pub const fn syscall_instruction(code: u32) -> u32 {
    (code << SYSCALL_CODE_SHIFT) | SYSCALL_FUNCT
}
