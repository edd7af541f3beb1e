//! Memory and Loader Errors.
//!
//! This module defines the error types returned by the memory subsystem. It provides:
//! 1. **Memory Errors:** Geometry, device registration, and access failures.
//! 2. **Load Errors:** I/O, format sniffing, raw specifier and ELF validation failures.
//!
//! Load errors wrap memory errors so a failed write during loading propagates with `?`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::data::AccessType;

/// Errors raised by paged memory, the device registry and the bus.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Page-table and block bits do not add up to the address width.
    #[error(
        "memory geometry mismatch: {pagetable_bits} page-table bits + {memblock_bits} block bits != {max_bits}"
    )]
    Geometry {
        /// Bits indexing the page table.
        pagetable_bits: u32,
        /// Bits addressing bytes within a block.
        memblock_bits: u32,
        /// Total address bits.
        max_bits: u32,
    },

    /// The registry already holds its maximum number of devices.
    #[error("too many memory-mapped devices (limit {max})")]
    TooManyDevices {
        /// Configured device limit.
        max: usize,
    },

    /// A new window overlaps an existing one.
    #[error("\"{name}\" collides with device {existing_index} (\"{existing_name}\")")]
    Collision {
        /// Name of the device being registered.
        name: String,
        /// Index of the device already occupying the range.
        existing_index: usize,
        /// Name of the device already occupying the range.
        existing_name: String,
    },

    /// The translation buffer is already owned by another dyntrans-enabled device.
    #[error("\"{name}\": dyntrans buffer is already used by device \"{owner}\"")]
    DyntransReuse {
        /// Name of the device being registered.
        name: String,
        /// Name of the device owning the buffer.
        owner: String,
    },

    /// A dyntrans-enabled device that is not emulated RAM supplied no buffer.
    #[error("\"{name}\": dyntrans enabled, but no dyntrans buffer")]
    DyntransMissing {
        /// Name of the device being registered.
        name: String,
    },

    /// The translation buffer is not pointer-size aligned.
    #[error("\"{name}\": dyntrans buffer at host address {addr:#x} is not aligned")]
    DyntransMisaligned {
        /// Name of the device being registered.
        name: String,
        /// Host address of the buffer.
        addr: usize,
    },

    /// The window has zero length.
    #[error("\"{name}\": device window has zero length")]
    EmptyWindow {
        /// Name of the device being registered.
        name: String,
    },

    /// A registry index does not name a device.
    #[error("invalid device index {index} ({len} devices registered)")]
    InvalidDevice {
        /// Requested index.
        index: usize,
        /// Number of registered devices.
        len: usize,
    },

    /// A RAM access reaches beyond the end of physical memory.
    #[error("{len}-byte access at {addr:#x} is beyond physical memory end {physical_max:#x}")]
    OutOfRange {
        /// Start address of the access.
        addr: u64,
        /// Access length in bytes.
        len: usize,
        /// Exclusive end of physical memory.
        physical_max: u64,
    },

    /// A device rejected an access.
    #[error("device \"{name}\" rejected {access} of {len} bytes at {addr:#x}")]
    DeviceFault {
        /// Device name.
        name: String,
        /// Physical address of the access.
        addr: u64,
        /// Access length in bytes.
        len: usize,
        /// Direction of the access.
        access: AccessType,
    },
}

/// Errors raised while sniffing and loading executables.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be opened or read.
    #[error("could not read '{}': {source}", .path.display())]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A raw-binary specifier could not be parsed.
    #[error("bad raw binary specifier '{spec}': {reason}")]
    BadSpecifier {
        /// The specifier as given.
        spec: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The file is shorter than the sniffer probe.
    #[error("'{}': file is too small to contain anything useful", .path.display())]
    TooSmall {
        /// Path of the file.
        path: PathBuf,
    },

    /// The file is gzip-compressed.
    #[error("'{}' seems to be a gzipped file; uncompress it first", .path.display())]
    Gzipped {
        /// Path of the file.
        path: PathBuf,
    },

    /// The file exceeds the configured image size limit.
    #[error("'{}' is {size} bytes, too large for a kernel; is it a disk image?", .path.display())]
    TooLarge {
        /// Path of the file.
        path: PathBuf,
        /// File size in bytes.
        size: u64,
    },

    /// The leading bytes match no known format.
    #[error("unknown file format of '{}' (first bytes: {probe}){}", .path.display(), boot_hint(.boot_sector))]
    UnknownFormat {
        /// Path of the file.
        path: PathBuf,
        /// Hex dump of the probed bytes.
        probe: String,
        /// Whether a PC boot-sector signature sits at offset 510.
        boot_sector: bool,
    },

    /// The ELF magic is missing or the file is shorter than an ELF header.
    #[error("'{}' is not an ELF file", .path.display())]
    NotElf {
        /// Path of the file.
        path: PathBuf,
    },

    /// The ELF class is not 32-bit.
    #[error("'{}': only 32-bit ELF files are supported (class {class})", .path.display())]
    UnsupportedClass {
        /// Path of the file.
        path: PathBuf,
        /// `EI_CLASS` value.
        class: u8,
    },

    /// The ELF data encoding is neither LSB nor MSB.
    #[error("'{}': unknown ELF data encoding {encoding}", .path.display())]
    UnknownEncoding {
        /// Path of the file.
        path: PathBuf,
        /// `EI_DATA` value.
        encoding: u8,
    },

    /// A header entry size does not match the ELF32 layout.
    #[error("'{}': {what} is {found} bytes, expected {expected}; perhaps this is a dynamically linked binary", .path.display())]
    HeaderSize {
        /// Path of the file.
        path: PathBuf,
        /// Which entry size (`e_phentsize` or `e_shentsize`).
        what: &'static str,
        /// Size found in the header.
        found: u16,
        /// Size required.
        expected: u16,
    },

    /// The ELF type is not `ET_EXEC`.
    #[error("'{}' is not an executable (e_type {e_type})", .path.display())]
    NotExecutable {
        /// Path of the file.
        path: PathBuf,
        /// `e_type` value.
        e_type: u16,
    },

    /// The ELF machine is not MIPS.
    #[error("'{}': wrong machine {machine}, expected MIPS", .path.display())]
    WrongMachine {
        /// Path of the file.
        path: PathBuf,
        /// Human-readable machine name.
        machine: String,
    },

    /// A segment's memory size is smaller than its file size.
    #[error("'{}': segment memsz {memsz:#x} is smaller than filesz {filesz:#x}", .path.display())]
    SegmentShrinks {
        /// Path of the file.
        path: PathBuf,
        /// `p_memsz` value.
        memsz: u64,
        /// `p_filesz` value.
        filesz: u64,
    },

    /// A header table or segment extends past the end of the file.
    #[error("'{}': {what} extends past end of file", .path.display())]
    Truncated {
        /// Path of the file.
        path: PathBuf,
        /// What was being read.
        what: &'static str,
    },

    /// Writing the image into memory failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn boot_hint(boot_sector: &bool) -> &'static str {
    if *boot_sector {
        "; it has a PC-style 0x55 0xAA boot sector marker"
    } else {
        ""
    }
}
