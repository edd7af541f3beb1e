//! PSP-class MIPS physical memory and executable loading library.
//!
//! This crate implements the memory side of a 32-bit MIPS machine emulator with the following:
//! 1. **Memory:** A sparse, lazily allocated physical address space split into fixed-size blocks.
//! 2. **Devices:** An ordered registry of memory-mapped device windows with dirty-range tracking
//!    for the dynamic-translation fast path.
//! 3. **Bus:** The single read/write entry point that routes between devices and RAM.
//! 4. **Loading:** Format sniffing, raw binary and ELF32 loaders, PSP module-info and import-stub
//!    patching, symbol registration, and platform personalities.
//! 5. **Configuration:** Geometry and loader limits, deserializable from JSON.

/// Common types and constants (byte codec, access types, errors, MIPS constants).
pub mod common;
/// Memory and loader configuration (defaults, JSON deserialization).
pub mod config;
/// Executable loading (sniffer, raw and ELF loaders, symbols, personalities).
pub mod sim;
/// System-on-chip memory side (bus, paged memory, device registry, traits).
pub mod soc;

/// Root configuration type; use `Config::default()` or `Config::from_json`.
pub use crate::config::Config;
/// Physical memory facade; construct with `Bus::new`.
pub use crate::soc::interconnect::Bus;
