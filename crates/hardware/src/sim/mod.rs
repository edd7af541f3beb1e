//! Executable loading.
//!
//! Provides the format sniffer and the loaders that populate physical memory before
//! emulated execution begins, together with the symbol and platform hooks they report to.

/// ELF32 MIPS loader with PSP module processing.
pub mod elf;

/// Format sniffer and loader front-end.
pub mod loader;

/// Post-load platform hooks and NID resolution.
pub mod personality;

/// Raw binary loader.
pub mod raw;

/// Symbol registration and lookup.
pub mod symbols;

pub use loader::{Loaded, LoadedImage, Loader, file_load};
pub use personality::{Native, NidResolver, NidTable, Personality, PspExecWrapper};
pub use raw::RawSpec;
pub use symbols::{Symbol, SymbolKind, SymbolStore, SymbolTable};
