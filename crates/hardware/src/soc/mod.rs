//! System-on-Chip (SoC) Memory Side.
//!
//! This module organizes the components that make up the physical memory of the emulated
//! machine: the sparse RAM store, the device registry, and the bus that routes between them.

/// Memory-mapped device registry and devices.
pub mod devices;

/// Physical memory facade (bus) routing accesses to devices or RAM.
pub mod interconnect;

/// Sparse paged physical memory.
pub mod memory;

/// Device and translation-cache traits.
pub mod traits;

pub use interconnect::Bus;
pub use memory::PagedMemory;
