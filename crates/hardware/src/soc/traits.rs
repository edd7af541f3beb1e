//! Device and translation-cache traits.
//!
//! This module defines the seams between the memory subsystem and its collaborators. It provides:
//! 1. **Device:** The single access dispatch point for memory-mapped windows.
//! 2. **Translation Cache:** The CPU-side cache of guest-to-host mappings that the registry
//!    invalidates when a device buffer has been written.
//! 3. **Invalidation Flags:** What the cache should drop or downgrade.
//!
//! All devices must be `Send + Sync` so a multi-threaded host can put the bus behind one lock.

use std::ops::Range;

use bitflags::bitflags;

use crate::common::AccessType;
use crate::soc::devices::RamDevice;

/// Trait for memory-mapped devices attached to the bus.
///
/// The bus calls `access` with the offset relative to the device's base address. For reads the
/// device fills `data`; for writes it consumes `data`. Returning `false` reports a device fault.
///
/// Any `FnMut(u64, &mut [u8], AccessType) -> bool` closure is a device, which keeps small
/// register files and test doubles short.
pub trait Device: Send + Sync {
    /// Performs one access at a device-relative offset.
    ///
    /// # Arguments
    ///
    /// * `offset` - Byte offset from the window base.
    /// * `data` - Buffer read into or written from; its length is the access size.
    /// * `access` - Direction of the access.
    ///
    /// # Returns
    ///
    /// `true` if the access succeeded.
    fn access(&mut self, offset: u64, data: &mut [u8], access: AccessType) -> bool;

    /// Returns a mutable reference as `RamDevice` if this device is buffer-backed RAM.
    fn as_ram_mut(&mut self) -> Option<&mut RamDevice> {
        None
    }
}

impl<F> Device for F
where
    F: FnMut(u64, &mut [u8], AccessType) -> bool + Send + Sync,
{
    fn access(&mut self, offset: u64, data: &mut [u8], access: AccessType) -> bool {
        self(offset, data, access)
    }
}

bitflags! {
    /// What a translation cache should do with the entries for an address.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InvalidateFlags: u32 {
        /// Keep the entry but drop its write permission.
        const JUST_MARK_AS_NON_WRITABLE = 1 << 0;
        /// The address is physical.
        const INVALIDATE_PADDR = 1 << 1;
        /// The address is virtual.
        const INVALIDATE_VADDR = 1 << 2;
        /// Drop every entry regardless of address.
        const INVALIDATE_ALL = 1 << 3;
    }
}

/// CPU-side cache of guest-to-host page mappings.
///
/// Implemented by the instruction emulator; the registry calls it from
/// `DeviceRegistry::dyntrans_flush`.
pub trait TranslationCache {
    /// Invalidates or write-protects the cached mapping of one guest page.
    fn invalidate_paddr(&mut self, paddr: u64, flags: InvalidateFlags);

    /// Drops every cached host page pointer that falls inside `range`.
    fn invalidate_host_range(&mut self, range: Range<usize>);
}
