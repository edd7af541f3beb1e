//! Memory-mapped device registry.
//!
//! This module keeps the ordered list of device windows on the bus. It provides:
//! 1. **Registration:** Overlap, capacity and dyntrans-buffer checks; sorted insertion.
//! 2. **Lookup:** Binary search over non-overlapping windows plus a coarse `[min, max)` filter.
//! 3. **Dirty Tracking:** The lowest and highest offset written since the last flush, per device.
//! 4. **Flush:** Resets the dirty range and tells the translation cache to drop stale mappings.
//!
//! Windows are kept strictly ascending and non-overlapping; a registration that would break
//! that, or any other check, leaves the registry untouched.

use std::sync::Arc;

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::common::MemoryError;
use crate::config::MemoryConfig;
use crate::soc::memory::block::MemBlock;
use crate::soc::traits::{Device, InvalidateFlags, TranslationCache};

bitflags! {
    /// Capabilities of a device window.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceFlags: u32 {
        /// The CPU may map the window's buffer directly for reads.
        const DYNTRANS_OK = 1 << 0;
        /// The CPU may also write the buffer directly; writes are dirty-tracked.
        const DYNTRANS_WRITE_OK = 1 << 1;
        /// Reads never change device state.
        const READS_HAVE_NO_SIDE_EFFECTS = 1 << 2;
        /// The window is plain RAM emulated by the device itself.
        const EMULATED_RAM = 1 << 3;
        /// Either dyntrans capability; buffer checks apply when any of these is set.
        const DYNTRANS = Self::DYNTRANS_OK.bits() | Self::DYNTRANS_WRITE_OK.bits();
    }
}

/// Stable handle returned by registration.
///
/// Indices shift when devices are added or removed; ids do not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

/// Lowest and highest device-relative offsets written since the last flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRange {
    /// Lowest written offset, or `u64::MAX` when clean.
    pub low: u64,
    /// Highest written offset (inclusive), or `0` when clean.
    pub high: u64,
}

impl DirtyRange {
    /// A range with nothing written.
    pub const EMPTY: Self = Self {
        low: u64::MAX,
        high: 0,
    };

    /// Returns `true` if nothing has been written.
    pub const fn is_empty(&self) -> bool {
        self.low == u64::MAX
    }

    fn widen(&mut self, offset: u64, len: u64) {
        self.low = self.low.min(offset);
        self.high = self.high.max(offset + len.saturating_sub(1));
    }
}

impl Default for DirtyRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Arguments for `DeviceRegistry::register`.
pub struct DeviceRegistration {
    name: String,
    base: u64,
    len: u64,
    device: Box<dyn Device + Send + Sync>,
    flags: DeviceFlags,
    dyntrans_data: Option<Arc<MemBlock>>,
}

impl DeviceRegistration {
    /// Describes a window of `len` bytes at `base` served by `device`, with no flags.
    pub fn new(
        name: impl Into<String>,
        base: u64,
        len: u64,
        device: Box<dyn Device + Send + Sync>,
    ) -> Self {
        Self {
            name: name.into(),
            base,
            len,
            device,
            flags: DeviceFlags::empty(),
            dyntrans_data: None,
        }
    }

    /// Sets the window's capability flags.
    #[must_use]
    pub const fn with_flags(mut self, flags: DeviceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Attaches the buffer the CPU may map directly.
    #[must_use]
    pub fn with_dyntrans_data(mut self, data: Arc<MemBlock>) -> Self {
        self.dyntrans_data = Some(data);
        self
    }
}

impl std::fmt::Debug for DeviceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistration")
            .field("name", &self.name)
            .field("base", &format_args!("{:#x}", self.base))
            .field("len", &format_args!("{:#x}", self.len))
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// One registered window.
pub struct DeviceEntry {
    id: DeviceId,
    name: String,
    base: u64,
    len: u64,
    end: u64,
    flags: DeviceFlags,
    device: Box<dyn Device + Send + Sync>,
    dyntrans_data: Option<Arc<MemBlock>>,
    dirty: DirtyRange,
}

impl DeviceEntry {
    /// Returns the registration handle.
    pub const fn id(&self) -> DeviceId {
        self.id
    }

    /// Returns the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the first physical address of the window.
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Returns the window length in bytes.
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` for a zero-length window (never registered).
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the exclusive end of the window.
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Returns the capability flags.
    pub const fn flags(&self) -> DeviceFlags {
        self.flags
    }

    /// Returns the directly mappable buffer, if any.
    pub const fn dyntrans_data(&self) -> Option<&Arc<MemBlock>> {
        self.dyntrans_data.as_ref()
    }

    /// Returns the range written since the last flush.
    pub const fn dirty(&self) -> DirtyRange {
        self.dirty
    }

    /// Returns `true` if `addr` falls inside the window.
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end
    }

    /// Returns the device behind the window.
    pub fn device_mut(&mut self) -> &mut (dyn Device + Send + Sync) {
        self.device.as_mut()
    }

    const fn dyntrans_enabled(&self) -> bool {
        self.flags.intersects(DeviceFlags::DYNTRANS)
    }
}

impl std::fmt::Debug for DeviceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base", &format_args!("{:#x}", self.base))
            .field("end", &format_args!("{:#x}", self.end))
            .field("flags", &self.flags)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

/// Ordered, non-overlapping device windows.
#[derive(Debug)]
pub struct DeviceRegistry {
    entries: Vec<DeviceEntry>,
    max_devices: usize,
    dyntrans_alignment: u64,
    page_size: u64,
    min_addr: u64,
    max_addr: u64,
    next_id: u32,
}

impl DeviceRegistry {
    /// Creates an empty registry with limits from `config`.
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            entries: Vec::new(),
            max_devices: config.max_devices,
            dyntrans_alignment: config.dyntrans_alignment,
            page_size: config.page_size.max(1),
            min_addr: u64::MAX,
            max_addr: 0,
            next_id: 0,
        }
    }

    /// Registers a device window.
    ///
    /// # Arguments
    ///
    /// * `reg` - Name, window, device, flags and optional dyntrans buffer.
    ///
    /// # Returns
    ///
    /// The new device's id.
    ///
    /// # Errors
    ///
    /// `TooManyDevices`, `EmptyWindow`, `Collision` or one of the dyntrans buffer errors.
    /// The registry is unchanged in every case.
    pub fn register(&mut self, reg: DeviceRegistration) -> Result<DeviceId, MemoryError> {
        if self.entries.len() >= self.max_devices {
            return Err(MemoryError::TooManyDevices {
                max: self.max_devices,
            });
        }
        if reg.len == 0 {
            return Err(MemoryError::EmptyWindow { name: reg.name });
        }

        let end = reg.base.saturating_add(reg.len);
        let pos = self.entries.partition_point(|e| e.end <= reg.base);
        if let Some(existing) = self.entries.get(pos).filter(|e| e.base < end) {
            return Err(MemoryError::Collision {
                name: reg.name,
                existing_index: pos,
                existing_name: existing.name.clone(),
            });
        }

        self.check_dyntrans(&reg)?;
        if reg.flags.intersects(DeviceFlags::DYNTRANS) && reg.base & self.dyntrans_alignment != 0 {
            warn!(
                device = %reg.name,
                base = format_args!("{:#x}", reg.base),
                "dyntrans device base is not page aligned"
            );
        }

        let id = DeviceId(self.next_id);
        self.next_id += 1;

        debug!(
            device = %reg.name,
            base = format_args!("{:#x}", reg.base),
            len = format_args!("{:#x}", reg.len),
            flags = ?reg.flags,
            index = pos,
            "registering device"
        );

        self.min_addr = self.min_addr.min(reg.base & !self.dyntrans_alignment);
        self.max_addr = self
            .max_addr
            .max(((end - 1) | self.dyntrans_alignment).saturating_add(1));

        self.entries.insert(
            pos,
            DeviceEntry {
                id,
                name: reg.name,
                base: reg.base,
                len: reg.len,
                end,
                flags: reg.flags,
                device: reg.device,
                dyntrans_data: reg.dyntrans_data,
                dirty: DirtyRange::EMPTY,
            },
        );
        Ok(id)
    }

    fn check_dyntrans(&self, reg: &DeviceRegistration) -> Result<(), MemoryError> {
        if let Some(data) = &reg.dyntrans_data {
            let addr = data.as_ptr() as usize;
            if addr % std::mem::align_of::<usize>() != 0 {
                return Err(MemoryError::DyntransMisaligned {
                    name: reg.name.clone(),
                    addr,
                });
            }
        }
        if !reg.flags.intersects(DeviceFlags::DYNTRANS) {
            return Ok(());
        }

        match &reg.dyntrans_data {
            Some(data) => {
                let owner = self.entries.iter().find(|e| {
                    e.dyntrans_enabled()
                        && e.dyntrans_data.as_ref().is_some_and(|d| Arc::ptr_eq(d, data))
                });
                match owner {
                    Some(owner) => Err(MemoryError::DyntransReuse {
                        name: reg.name.clone(),
                        owner: owner.name.clone(),
                    }),
                    None => Ok(()),
                }
            }
            None if !reg.flags.contains(DeviceFlags::EMULATED_RAM) => {
                Err(MemoryError::DyntransMissing {
                    name: reg.name.clone(),
                })
            }
            None => Ok(()),
        }
    }

    /// Removes the device at `index`, shifting later devices down.
    ///
    /// # Returns
    ///
    /// The removed device.
    ///
    /// # Errors
    ///
    /// `MemoryError::InvalidDevice` if `index` is out of range.
    pub fn remove(&mut self, index: usize) -> Result<Box<dyn Device + Send + Sync>, MemoryError> {
        if index >= self.entries.len() {
            return Err(MemoryError::InvalidDevice {
                index,
                len: self.entries.len(),
            });
        }
        let entry = self.entries.remove(index);
        debug!(device = %entry.name, index, "removing device");
        self.recompute_bounds();
        Ok(entry.device)
    }

    fn recompute_bounds(&mut self) {
        self.min_addr = u64::MAX;
        self.max_addr = 0;
        for e in &self.entries {
            self.min_addr = self.min_addr.min(e.base & !self.dyntrans_alignment);
            self.max_addr = self
                .max_addr
                .max(((e.end - 1) | self.dyntrans_alignment).saturating_add(1));
        }
    }

    /// Returns `true` if `addr` lies inside the coarse bounds of all windows.
    #[inline(always)]
    pub const fn in_window(&self, addr: u64) -> bool {
        self.min_addr <= addr && addr < self.max_addr
    }

    /// Returns the index of the window containing `addr`.
    pub fn lookup(&self, addr: u64) -> Option<usize> {
        let i = self.entries.partition_point(|e| e.end <= addr);
        self.entries
            .get(i)
            .filter(|e| e.base <= addr)
            .map(|_| i)
    }

    /// Returns the current index of the device with the given id.
    pub fn index_of(&self, id: DeviceId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Returns the entry at `index`.
    pub fn get(&self, index: usize) -> Option<&DeviceEntry> {
        self.entries.get(index)
    }

    /// Returns the entry at `index` mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut DeviceEntry> {
        self.entries.get_mut(index)
    }

    /// Returns the number of registered devices.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no devices are registered.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in address order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.entries.iter()
    }

    /// Returns the coarse `[min, max)` bounds, rounded outward to the dyntrans alignment.
    pub const fn bounds(&self) -> (u64, u64) {
        (self.min_addr, self.max_addr)
    }

    /// Records a write of `len` bytes at device-relative `offset`.
    ///
    /// Only windows with `DYNTRANS_WRITE_OK` track writes.
    pub fn note_write(&mut self, index: usize, offset: u64, len: usize) {
        let tracked = self
            .entries
            .get_mut(index)
            .filter(|e| len > 0 && e.flags.contains(DeviceFlags::DYNTRANS_WRITE_OK));
        if let Some(entry) = tracked {
            entry.dirty.widen(offset, len as u64);
        }
    }

    /// Returns and resets the dirty range of a write-mappable device.
    ///
    /// If anything was written since the last flush, every page of the window is
    /// write-protected in `cache` and cached host pointers into the buffer are dropped.
    ///
    /// # Arguments
    ///
    /// * `id` - Device to flush.
    /// * `cache` - Translation cache of the CPU that maps the buffer.
    ///
    /// # Returns
    ///
    /// The range as it was before the reset, or `None` if `id` does not name a
    /// `DYNTRANS_WRITE_OK` device with a buffer.
    pub fn dyntrans_flush(
        &mut self,
        id: DeviceId,
        cache: &mut dyn TranslationCache,
    ) -> Option<DirtyRange> {
        let page_size = self.page_size;
        let entry = self.entries.iter_mut().find(|e| {
            e.id == id
                && e.flags.contains(DeviceFlags::DYNTRANS_WRITE_OK)
                && e.dyntrans_data.is_some()
        })?;

        let range = std::mem::take(&mut entry.dirty);
        if range.is_empty() {
            return Some(range);
        }

        let mut s = 0u64;
        while s < entry.len {
            cache.invalidate_paddr(
                entry.base + s,
                InvalidateFlags::JUST_MARK_AS_NON_WRITABLE | InvalidateFlags::INVALIDATE_PADDR,
            );
            s += page_size;
        }

        if let Some(data) = &entry.dyntrans_data {
            let start = data.as_ptr() as usize;
            cache.invalidate_host_range(start..start.saturating_add(entry.len as usize));
        }
        Some(range)
    }
}
