//! System interconnect (bus) for physical memory access.
//!
//! This module implements the single read/write entry point for physical addresses. It provides:
//! 1. **Access routing:** Device windows take precedence; everything else is sparse RAM.
//! 2. **Typed access:** Byte, half, word and doubleword helpers using the bus byte order, plus a
//!    packed-length form that honours `FORCE_LITTLE_ENDIAN`.
//! 3. **Loading:** Bulk writes for loaders (`load_binary_at`).
//! 4. **Inspection:** String probing helpers used by tracing and syscall argument dumps.

use tracing::trace;

use crate::common::codec::{self, ByteOrder, FORCE_LITTLE_ENDIAN};
use crate::common::{AccessType, MemoryError};
use crate::config::Config;
use crate::soc::devices::{DeviceId, DeviceRegistration, DeviceRegistry, DirtyRange};
use crate::soc::memory::PagedMemory;
use crate::soc::traits::TranslationCache;

/// Physical memory facade combining sparse RAM and memory-mapped devices.
#[derive(Debug)]
pub struct Bus {
    memory: PagedMemory,
    devices: DeviceRegistry,
    byte_order: ByteOrder,
}

impl Bus {
    /// Creates a bus with empty RAM and no devices.
    ///
    /// # Arguments
    ///
    /// * `config` - Memory geometry, device limits and the initial byte order.
    ///
    /// # Errors
    ///
    /// `MemoryError::Geometry` if the memory geometry is inconsistent.
    pub fn new(config: &Config) -> Result<Self, MemoryError> {
        Ok(Self {
            memory: PagedMemory::new(&config.memory)?,
            devices: DeviceRegistry::new(&config.memory),
            byte_order: config.loader.byte_order,
        })
    }

    /// Returns the byte order used by the typed helpers.
    pub const fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Sets the byte order used by the typed helpers.
    pub const fn set_byte_order(&mut self, order: ByteOrder) {
        self.byte_order = order;
    }

    /// Returns the sparse RAM store.
    pub const fn memory(&self) -> &PagedMemory {
        &self.memory
    }

    /// Returns the sparse RAM store mutably.
    pub const fn memory_mut(&mut self) -> &mut PagedMemory {
        &mut self.memory
    }

    /// Returns the device registry.
    pub const fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Returns the device registry mutably.
    pub const fn devices_mut(&mut self) -> &mut DeviceRegistry {
        &mut self.devices
    }

    /// Registers a memory-mapped device.
    ///
    /// # Errors
    ///
    /// Any registration error from `DeviceRegistry::register`.
    pub fn register_device(&mut self, reg: DeviceRegistration) -> Result<DeviceId, MemoryError> {
        self.devices.register(reg)
    }

    /// Returns and resets a device's dirty range; see `DeviceRegistry::dyntrans_flush`.
    pub fn dyntrans_flush(
        &mut self,
        id: DeviceId,
        cache: &mut dyn TranslationCache,
    ) -> Option<DirtyRange> {
        self.devices.dyntrans_flush(id, cache)
    }

    fn device_at(&self, addr: u64) -> Option<usize> {
        if self.devices.in_window(addr) {
            self.devices.lookup(addr)
        } else {
            None
        }
    }

    fn device_access(
        &mut self,
        index: usize,
        addr: u64,
        buf: &mut [u8],
        access: AccessType,
    ) -> Result<(), MemoryError> {
        let Some(entry) = self.devices.get_mut(index) else {
            return Err(MemoryError::InvalidDevice {
                index,
                len: self.devices.len(),
            });
        };
        let offset = addr - entry.base();
        if !entry.device_mut().access(offset, buf, access) {
            return Err(MemoryError::DeviceFault {
                name: entry.name().to_owned(),
                addr,
                len: buf.len(),
                access,
            });
        }
        if access == AccessType::Write {
            self.devices.note_write(index, offset, buf.len());
        }
        Ok(())
    }

    fn check_ram_range(&self, addr: u64, len: usize) -> Result<(), MemoryError> {
        let physical_max = self.memory.physical_max();
        if addr
            .checked_add(len as u64)
            .is_none_or(|end| end > physical_max)
        {
            return Err(MemoryError::OutOfRange {
                addr,
                len,
                physical_max,
            });
        }
        Ok(())
    }

    /// Performs one access at a physical address.
    ///
    /// If a registered device window contains `addr`, the device serves the whole access.
    /// Otherwise the access goes to RAM, where reads of never-written blocks return zeroes.
    ///
    /// # Arguments
    ///
    /// * `addr` - Physical address.
    /// * `buf` - Destination for reads, source for writes.
    /// * `access` - Direction.
    ///
    /// # Errors
    ///
    /// `MemoryError::DeviceFault` if the device refused, `MemoryError::OutOfRange` if a RAM
    /// access reaches the end of physical memory (nothing is written in that case).
    pub fn access(
        &mut self,
        addr: u64,
        buf: &mut [u8],
        access: AccessType,
    ) -> Result<(), MemoryError> {
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(index) = self.device_at(addr) {
            return self.device_access(index, addr, buf, access);
        }
        self.check_ram_range(addr, buf.len())?;
        match access {
            AccessType::Read => self.memory.read(addr, buf),
            AccessType::Write => self.memory.write(addr, buf),
        }
        Ok(())
    }

    /// Reads `buf.len()` bytes starting at `addr`.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        self.access(addr, buf, AccessType::Read)
    }

    /// Writes `data` starting at `addr`.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), MemoryError> {
        if data.is_empty() {
            return Ok(());
        }
        if let Some(index) = self.device_at(addr) {
            let mut scratch = data.to_vec();
            return self.device_access(index, addr, &mut scratch, AccessType::Write);
        }
        self.check_ram_range(addr, data.len())?;
        self.memory.write(addr, data);
        Ok(())
    }

    /// Writes a binary blob at the given physical address.
    ///
    /// # Arguments
    ///
    /// * `data` - Bytes to write.
    /// * `addr` - Physical base address.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn load_binary_at(&mut self, data: &[u8], addr: u64) -> Result<(), MemoryError> {
        trace!(
            addr = format_args!("{addr:#x}"),
            len = data.len(),
            "loading binary"
        );
        self.write(addr, data)
    }

    /// Reads an integer whose size is given by a packed length argument.
    ///
    /// # Arguments
    ///
    /// * `addr` - Physical address.
    /// * `len` - Byte count, optionally OR'd with `FORCE_LITTLE_ENDIAN`. Counts above 8 are
    ///   clamped to 8.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn read_word(&mut self, addr: u64, len: usize) -> Result<u64, MemoryError> {
        let len = word_len(len);
        let mut buf = [0u8; 8];
        let n = codec::byte_count(len);
        self.read(addr, &mut buf[..n])?;
        Ok(codec::decode(&buf, len, self.byte_order))
    }

    /// Writes an integer whose size is given by a packed length argument.
    ///
    /// # Arguments
    ///
    /// * `addr` - Physical address.
    /// * `len` - Byte count, optionally OR'd with `FORCE_LITTLE_ENDIAN`. Counts above 8 are
    ///   clamped to 8.
    /// * `value` - Value; bytes above `len` are discarded.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn write_word(&mut self, addr: u64, len: usize, value: u64) -> Result<(), MemoryError> {
        let len = word_len(len);
        let mut buf = [0u8; 8];
        let n = codec::byte_count(len);
        codec::encode(value, len, self.byte_order, &mut buf);
        self.write(addr, &buf[..n])
    }

    /// Reads one byte at the given physical address.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn read_u8(&mut self, paddr: u64) -> Result<u8, MemoryError> {
        self.read_word(paddr, 1).map(|v| v as u8)
    }
    /// Reads two bytes in bus byte order.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn read_u16(&mut self, paddr: u64) -> Result<u16, MemoryError> {
        self.read_word(paddr, 2).map(|v| v as u16)
    }
    /// Reads four bytes in bus byte order.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn read_u32(&mut self, paddr: u64) -> Result<u32, MemoryError> {
        self.read_word(paddr, 4).map(|v| v as u32)
    }
    /// Reads eight bytes in bus byte order.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn read_u64(&mut self, paddr: u64) -> Result<u64, MemoryError> {
        self.read_word(paddr, 8)
    }

    /// Writes one byte at the given physical address.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn write_u8(&mut self, paddr: u64, val: u8) -> Result<(), MemoryError> {
        self.write_word(paddr, 1, u64::from(val))
    }
    /// Writes two bytes in bus byte order.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn write_u16(&mut self, paddr: u64, val: u16) -> Result<(), MemoryError> {
        self.write_word(paddr, 2, u64::from(val))
    }
    /// Writes four bytes in bus byte order.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn write_u32(&mut self, paddr: u64, val: u32) -> Result<(), MemoryError> {
        self.write_word(paddr, 4, u64::from(val))
    }
    /// Writes eight bytes in bus byte order.
    ///
    /// # Errors
    ///
    /// See [`Bus::access`].
    pub fn write_u64(&mut self, paddr: u64, val: u64) -> Result<(), MemoryError> {
        self.write_word(paddr, 8, val)
    }

    /// Reads a byte for inspection; failed reads yield `0`.
    fn peek(&mut self, addr: u64) -> u8 {
        self.read_u8(addr).unwrap_or(0)
    }

    /// Returns `true` if at least `min_len` printable characters start at `addr`.
    ///
    /// Tab, newline and carriage return count as printable.
    pub fn points_to_string(&mut self, addr: u64, min_len: usize) -> bool {
        let mut len = 0usize;
        loop {
            if len >= min_len {
                return true;
            }
            let c = self.peek(addr.wrapping_add(len as u64));
            if matches!(c, b'\n' | b'\t' | b'\r' | 0x20..=0x7e) {
                len += 1;
            } else {
                return false;
            }
        }
    }

    /// Reads a string from emulated memory for display.
    ///
    /// Stops at the first byte that is neither printable ASCII nor `\n`, `\r`, `\t`; those three
    /// are escaped. At most `max_len` output characters are produced.
    pub fn read_c_string(&mut self, addr: u64, max_len: usize) -> String {
        let mut out = String::new();
        let mut cur = addr;
        while out.len() < max_len {
            let c = self.peek(cur);
            let escaped = match c {
                0x20..=0x7e => {
                    out.push(char::from(c));
                    None
                }
                b'\n' => Some('n'),
                b'\r' => Some('r'),
                b'\t' => Some('t'),
                _ => break,
            };
            if let Some(e) = escaped {
                out.push('\\');
                if out.len() < max_len {
                    out.push(e);
                }
            }
            cur = cur.wrapping_add(1);
        }
        out
    }
}

/// Limits a packed length argument to one 64-bit word, keeping the byte-order flag.
const fn word_len(len: usize) -> usize {
    let n = codec::byte_count(len);
    (len & FORCE_LITTLE_ENDIAN) | if n > 8 { 8 } else { n }
}
