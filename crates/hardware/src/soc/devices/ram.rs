//! Buffer-backed RAM device.
//!
//! A `RamDevice` serves a window from one `MemBlock` that it shares with the registry, so the
//! CPU can map the same host bytes directly on the dynamic-translation fast path. Video RAM is
//! the usual example: the emulator draws from the buffer while guest code writes into it.

use std::sync::Arc;

use crate::common::AccessType;
use crate::soc::devices::registry::{DeviceFlags, DeviceRegistration};
use crate::soc::memory::block::MemBlock;
use crate::soc::traits::Device;

/// RAM window backed by a shared, directly mappable buffer.
#[derive(Debug)]
pub struct RamDevice {
    buffer: Arc<MemBlock>,
}

impl RamDevice {
    /// Creates a device with a zero-filled buffer of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            buffer: Arc::new(MemBlock::new(size)),
        }
    }

    /// Returns the shared buffer.
    pub const fn buffer(&self) -> &Arc<MemBlock> {
        &self.buffer
    }

    /// Builds a registration for this device at `base` with dyntrans read and write enabled.
    ///
    /// # Arguments
    ///
    /// * `name` - Device name used in logs and errors.
    /// * `base` - First physical address of the window.
    ///
    /// # Returns
    ///
    /// A registration covering the whole buffer, carrying the buffer as dyntrans data.
    pub fn into_registration(self, name: impl Into<String>, base: u64) -> DeviceRegistration {
        let buffer = Arc::clone(&self.buffer);
        let len = buffer.len() as u64;
        DeviceRegistration::new(name, base, len, Box::new(self))
            .with_flags(
                DeviceFlags::DYNTRANS_OK
                    | DeviceFlags::DYNTRANS_WRITE_OK
                    | DeviceFlags::READS_HAVE_NO_SIDE_EFFECTS,
            )
            .with_dyntrans_data(buffer)
    }
}

impl Device for RamDevice {
    fn access(&mut self, offset: u64, data: &mut [u8], access: AccessType) -> bool {
        let Ok(offset) = usize::try_from(offset) else {
            return false;
        };
        if offset
            .checked_add(data.len())
            .is_none_or(|end| end > self.buffer.len())
        {
            return false;
        }
        match access {
            AccessType::Read => self.buffer.read_into(offset, data),
            AccessType::Write => self.buffer.write_slice(offset, data),
        }
        true
    }

    fn as_ram_mut(&mut self) -> Option<&mut RamDevice> {
        Some(self)
    }
}
