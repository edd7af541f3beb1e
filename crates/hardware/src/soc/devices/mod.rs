//! Memory-Mapped Devices.
//!
//! This module contains the device registry that the bus consults before falling back to
//! RAM, and the buffer-backed RAM device used for directly mappable windows such as VRAM.

/// Buffer-backed RAM device.
pub mod ram;

/// Ordered device windows with dirty tracking.
pub mod registry;

pub use ram::RamDevice;
pub use registry::{
    DeviceEntry, DeviceFlags, DeviceId, DeviceRegistration, DeviceRegistry, DirtyRange,
};

pub use crate::soc::traits::Device;
