//! RAM device tests.

use pspsim_core::common::AccessType;
use pspsim_core::soc::devices::{Device, DeviceFlags, RamDevice};

#[test]
fn test_buffer_starts_zeroed() {
    let ram = RamDevice::new(0x100);
    assert_eq!(ram.buffer().len(), 0x100);
    let mut contents = vec![0xffu8; 0x100];
    ram.buffer().read_into(0, &mut contents);
    assert!(contents.iter().all(|&b| b == 0));
}

#[test]
fn test_copied_contents_do_not_track_later_writes() {
    let ram = RamDevice::new(0x10);
    let shared = std::sync::Arc::clone(ram.buffer());
    let mut before = [0u8; 4];
    shared.read_into(0, &mut before);

    ram.buffer().write_u8(0, 7);
    assert_eq!(before, [0, 0, 0, 0]);
    assert_eq!(shared.read_u8(0), 7);
}

#[test]
fn test_write_then_read_through_device() {
    let mut ram = RamDevice::new(0x100);
    let mut data = [1, 2, 3, 4];
    assert!(ram.access(0x10, &mut data, AccessType::Write));
    let mut stored = [0u8; 4];
    ram.buffer().read_into(0x10, &mut stored);
    assert_eq!(stored, [1, 2, 3, 4]);

    let mut out = [0u8; 4];
    assert!(ram.access(0x10, &mut out, AccessType::Read));
    assert_eq!(out, [1, 2, 3, 4]);
}

#[test]
fn test_access_past_end_fails() {
    let mut ram = RamDevice::new(0x100);
    let mut buf = [0u8; 4];
    assert!(!ram.access(0xfe, &mut buf, AccessType::Read));
    assert!(!ram.access(u64::MAX, &mut buf, AccessType::Write));
    assert!(ram.access(0xfc, &mut buf, AccessType::Read));
}

#[test]
fn test_registration_enables_dyntrans() {
    let ram = RamDevice::new(0x2000);
    let buffer = ram.buffer().clone();
    let reg = ram.into_registration("vram", 0x0400_0000);
    let debug = format!("{reg:?}");
    assert!(debug.contains("vram"));
    assert!(debug.contains("0x2000"));
    assert!(debug.contains("DYNTRANS_WRITE_OK"));
    assert_eq!(std::sync::Arc::strong_count(&buffer), 3);
}

#[test]
fn test_as_ram_mut_exposes_buffer() {
    let mut ram = RamDevice::new(0x10);
    let device: &mut dyn Device = &mut ram;
    let inner = device.as_ram_mut().unwrap();
    inner.buffer().write_u8(3, 0x77);
    assert_eq!(ram.buffer().read_u8(3), 0x77);

    let mut closure = |_: u64, _: &mut [u8], _: AccessType| true;
    let device: &mut dyn Device = &mut closure;
    assert!(device.as_ram_mut().is_none());
}

#[test]
fn test_default_flags_are_empty() {
    assert!(DeviceFlags::default().is_empty());
}
