//! Error Display Tests.
//!
//! Loader errors end up in front-end fatal messages, so their wording is checked here.

use std::error::Error as _;
use std::io;
use std::path::PathBuf;

use pspsim_core::common::{AccessType, LoadError, MemoryError};

#[test]
fn test_collision_names_both_devices() {
    let err = MemoryError::Collision {
        name: "vram".into(),
        existing_index: 2,
        existing_name: "ram".into(),
    };
    assert_eq!(err.to_string(), "\"vram\" collides with device 2 (\"ram\")");
}

#[test]
fn test_device_fault_mentions_direction() {
    let err = MemoryError::DeviceFault {
        name: "uart".into(),
        addr: 0x1000,
        len: 4,
        access: AccessType::Write,
    };
    assert_eq!(
        err.to_string(),
        "device \"uart\" rejected write of 4 bytes at 0x1000"
    );
}

#[test]
fn test_out_of_range_message() {
    let err = MemoryError::OutOfRange {
        addr: 0xffff_fffe,
        len: 4,
        physical_max: 0x1_0000_0000,
    };
    let msg = err.to_string();
    assert!(msg.contains("0xfffffffe"));
    assert!(msg.contains("0x100000000"));
}

#[test]
fn test_too_small_message() {
    let err = LoadError::TooSmall {
        path: PathBuf::from("tiny.bin"),
    };
    assert_eq!(
        err.to_string(),
        "'tiny.bin': file is too small to contain anything useful"
    );
}

#[test]
fn test_unknown_format_boot_sector_hint() {
    let plain = LoadError::UnknownFormat {
        path: PathBuf::from("disk.img"),
        probe: "00 01".into(),
        boot_sector: false,
    };
    assert!(!plain.to_string().contains("boot sector"));

    let boot = LoadError::UnknownFormat {
        path: PathBuf::from("disk.img"),
        probe: "00 01".into(),
        boot_sector: true,
    };
    let msg = boot.to_string();
    assert!(msg.contains("first bytes: 00 01"));
    assert!(msg.contains("boot sector"));
}

#[test]
fn test_header_size_suggests_dynamic_binary() {
    let err = LoadError::HeaderSize {
        path: PathBuf::from("a.elf"),
        what: "e_phentsize",
        found: 56,
        expected: 32,
    };
    let msg = err.to_string();
    assert!(msg.contains("e_phentsize is 56 bytes, expected 32"));
    assert!(msg.contains("dynamically linked"));
}

#[test]
fn test_io_error_keeps_source() {
    let err = LoadError::Io {
        path: PathBuf::from("missing.elf"),
        source: io::Error::new(io::ErrorKind::NotFound, "gone"),
    };
    assert!(err.to_string().starts_with("could not read 'missing.elf'"));
    assert!(err.source().is_some());
}

#[test]
fn test_memory_error_converts_transparently() {
    let inner = MemoryError::TooManyDevices { max: 4 };
    let expected = inner.to_string();
    let err: LoadError = inner.into();
    assert!(matches!(err, LoadError::Memory(MemoryError::TooManyDevices { max: 4 })));
    assert_eq!(err.to_string(), expected);
}
