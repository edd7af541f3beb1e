//! # Configuration Tests
//!
//! Defaults, partial JSON documents and rejection of malformed input.

use pretty_assertions::assert_eq;
use pspsim_core::common::ByteOrder;
use pspsim_core::config::*;

#[test]
fn test_memory_config_defaults() {
    let memory = MemoryConfig::default();
    assert_eq!(memory.physical_max, 0x1_0000_0000);
    assert_eq!(memory.max_bits, 40);
    assert_eq!(memory.bits_per_pagetable, 20);
    assert_eq!(memory.bits_per_memblock, 20);
    assert_eq!(memory.dyntrans_alignment, 4095);
    assert_eq!(memory.page_size, 4096);
    assert_eq!(memory.max_devices, 64);
}

#[test]
fn test_loader_config_defaults() {
    let loader = LoaderConfig::default();
    assert_eq!(loader.max_image_size, 24_000_000);
    assert_eq!(loader.floppy_image_size, 1_474_560);
    assert_eq!(loader.raw_chunk_size, 4096);
    assert_eq!(loader.byte_order, ByteOrder::Little);
}

#[test]
fn test_default_geometry_is_consistent() {
    let memory = MemoryConfig::default();
    assert_eq!(
        memory.bits_per_pagetable + memory.bits_per_memblock,
        memory.max_bits
    );
}

#[test]
fn test_empty_document_uses_defaults() {
    let config = Config::from_json("{}").unwrap();
    assert_eq!(config.memory.physical_max, 0x1_0000_0000);
    assert_eq!(config.loader.raw_chunk_size, 4096);
}

#[test]
fn test_partial_memory_section() {
    let json = r#"{ "memory": { "bits_per_pagetable": 24, "bits_per_memblock": 16 } }"#;
    let config = Config::from_json(json).unwrap();
    assert_eq!(config.memory.bits_per_pagetable, 24);
    assert_eq!(config.memory.bits_per_memblock, 16);
    assert_eq!(config.memory.max_bits, 40);
    assert_eq!(config.memory.max_devices, 64);
}

#[test]
fn test_loader_section_overrides() {
    let json = r#"{
        "loader": {
            "max_image_size": 1048576,
            "raw_chunk_size": 512,
            "byte_order": "Big"
        }
    }"#;
    let config = Config::from_json(json).unwrap();
    assert_eq!(config.loader.max_image_size, 0x10_0000);
    assert_eq!(config.loader.raw_chunk_size, 512);
    assert_eq!(config.loader.byte_order, ByteOrder::Big);
    assert_eq!(config.loader.floppy_image_size, 1_474_560);
}

#[test]
fn test_unknown_byte_order_is_rejected() {
    let json = r#"{ "loader": { "byte_order": "Middle" } }"#;
    assert!(Config::from_json(json).is_err());
}

#[test]
fn test_wrong_field_type_is_rejected() {
    let json = r#"{ "memory": { "max_devices": "many" } }"#;
    assert!(Config::from_json(json).is_err());
}

#[test]
fn test_malformed_json_is_rejected() {
    assert!(Config::from_json("{ memory: ").is_err());
}
