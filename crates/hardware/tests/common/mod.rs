//! Shared fixtures for memory and loader tests.

/// Fluent ELF32 image builder.
pub mod elf_builder;


use std::io::Write;

use pspsim_core::config::{Config, MemoryConfig};
use pspsim_core::soc::interconnect::Bus;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

/// Installs a test-writer `tracing` subscriber once per process.
///
/// Honours `RUST_LOG`, e.g. `RUST_LOG=pspsim_core=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration with 64 KiB blocks and a 64 Ki-entry table over a 32-bit space.
///
/// Keeps per-test host allocations small while covering the full 4 GiB physical range.
pub fn small_config() -> Config {
    Config {
        memory: MemoryConfig {
            max_bits: 32,
            bits_per_pagetable: 16,
            bits_per_memblock: 16,
            ..MemoryConfig::default()
        },
        ..Config::default()
    }
}

/// Returns a bus built from `small_config()`.
pub fn test_bus() -> Bus {
    init_tracing();
    Bus::new(&small_config()).unwrap()
}

/// Writes `data` to a fresh temporary file.
pub fn temp_file(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

/// Returns the UTF-8 path of a temporary file.
pub fn path_str(file: &NamedTempFile) -> &str {
    file.path().to_str().unwrap()
}
