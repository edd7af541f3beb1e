//! Configuration for the memory subsystem and loaders.
//!
//! This module defines the configuration structures used to parameterize the bus and the
//! executable loaders. It provides:
//! 1. **Defaults:** Baseline geometry and limits matching a PSP-class machine.
//! 2. **Structures:** Memory geometry (`MemoryConfig`) and loader limits (`LoaderConfig`).
//! 3. **Parsing:** `Config::from_json` for front-ends that keep their settings as JSON.
//!
//! Every field has a default, so partial JSON documents are accepted.

use serde::Deserialize;

use crate::common::ByteOrder;

/// Default configuration constants.
///
/// These values define the baseline machine when not explicitly overridden.
mod defaults {
    /// Exclusive end of the physical address space (4 GiB).
    ///
    /// RAM accesses that reach this address fail with `MemoryError::OutOfRange`.
    pub const PHYSICAL_MAX: u64 = 0x1_0000_0000;

    /// Width of a physical address as seen by the page table.
    pub const MAX_BITS: u32 = 40;

    /// Bits used to index the page table (1 Mi entries).
    pub const BITS_PER_PAGETABLE: u32 = 20;

    /// Bits used to address bytes inside one block (1 MiB blocks).
    pub const BITS_PER_MEMBLOCK: u32 = 20;

    /// Alignment mask for dynamic-translation window bounds (4 KiB pages).
    pub const DYNTRANS_ALIGNMENT: u64 = 4095;

    /// Emulated page size used when invalidating translation caches.
    pub const PAGE_SIZE: u64 = 4096;

    /// Maximum number of memory-mapped devices.
    pub const MAX_DEVICES: usize = 64;

    /// Largest file the sniffer will hand to the symbol reader.
    pub const MAX_IMAGE_SIZE: u64 = 24_000_000;

    /// Size of a 3.5" 1.44 MB floppy image.
    pub const FLOPPY_IMAGE_SIZE: u64 = 1_474_560;

    /// Read buffer size used by the raw loader.
    pub const RAW_CHUNK_SIZE: usize = 4096;
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use pspsim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.memory.physical_max, 0x1_0000_0000);
/// assert_eq!(config.loader.raw_chunk_size, 4096);
/// ```
///
/// Deserializing a partial document:
///
/// ```
/// use pspsim_core::common::ByteOrder;
/// use pspsim_core::config::Config;
///
/// let json = r#"{
///     "memory": { "physical_max": 67108864, "max_devices": 8 },
///     "loader": { "byte_order": "Big" }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.memory.physical_max, 0x400_0000);
/// assert_eq!(config.memory.bits_per_memblock, 20);
/// assert_eq!(config.loader.byte_order, ByteOrder::Big);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Physical memory geometry and device registry limits
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Executable loader limits
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl Config {
    /// Parses a configuration from a JSON document.
    ///
    /// # Arguments
    ///
    /// * `json` - The JSON text; missing sections and fields take their defaults.
    ///
    /// # Returns
    ///
    /// The parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error describing the first syntax or type problem.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Physical memory geometry.
///
/// `bits_per_pagetable + bits_per_memblock` must equal `max_bits`; `PagedMemory::new`
/// rejects configurations that break this.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Exclusive end of physical memory
    #[serde(default = "MemoryConfig::default_physical_max")]
    pub physical_max: u64,

    /// Total physical address bits covered by the page table
    #[serde(default = "MemoryConfig::default_max_bits")]
    pub max_bits: u32,

    /// Bits indexing the page table
    #[serde(default = "MemoryConfig::default_bits_per_pagetable")]
    pub bits_per_pagetable: u32,

    /// Bits addressing bytes inside one block
    #[serde(default = "MemoryConfig::default_bits_per_memblock")]
    pub bits_per_memblock: u32,

    /// Mask that dyntrans window bounds are rounded outward to
    #[serde(default = "MemoryConfig::default_dyntrans_alignment")]
    pub dyntrans_alignment: u64,

    /// Emulated page size for translation-cache invalidation
    #[serde(default = "MemoryConfig::default_page_size")]
    pub page_size: u64,

    /// Maximum number of registered devices
    #[serde(default = "MemoryConfig::default_max_devices")]
    pub max_devices: usize,
}

impl MemoryConfig {
    /// Returns the default physical memory end.
    fn default_physical_max() -> u64 {
        defaults::PHYSICAL_MAX
    }

    /// Returns the default address width.
    fn default_max_bits() -> u32 {
        defaults::MAX_BITS
    }

    /// Returns the default page-table index width.
    fn default_bits_per_pagetable() -> u32 {
        defaults::BITS_PER_PAGETABLE
    }

    /// Returns the default block offset width.
    fn default_bits_per_memblock() -> u32 {
        defaults::BITS_PER_MEMBLOCK
    }

    /// Returns the default dyntrans alignment mask.
    fn default_dyntrans_alignment() -> u64 {
        defaults::DYNTRANS_ALIGNMENT
    }

    /// Returns the default emulated page size.
    fn default_page_size() -> u64 {
        defaults::PAGE_SIZE
    }

    /// Returns the default device limit.
    fn default_max_devices() -> usize {
        defaults::MAX_DEVICES
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            physical_max: defaults::PHYSICAL_MAX,
            max_bits: defaults::MAX_BITS,
            bits_per_pagetable: defaults::BITS_PER_PAGETABLE,
            bits_per_memblock: defaults::BITS_PER_MEMBLOCK,
            dyntrans_alignment: defaults::DYNTRANS_ALIGNMENT,
            page_size: defaults::PAGE_SIZE,
            max_devices: defaults::MAX_DEVICES,
        }
    }
}

/// Executable loader limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Files larger than this are rejected by the sniffer
    #[serde(default = "LoaderConfig::default_max_image_size")]
    pub max_image_size: u64,

    /// Files of exactly this size get a floppy-image warning
    #[serde(default = "LoaderConfig::default_floppy_image_size")]
    pub floppy_image_size: u64,

    /// Read buffer size for raw binaries
    #[serde(default = "LoaderConfig::default_raw_chunk_size")]
    pub raw_chunk_size: usize,

    /// Initial byte order of the bus
    #[serde(default)]
    pub byte_order: ByteOrder,
}

impl LoaderConfig {
    /// Returns the default image size limit.
    fn default_max_image_size() -> u64 {
        defaults::MAX_IMAGE_SIZE
    }

    /// Returns the default floppy image size.
    fn default_floppy_image_size() -> u64 {
        defaults::FLOPPY_IMAGE_SIZE
    }

    /// Returns the default raw read buffer size.
    fn default_raw_chunk_size() -> usize {
        defaults::RAW_CHUNK_SIZE
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_image_size: defaults::MAX_IMAGE_SIZE,
            floppy_image_size: defaults::FLOPPY_IMAGE_SIZE,
            raw_chunk_size: defaults::RAW_CHUNK_SIZE,
            byte_order: ByteOrder::default(),
        }
    }
}
