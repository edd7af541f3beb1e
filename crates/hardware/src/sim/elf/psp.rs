//! PSP module records.
//!
//! PSP executables carry two structures the loader must understand:
//! 1. **Module info:** A 52-byte record in `.rodata.sceModuleInfo` (or `.xodata.sceModuleInfo`)
//!    holding the module name, its global pointer and the bounds of its export and import
//!    tables.
//! 2. **Import stubs:** 20-byte records in `.lib.stub`, one per imported library. Each names a
//!    table of NIDs and a table of 8-byte stubs; the loader rewrites the second instruction of
//!    every stub into a `syscall` for the function the NID identifies.
//!
//! Both records decode in the byte order of the image.

use tracing::{debug, warn};

use crate::common::codec::{self, ByteOrder};
use crate::common::constants::{
    STUB_SIZE, STUB_SYSCALL_OFFSET, UNRESOLVED_NID_SYSCALL, syscall_instruction,
};
use crate::common::MemoryError;
use crate::sim::personality::NidResolver;
use crate::soc::interconnect::Bus;

/// Size of the module-info record in bytes.
pub const MODULE_INFO_SIZE: usize = 52;

/// Size of one import-stub record in bytes.
pub const STUB_INFO_SIZE: usize = 20;

const MODULE_NAME_LEN: usize = 28;

fn word(bytes: &[u8], offset: usize, order: ByteOrder) -> u32 {
    codec::decode(&bytes[offset..], 4, order) as u32
}

/// Decoded module-info record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module attribute bits.
    pub attribute: u16,
    /// Major and minor version.
    pub version: [u8; 2],
    /// NUL-padded module name.
    pub name: [u8; MODULE_NAME_LEN],
    /// Global pointer value.
    pub gp: u32,
    /// First export entry.
    pub exports_top: u32,
    /// End of the export entries.
    pub exports_end: u32,
    /// First import stub record.
    pub imports_top: u32,
    /// End of the import stub records.
    pub imports_end: u32,
}

impl ModuleInfo {
    /// Decodes a record from the first 52 bytes of `bytes`.
    ///
    /// # Returns
    ///
    /// `None` if `bytes` is shorter than a record.
    pub fn decode(bytes: &[u8], order: ByteOrder) -> Option<Self> {
        let bytes = bytes.get(..MODULE_INFO_SIZE)?;
        let mut name = [0u8; MODULE_NAME_LEN];
        name.copy_from_slice(&bytes[4..4 + MODULE_NAME_LEN]);
        Some(Self {
            attribute: codec::decode(bytes, 2, order) as u16,
            version: [bytes[2], bytes[3]],
            name,
            gp: word(bytes, 32, order),
            exports_top: word(bytes, 36, order),
            exports_end: word(bytes, 40, order),
            imports_top: word(bytes, 44, order),
            imports_end: word(bytes, 48, order),
        })
    }

    /// Returns the module name up to the first NUL.
    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MODULE_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// Decoded import-stub record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StubInfo {
    /// Address of the library name string.
    pub lib_name: u32,
    /// Library version and import attributes.
    pub version_attribute: u32,
    /// Record length, variable-stub count and function count packed in one word.
    pub sizes: u32,
    /// Address of the NID table.
    pub nid_table: u32,
    /// Address of the first stub.
    pub stub_table: u32,
}

impl StubInfo {
    /// Decodes a record from the first 20 bytes of `bytes`.
    pub fn decode(bytes: &[u8], order: ByteOrder) -> Option<Self> {
        let bytes = bytes.get(..STUB_INFO_SIZE)?;
        Some(Self {
            lib_name: word(bytes, 0, order),
            version_attribute: word(bytes, 4, order),
            sizes: word(bytes, 8, order),
            nid_table: word(bytes, 12, order),
            stub_table: word(bytes, 16, order),
        })
    }

    /// Decodes every complete record in a `.lib.stub` section.
    pub fn decode_all(section: &[u8], order: ByteOrder) -> Vec<Self> {
        section
            .chunks_exact(STUB_INFO_SIZE)
            .filter_map(|chunk| Self::decode(chunk, order))
            .collect()
    }

    /// Returns the number of imported functions.
    pub const fn stub_count(&self) -> u16 {
        (self.sizes >> 16) as u16
    }
}

/// Rewrites import stubs into syscalls.
///
/// For stub `i` of each record, reads the NID at `nid_table + 4*i` from memory and writes
/// `syscall <n>` at `stub_table + 8*i + 4`. NIDs the resolver does not know get the
/// unresolved sentinel so the HLE layer can report the call at run time.
///
/// # Arguments
///
/// * `bus` - Memory holding the loaded segments.
/// * `stubs` - Records from `.lib.stub`.
/// * `order` - Byte order of the image.
/// * `nids` - NID to syscall mapping.
///
/// # Returns
///
/// The number of stubs patched.
///
/// # Errors
///
/// Any bus error while reading a NID or writing a stub.
pub fn patch_stubs(
    bus: &mut Bus,
    stubs: &[StubInfo],
    order: ByteOrder,
    nids: &dyn NidResolver,
) -> Result<usize, MemoryError> {
    let mut patched = 0usize;
    let mut buf = [0u8; 4];
    for stub in stubs {
        let count = u64::from(stub.stub_count());
        debug!(
            count,
            stubs = format_args!("{:#010x}", stub.stub_table),
            nids = format_args!("{:#010x}", stub.nid_table),
            "fixing up import stubs"
        );
        for i in 0..count {
            bus.read(u64::from(stub.nid_table) + 4 * i, &mut buf)?;
            let nid = codec::decode(&buf, 4, order) as u32;

            let syscall = nids.syscall_for_nid(nid).unwrap_or_else(|| {
                warn!(nid = format_args!("{nid:#010x}"), "unresolved import NID");
                UNRESOLVED_NID_SYSCALL
            });

            let at = u64::from(stub.stub_table) + STUB_SIZE * i + STUB_SYSCALL_OFFSET;
            codec::encode(u64::from(syscall_instruction(syscall)), 4, order, &mut buf);
            bus.write(at, &buf)?;

            debug!(
                stub = i,
                addr = format_args!("{at:#010x}"),
                nid = format_args!("{nid:#010x}"),
                name = nids.nid_name(nid).unwrap_or("?"),
                syscall,
                "patched import stub"
            );
            patched += 1;
        }
    }
    Ok(patched)
}
