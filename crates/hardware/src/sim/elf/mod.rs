//! ELF32 Loader.
//!
//! Loads statically linked 32-bit MIPS executables. The pipeline is:
//! 1. **Validate:** Magic, class, encoding, header entry sizes, type and machine, all before
//!    any byte reaches memory.
//! 2. **Segments:** Copy `PT_LOAD` and MIPS register-info segments to their virtual address.
//! 3. **Sections:** Collect string tables and resolve section names.
//! 4. **Symbols:** Register every non-zero `Elf32_Sym`; `_gp` provides the global pointer.
//! 5. **PSP records:** Module info (global pointer override), `.bss` clearing and import-stub
//!    patching.
//!
//! Every multi-byte field is decoded in the byte order named by `EI_DATA`.

/// ELF machine names for diagnostics.
pub mod machine;

/// PSP module-info and import-stub records.
pub mod psp;

use std::fs;
use std::path::Path;

use object::Endianness;
use object::elf::{self, FileHeader32, ProgramHeader32, SectionHeader32, Sym32};
use object::pod;
use tracing::{debug, info, warn};

use self::machine::machine_name;
use self::psp::{MODULE_INFO_SIZE, ModuleInfo, StubInfo};
use crate::common::codec::ByteOrder;
use crate::common::constants::REG_GP;
use crate::common::{LoadError, MemoryError};
use crate::sim::loader::LoadedImage;
use crate::sim::personality::{NidResolver, Personality};
use crate::sim::symbols::{SymbolKind, SymbolStore};
use crate::soc::interconnect::Bus;

const PHDR_SIZE: u16 = 32;
const SHDR_SIZE: u16 = 40;
const SYM_SIZE: usize = 16;

const MODULE_INFO_SECTIONS: [&str; 2] = [".rodata.sceModuleInfo", ".xodata.sceModuleInfo"];
const STUB_SECTION: &str = ".lib.stub";
const BSS_SECTION: &str = ".bss";
const GP_SYMBOL: &str = "_gp";

/// Chunk sizes used when copying a segment, largest first.
const CHUNK_LADDER: [u64; 6] = [0x10000, 0x4000, 0x1000, 0x100, 0x40, 0x10];

/// Returns the NUL-terminated string at `offset` in a string table.
fn str_at(table: &[u8], offset: u32) -> String {
    let Some(tail) = table.get(offset as usize..) else {
        return String::new();
    };
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..end]).into_owned()
}

/// One section header with its resolved name.
struct Section<'a> {
    name: String,
    header: &'a SectionHeader32<Endianness>,
}

/// Section headers plus every string table, in file order.
struct SectionTable<'a> {
    sections: Vec<Section<'a>>,
    /// `(section index, bytes)` of each `SHT_STRTAB` section.
    strtabs: Vec<(usize, &'a [u8])>,
}

impl<'a> SectionTable<'a> {
    fn named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s Section<'a>> + 's {
        self.sections.iter().filter(move |s| s.name == name)
    }

    /// Returns the first section, in header order, whose name is one of `names`.
    fn first_of(&self, names: &[&str]) -> Option<&Section<'a>> {
        self.sections.iter().find(|s| names.contains(&s.name.as_str()))
    }

    fn strtab_at(&self, index: usize) -> Option<&'a [u8]> {
        self.strtabs
            .iter()
            .find(|&&(i, _)| i == index)
            .map(|&(_, bytes)| bytes)
    }

    fn nth_strtab(&self, n: usize) -> Option<&'a [u8]> {
        self.strtabs.get(n).map(|&(_, bytes)| bytes)
    }
}

/// A validated ELF32 image held in memory.
struct ElfImage<'a> {
    path: &'a Path,
    data: &'a [u8],
    endian: Endianness,
    header: &'a FileHeader32<Endianness>,
}

impl<'a> ElfImage<'a> {
    fn parse(path: &'a Path, data: &'a [u8]) -> Result<Self, LoadError> {
        let owned = || path.to_owned();

        let (header, _) = pod::from_bytes::<FileHeader32<Endianness>>(data)
            .map_err(|()| LoadError::NotElf { path: owned() })?;
        let ident = &header.e_ident;
        if ident.magic != elf::ELFMAG {
            return Err(LoadError::NotElf { path: owned() });
        }
        if ident.class != elf::ELFCLASS32 {
            return Err(LoadError::UnsupportedClass {
                path: owned(),
                class: ident.class,
            });
        }
        let endian = match ident.data {
            elf::ELFDATA2LSB => Endianness::Little,
            elf::ELFDATA2MSB => Endianness::Big,
            encoding => {
                return Err(LoadError::UnknownEncoding {
                    path: owned(),
                    encoding,
                });
            }
        };

        let phentsize = header.e_phentsize.get(endian);
        if phentsize != PHDR_SIZE {
            return Err(LoadError::HeaderSize {
                path: owned(),
                what: "e_phentsize",
                found: phentsize,
                expected: PHDR_SIZE,
            });
        }
        let shentsize = header.e_shentsize.get(endian);
        if shentsize != SHDR_SIZE {
            return Err(LoadError::HeaderSize {
                path: owned(),
                what: "e_shentsize",
                found: shentsize,
                expected: SHDR_SIZE,
            });
        }

        let e_type = header.e_type.get(endian);
        if e_type != elf::ET_EXEC {
            return Err(LoadError::NotExecutable {
                path: owned(),
                e_type,
            });
        }
        let machine = header.e_machine.get(endian);
        if machine != elf::EM_MIPS && machine != elf::EM_MIPS_RS3_LE {
            return Err(LoadError::WrongMachine {
                path: owned(),
                machine: machine_name(machine),
            });
        }

        Ok(Self {
            path,
            data,
            endian,
            header,
        })
    }

    const fn byte_order(&self) -> ByteOrder {
        match self.endian {
            Endianness::Little => ByteOrder::Little,
            Endianness::Big => ByteOrder::Big,
        }
    }

    fn entry(&self) -> u64 {
        u64::from(self.header.e_entry.get(self.endian))
    }

    fn truncated(&self, what: &'static str) -> LoadError {
        LoadError::Truncated {
            path: self.path.to_owned(),
            what,
        }
    }

    fn bytes(&self, offset: u32, size: u32, what: &'static str) -> Result<&'a [u8], LoadError> {
        let start = offset as usize;
        let end = start
            .checked_add(size as usize)
            .ok_or_else(|| self.truncated(what))?;
        self.data.get(start..end).ok_or_else(|| self.truncated(what))
    }

    fn program_headers(&self) -> Result<&'a [ProgramHeader32<Endianness>], LoadError> {
        let count = usize::from(self.header.e_phnum.get(self.endian));
        if count == 0 {
            return Ok(&[]);
        }
        let offset = self.header.e_phoff.get(self.endian) as usize;
        let tail = self
            .data
            .get(offset..)
            .ok_or_else(|| self.truncated("program header table"))?;
        pod::slice_from_bytes(tail, count)
            .map(|(headers, _)| headers)
            .map_err(|()| self.truncated("program header table"))
    }

    fn section_headers(&self) -> Result<&'a [SectionHeader32<Endianness>], LoadError> {
        let count = usize::from(self.header.e_shnum.get(self.endian));
        if count == 0 {
            return Ok(&[]);
        }
        let offset = self.header.e_shoff.get(self.endian) as usize;
        let tail = self
            .data
            .get(offset..)
            .ok_or_else(|| self.truncated("section header table"))?;
        pod::slice_from_bytes(tail, count)
            .map(|(headers, _)| headers)
            .map_err(|()| self.truncated("section header table"))
    }

    /// Returns a section's file contents; `SHT_NOBITS` sections have none.
    fn section_data(
        &self,
        header: &SectionHeader32<Endianness>,
        what: &'static str,
    ) -> Result<&'a [u8], LoadError> {
        let e = self.endian;
        if header.sh_type.get(e) == elf::SHT_NOBITS {
            return Ok(&[]);
        }
        self.bytes(header.sh_offset.get(e), header.sh_size.get(e), what)
    }

    fn load_segments(&self, bus: &mut Bus) -> Result<(), LoadError> {
        let e = self.endian;
        for (i, ph) in self.program_headers()?.iter().enumerate() {
            let p_type = ph.p_type.get(e);
            let memsz = ph.p_memsz.get(e);
            let loadable =
                p_type == elf::PT_LOAD || (p_type & elf::PF_MASKPROC) == elf::PT_MIPS_REGINFO;
            if !loadable || memsz == 0 {
                continue;
            }

            let vaddr = u64::from(ph.p_vaddr.get(e));
            let paddr = u64::from(ph.p_paddr.get(e));
            let filesz = ph.p_filesz.get(e);
            if vaddr != paddr {
                warn!(
                    segment = i,
                    vaddr = format_args!("{vaddr:#x}"),
                    paddr = format_args!("{paddr:#x}"),
                    "vaddr and paddr differ; using vaddr"
                );
            }
            if memsz < filesz {
                return Err(LoadError::SegmentShrinks {
                    path: self.path.to_owned(),
                    memsz: u64::from(memsz),
                    filesz: u64::from(filesz),
                });
            }

            let bytes = self.bytes(ph.p_offset.get(e), filesz, "segment")?;
            debug!(
                segment = i,
                vaddr = format_args!("{vaddr:#010x}"),
                filesz = format_args!("{filesz:#x}"),
                memsz = format_args!("{memsz:#x}"),
                "loading segment"
            );
            copy_segment(bus, vaddr, bytes)?;
        }
        Ok(())
    }

    fn sections(&self) -> Result<SectionTable<'a>, LoadError> {
        let e = self.endian;
        let headers = self.section_headers()?;

        let mut strtabs = Vec::new();
        for (i, sh) in headers.iter().enumerate() {
            if sh.sh_type.get(e) == elf::SHT_STRTAB {
                strtabs.push((i, self.section_data(sh, "string table")?));
            }
        }

        let mut table = SectionTable {
            sections: Vec::with_capacity(headers.len()),
            strtabs,
        };
        let names = table
            .strtab_at(usize::from(self.header.e_shstrndx.get(e)))
            .or_else(|| table.nth_strtab(0))
            .unwrap_or(&[]);
        table.sections = headers
            .iter()
            .map(|header| Section {
                name: str_at(names, header.sh_name.get(e)),
                header,
            })
            .collect();
        Ok(table)
    }

    /// Registers symbols and returns the value of `_gp`, if defined.
    fn load_symbols(
        &self,
        table: &SectionTable<'a>,
        symbols: &mut dyn SymbolStore,
    ) -> Result<Option<u64>, LoadError> {
        let e = self.endian;
        let mut gp = None;
        let mut count = 0usize;
        for section in &table.sections {
            let sh = section.header;
            if sh.sh_type.get(e) != elf::SHT_SYMTAB {
                continue;
            }
            let bytes = self.section_data(sh, "symbol table")?;
            let (syms, _) = pod::slice_from_bytes::<Sym32<Endianness>>(bytes, bytes.len() / SYM_SIZE)
                .map_err(|()| self.truncated("symbol table"))?;
            let names = table
                .strtab_at(sh.sh_link.get(e) as usize)
                .or_else(|| table.nth_strtab(1))
                .unwrap_or(&[]);

            for sym in syms {
                let value = u64::from(sym.st_value.get(e));
                if value == 0 {
                    continue;
                }
                let size = u64::from(sym.st_size.get(e)).max(1);
                let name = str_at(names, sym.st_name.get(e));
                if name == GP_SYMBOL {
                    debug!(gp = format_args!("{value:#x}"), "found _gp symbol");
                    gp = Some(value);
                }
                symbols.add_symbol(value, size, &name, SymbolKind::Elf);
                count += 1;
            }
        }
        debug!(count, "registered ELF symbols");
        Ok(gp)
    }

    fn module_info(&self, table: &SectionTable<'a>) -> Result<Option<ModuleInfo>, LoadError> {
        let Some(section) = table.first_of(&MODULE_INFO_SECTIONS) else {
            return Ok(None);
        };
        let e = self.endian;
        let bytes = self.bytes(
            section.header.sh_offset.get(e),
            MODULE_INFO_SIZE as u32,
            "module info",
        )?;
        Ok(ModuleInfo::decode(bytes, self.byte_order()))
    }

    fn clear_bss(&self, table: &SectionTable<'a>, bus: &mut Bus) -> Result<(), MemoryError> {
        let e = self.endian;
        for section in table.named(BSS_SECTION) {
            let addr = u64::from(section.header.sh_addr.get(e));
            let size = u64::from(section.header.sh_size.get(e));
            debug!(
                addr = format_args!("{addr:#010x}"),
                size = format_args!("{size:#x}"),
                "clearing .bss"
            );
            for i in 0..size {
                bus.write_u8(addr + i, 0)?;
            }
        }
        Ok(())
    }

    fn stubs(&self, table: &SectionTable<'a>) -> Result<Vec<StubInfo>, LoadError> {
        let mut stubs = Vec::new();
        for section in table.named(STUB_SECTION) {
            let bytes = self.section_data(section.header, "import stub table")?;
            stubs.extend(StubInfo::decode_all(bytes, self.byte_order()));
        }
        Ok(stubs)
    }
}

/// Returns the first copy chunk size for a segment starting at `vaddr`.
fn initial_chunk(vaddr: u64) -> u64 {
    CHUNK_LADDER
        .iter()
        .copied()
        .find(|align| vaddr % align == 0)
        .unwrap_or(1)
}

/// Copies segment bytes to `vaddr` in alignment-sized chunks.
///
/// Chunks start at the largest alignment of `vaddr` and grow to 4 KiB and 64 KiB as the write
/// address crosses those boundaries.
fn copy_segment(bus: &mut Bus, vaddr: u64, bytes: &[u8]) -> Result<(), MemoryError> {
    let mut chunk = initial_chunk(vaddr);
    let mut ofs = 0usize;
    while ofs < bytes.len() {
        let addr = vaddr + ofs as u64;
        if chunk < 0x10000 && addr & 0xffff == 0 {
            chunk = 0x10000;
        } else if chunk < 0x1000 && addr & 0xfff == 0 {
            chunk = 0x1000;
        }
        let n = (chunk as usize).min(bytes.len() - ofs);
        bus.write(addr, &bytes[ofs..ofs + n])?;
        ofs += n;
    }
    Ok(())
}

/// Loads an ELF32 MIPS executable.
///
/// # Arguments
///
/// * `bus` - Destination memory.
/// * `symbols` - Receives every non-zero ELF symbol.
/// * `personality` - Post-load hook for entry point and registers.
/// * `nids` - Resolver used to patch PSP import stubs.
/// * `path` - File to load.
///
/// # Returns
///
/// The loaded image after the personality has adjusted it.
///
/// # Errors
///
/// Header validation errors are returned before memory is touched. Truncated tables or
/// segments, `SegmentShrinks` and bus errors can leave earlier segments in memory.
pub fn load_elf(
    bus: &mut Bus,
    symbols: &mut dyn SymbolStore,
    personality: &dyn Personality,
    nids: &dyn NidResolver,
    path: &Path,
) -> Result<LoadedImage, LoadError> {
    let data = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    let image = ElfImage::parse(path, &data)?;
    info!(
        path = %path.display(),
        entry = format_args!("{:#010x}", image.entry()),
        byte_order = ?image.byte_order(),
        "loading ELF executable"
    );

    image.load_segments(bus)?;
    let table = image.sections()?;
    let mut gp = image.load_symbols(&table, symbols)?;

    if let Some(module) = image.module_info(&table)? {
        debug!(
            name = %module.name(),
            attribute = format_args!("{:#06x}", module.attribute),
            version = ?module.version,
            gp = format_args!("{:#010x}", module.gp),
            imports = format_args!("{:#010x}..{:#010x}", module.imports_top, module.imports_end),
            "found module info"
        );
        gp = Some(u64::from(module.gp));
    }

    image.clear_bss(&table, bus)?;

    let stubs = image.stubs(&table)?;
    let patched = psp::patch_stubs(bus, &stubs, image.byte_order(), nids)?;
    if patched > 0 {
        debug!(libraries = stubs.len(), patched, "patched import stubs");
    }

    let mut loaded = LoadedImage::new(image.entry(), image.byte_order());
    loaded.gp = gp;
    if let Some(gp) = gp {
        loaded.set_reg(REG_GP, gp);
    }
    personality.finish(&mut loaded);
    debug!(
        personality = personality.name(),
        entry = format_args!("{:#010x}", loaded.entry_point),
        "ELF load complete"
    );
    Ok(loaded)
}
