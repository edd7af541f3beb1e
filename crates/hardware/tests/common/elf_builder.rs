//! Fluent builder for ELF32 test images.
//!
//! Layout: file header, program headers, segment data, section data, `.shstrtab`,
//! `.symtab`, `.strtab`, then the section header table. `.shstrtab` precedes `.strtab` so
//! the first string table holds section names and the second holds symbol names.

use pspsim_core::common::ByteOrder;

pub const ET_EXEC: u16 = 2;
pub const ET_DYN: u16 = 3;
pub const EM_386: u16 = 3;
pub const EM_MIPS: u16 = 8;
pub const EM_MIPS_RS3_LE: u16 = 10;
pub const ELFCLASS64: u8 = 2;

pub const PT_LOAD: u32 = 1;
pub const PT_NOTE: u32 = 4;
pub const PT_MIPS_REGINFO: u32 = 0x7000_0000;

pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_NOBITS: u32 = 8;

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;

struct Segment {
    p_type: u32,
    vaddr: u32,
    paddr: u32,
    data: Vec<u8>,
    memsz: u32,
}

struct Section {
    name: String,
    sh_type: u32,
    addr: u32,
    data: Vec<u8>,
    size: u32,
}

/// Builds ELF32 executables byte by byte.
pub struct ElfBuilder {
    order: ByteOrder,
    class: u8,
    encoding: Option<u8>,
    e_type: u16,
    machine: u16,
    entry: u32,
    phentsize: u16,
    shentsize: u16,
    segments: Vec<Segment>,
    sections: Vec<Section>,
    symbols: Vec<(String, u32, u32)>,
    linked: bool,
}

impl Default for ElfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ElfBuilder {
    /// Little-endian MIPS `ET_EXEC` with no segments.
    pub fn new() -> Self {
        Self {
            order: ByteOrder::Little,
            class: 1,
            encoding: None,
            e_type: ET_EXEC,
            machine: EM_MIPS,
            entry: 0,
            phentsize: 32,
            shentsize: 40,
            segments: Vec::new(),
            sections: Vec::new(),
            symbols: Vec::new(),
            linked: true,
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.order = ByteOrder::Big;
        self
    }

    pub fn class(mut self, class: u8) -> Self {
        self.class = class;
        self
    }

    /// Overrides `EI_DATA` without changing how fields are written.
    pub fn encoding(mut self, encoding: u8) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn e_type(mut self, e_type: u16) -> Self {
        self.e_type = e_type;
        self
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn entry(mut self, entry: u32) -> Self {
        self.entry = entry;
        self
    }

    pub fn phentsize(mut self, size: u16) -> Self {
        self.phentsize = size;
        self
    }

    pub fn shentsize(mut self, size: u16) -> Self {
        self.shentsize = size;
        self
    }

    /// Adds a `PT_LOAD` segment with `vaddr == paddr`.
    pub fn segment(self, vaddr: u32, data: &[u8], memsz: u32) -> Self {
        self.program_header(PT_LOAD, vaddr, vaddr, data, memsz)
    }

    pub fn program_header(
        mut self,
        p_type: u32,
        vaddr: u32,
        paddr: u32,
        data: &[u8],
        memsz: u32,
    ) -> Self {
        self.segments.push(Segment {
            p_type,
            vaddr,
            paddr,
            data: data.to_vec(),
            memsz,
        });
        self
    }

    /// Adds a `SHT_PROGBITS` section whose bytes live only in the file.
    pub fn section(mut self, name: &str, addr: u32, data: &[u8]) -> Self {
        self.sections.push(Section {
            name: name.to_owned(),
            sh_type: SHT_PROGBITS,
            addr,
            data: data.to_vec(),
            size: data.len() as u32,
        });
        self
    }

    /// Adds a `SHT_NOBITS` section.
    pub fn nobits(mut self, name: &str, addr: u32, size: u32) -> Self {
        self.sections.push(Section {
            name: name.to_owned(),
            sh_type: SHT_NOBITS,
            addr,
            data: Vec::new(),
            size,
        });
        self
    }

    pub fn symbol(mut self, name: &str, value: u32, size: u32) -> Self {
        self.symbols.push((name.to_owned(), value, size));
        self
    }

    /// Clears `e_shstrndx` and the symbol table's `sh_link`.
    pub fn unlinked_string_tables(mut self) -> Self {
        self.linked = false;
        self
    }

    fn put16(&self, buf: &mut Vec<u8>, v: u16) {
        match self.order {
            ByteOrder::Little => buf.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn put32(&self, buf: &mut Vec<u8>, v: u32) {
        match self.order {
            ByteOrder::Little => buf.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn align4(buf: &mut Vec<u8>) {
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let nseg = self.segments.len();
        let mut out = vec![0u8; EHDR_SIZE + PHDR_SIZE * nseg];

        let mut seg_offsets = Vec::new();
        for seg in &self.segments {
            Self::align4(&mut out);
            seg_offsets.push(out.len() as u32);
            out.extend_from_slice(&seg.data);
        }

        let mut sec_offsets = Vec::new();
        for sec in &self.sections {
            Self::align4(&mut out);
            sec_offsets.push(out.len() as u32);
            out.extend_from_slice(&sec.data);
        }

        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::new();
        let intern = |table: &mut Vec<u8>, name: &str| {
            let off = table.len() as u32;
            table.extend_from_slice(name.as_bytes());
            table.push(0);
            off
        };
        for sec in &self.sections {
            name_offsets.push(intern(&mut shstrtab, &sec.name));
        }
        let shstrtab_name = intern(&mut shstrtab, ".shstrtab");
        let symtab_name = intern(&mut shstrtab, ".symtab");
        let strtab_name = intern(&mut shstrtab, ".strtab");

        let mut strtab = vec![0u8];
        let mut symtab = vec![0u8; 16];
        for (name, value, size) in &self.symbols {
            let st_name = intern(&mut strtab, name);
            self.put32(&mut symtab, st_name);
            self.put32(&mut symtab, *value);
            self.put32(&mut symtab, *size);
            symtab.push(0x11);
            symtab.push(0);
            self.put16(&mut symtab, 0xfff1);
        }

        Self::align4(&mut out);
        let shstrtab_off = out.len() as u32;
        out.extend_from_slice(&shstrtab);
        Self::align4(&mut out);
        let symtab_off = out.len() as u32;
        out.extend_from_slice(&symtab);
        let strtab_off = out.len() as u32;
        out.extend_from_slice(&strtab);

        let user = self.sections.len() as u16;
        let shstrndx = user + 1;
        let strtab_index = user + 3;
        let has_symbols = !self.symbols.is_empty();

        Self::align4(&mut out);
        let shoff = out.len() as u32;
        let mut shdrs = Vec::new();
        let shdr = |b: &Self,
                        buf: &mut Vec<u8>,
                        name: u32,
                        sh_type: u32,
                        addr: u32,
                        offset: u32,
                        size: u32,
                        link: u32| {
            for v in [name, sh_type, 0, addr, offset, size, link, 0, 4, 0] {
                b.put32(buf, v);
            }
        };
        shdr(self, &mut shdrs, 0, 0, 0, 0, 0, 0);
        for (i, sec) in self.sections.iter().enumerate() {
            shdr(
                self,
                &mut shdrs,
                name_offsets[i],
                sec.sh_type,
                sec.addr,
                sec_offsets[i],
                sec.size,
                0,
            );
        }
        shdr(
            self,
            &mut shdrs,
            shstrtab_name,
            SHT_STRTAB,
            0,
            shstrtab_off,
            shstrtab.len() as u32,
            0,
        );
        let mut shnum = shstrndx + 1;
        if has_symbols {
            let link = if self.linked {
                u32::from(strtab_index)
            } else {
                0
            };
            shdr(
                self,
                &mut shdrs,
                symtab_name,
                SHT_SYMTAB,
                0,
                symtab_off,
                symtab.len() as u32,
                link,
            );
            shdr(
                self,
                &mut shdrs,
                strtab_name,
                SHT_STRTAB,
                0,
                strtab_off,
                strtab.len() as u32,
                0,
            );
            shnum = strtab_index + 1;
        }
        out.extend_from_slice(&shdrs);

        let mut hdr = vec![0x7f, b'E', b'L', b'F'];
        hdr.push(self.class);
        hdr.push(self.encoding.unwrap_or(match self.order {
            ByteOrder::Little => 1,
            ByteOrder::Big => 2,
        }));
        hdr.push(1);
        hdr.resize(16, 0);
        self.put16(&mut hdr, self.e_type);
        self.put16(&mut hdr, self.machine);
        self.put32(&mut hdr, 1);
        self.put32(&mut hdr, self.entry);
        self.put32(&mut hdr, EHDR_SIZE as u32);
        self.put32(&mut hdr, shoff);
        self.put32(&mut hdr, 0);
        self.put16(&mut hdr, EHDR_SIZE as u16);
        self.put16(&mut hdr, self.phentsize);
        self.put16(&mut hdr, nseg as u16);
        self.put16(&mut hdr, self.shentsize);
        self.put16(&mut hdr, shnum);
        self.put16(&mut hdr, if self.linked { shstrndx } else { 0 });
        out[..EHDR_SIZE].copy_from_slice(&hdr);

        let mut phdrs = Vec::new();
        for (seg, &offset) in self.segments.iter().zip(&seg_offsets) {
            for v in [
                seg.p_type,
                offset,
                seg.vaddr,
                seg.paddr,
                seg.data.len() as u32,
                seg.memsz,
                7,
                0x10,
            ] {
                self.put32(&mut phdrs, v);
            }
        }
        out[EHDR_SIZE..EHDR_SIZE + phdrs.len()].copy_from_slice(&phdrs);
        out
    }
}
