//! Symbol registration.
//!
//! Loaders report every address they learn a name for through `SymbolStore`. `SymbolTable` is
//! the in-crate implementation: a sorted list that answers "which symbol contains this
//! address" and reads `nm`-style text listings.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::common::LoadError;

/// Where a symbol came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Loader bookkeeping, such as the bounds of a raw binary.
    Marker,
    /// The program entry point.
    Entry,
    /// An `Elf32_Sym` from a symbol table section.
    Elf,
    /// A line from a symbol listing file.
    Listed,
}

/// One named address range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    /// First address.
    pub addr: u64,
    /// Length in bytes; `0` for pure markers.
    pub len: u64,
    /// Symbol name.
    pub name: String,
    /// Origin.
    pub kind: SymbolKind,
}

impl Symbol {
    /// Returns `true` if `addr` lies inside the symbol.
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.addr && addr - self.addr < self.len
    }
}

/// Receiver for symbols discovered while loading.
pub trait SymbolStore {
    /// Registers `name` for `[addr, addr + len)`.
    fn add_symbol(&mut self, addr: u64, len: u64, name: &str, kind: SymbolKind);

    /// Reads a symbol listing file.
    ///
    /// # Returns
    ///
    /// The number of symbols added.
    ///
    /// # Errors
    ///
    /// `LoadError::Io` if the file cannot be read.
    fn read_file(&mut self, path: &Path) -> Result<usize, LoadError>;
}

/// Address-sorted symbol table.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub const fn new() -> Self {
        Self {
            symbols: Vec::new(),
        }
    }

    /// Returns the number of symbols.
    pub const fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if the table is empty.
    pub const fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterates over symbols in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Returns the first symbol with the given name.
    pub fn by_name(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Finds the symbol containing `addr`.
    ///
    /// When several symbols contain the address, the one starting closest to it wins.
    ///
    /// # Returns
    ///
    /// The symbol and the offset of `addr` into it.
    pub fn lookup(&self, addr: u64) -> Option<(&Symbol, u64)> {
        let end = self.symbols.partition_point(|s| s.addr <= addr);
        self.symbols[..end]
            .iter()
            .rev()
            .find(|s| s.contains(addr))
            .map(|s| (s, addr - s.addr))
    }

    fn insert(&mut self, symbol: Symbol) {
        let pos = self.symbols.partition_point(|s| s.addr <= symbol.addr);
        self.symbols.insert(pos, symbol);
    }

    /// Parses `nm` output and adds every symbol found.
    ///
    /// Accepts `ADDR TYPE NAME` and `ADDR SIZE TYPE NAME` lines with hexadecimal numbers.
    /// Symbols without a size extend to the next listed address.
    ///
    /// # Returns
    ///
    /// The number of symbols added.
    pub fn parse_nm(&mut self, text: &str) -> usize {
        let mut parsed: Vec<(u64, Option<u64>, &str)> = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let entry = match fields.as_slice() {
                [addr, kind, name] if kind.len() == 1 => {
                    u64::from_str_radix(addr, 16).ok().map(|a| (a, None, *name))
                }
                [addr, size, kind, name] if kind.len() == 1 => {
                    match (u64::from_str_radix(addr, 16), u64::from_str_radix(size, 16)) {
                        (Ok(a), Ok(s)) => Some((a, Some(s), *name)),
                        _ => None,
                    }
                }
                [] => continue,
                _ => None,
            };
            match entry {
                Some(e) => parsed.push(e),
                None => debug!(line = lineno + 1, text = line, "skipping symbol line"),
            }
        }

        parsed.sort_by_key(|&(addr, _, _)| addr);
        let count = parsed.len();
        for (i, &(addr, size, name)) in parsed.iter().enumerate() {
            let len = size.unwrap_or_else(|| {
                parsed[i + 1..]
                    .iter()
                    .find(|&&(next, _, _)| next > addr)
                    .map_or(1, |&(next, _, _)| next - addr)
            });
            self.add_symbol(addr, len, name, SymbolKind::Listed);
        }
        count
    }
}

impl SymbolStore for SymbolTable {
    fn add_symbol(&mut self, addr: u64, len: u64, name: &str, kind: SymbolKind) {
        self.insert(Symbol {
            addr,
            len,
            name: name.to_owned(),
            kind,
        });
    }

    fn read_file(&mut self, path: &Path) -> Result<usize, LoadError> {
        let bytes = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })?;
        let n = self.parse_nm(&String::from_utf8_lossy(&bytes));
        debug!(path = %path.display(), symbols = n, "read symbol file");
        Ok(n)
    }
}
