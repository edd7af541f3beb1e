//! Raw Binary Loader.
//!
//! Loads headerless images described by a specifier string:
//!
//! ```text
//! ADDR:PATH
//! ADDR:SKIP:PATH
//! ADDR:SKIP:PC:PATH
//! ```
//!
//! Numbers follow C `strtoull(.., 0)` rules (`0x` hex, leading `0` octal, otherwise decimal).
//! The path is everything after the last `:`. `SKIP` bytes at the start of the file are not
//! loaded; execution starts at `PC`, which defaults to `ADDR`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::common::LoadError;
use crate::config::LoaderConfig;
use crate::sim::loader::LoadedImage;
use crate::sim::symbols::{SymbolKind, SymbolStore};
use crate::soc::interconnect::Bus;

/// Address used for the `HIGHESTADDR` marker symbol.
const HIGHEST_ADDR: u64 = 0xffff_ffff;

/// A parsed raw-binary specifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSpec {
    /// Physical load address.
    pub addr: u64,
    /// Bytes skipped at the start of the file.
    pub skip: u64,
    /// Entry point.
    pub entry: u64,
    /// File to load.
    pub path: PathBuf,
}

impl RawSpec {
    /// Parses `ADDR[:SKIP[:PC]]:PATH`.
    ///
    /// # Errors
    ///
    /// `LoadError::BadSpecifier` when a number is malformed, there are more than three numbers,
    /// or the path is empty.
    pub fn parse(spec: &str) -> Result<Self, LoadError> {
        let bad = |reason| LoadError::BadSpecifier {
            spec: spec.to_owned(),
            reason,
        };

        let (numbers, path) = spec.rsplit_once(':').ok_or_else(|| bad("missing ':'"))?;
        if path.is_empty() {
            return Err(bad("empty path"));
        }

        let values = numbers
            .split(':')
            .map(parse_c_number)
            .collect::<Option<Vec<u64>>>()
            .ok_or_else(|| bad("malformed number"))?;

        let (addr, skip, entry) = match values.as_slice() {
            [addr] => (*addr, 0, *addr),
            [addr, skip] => (*addr, *skip, *addr),
            [addr, skip, entry] => (*addr, *skip, *entry),
            _ => return Err(bad("expected at most three numbers")),
        };

        Ok(Self {
            addr,
            skip,
            entry,
            path: PathBuf::from(path),
        })
    }
}

/// Parses an unsigned integer with C base prefix rules.
fn parse_c_number(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse().ok()
    }
}

fn io_error(path: &Path, source: io::Error) -> LoadError {
    LoadError::Io {
        path: path.to_owned(),
        source,
    }
}

/// Loads a raw binary into memory.
///
/// # Arguments
///
/// * `bus` - Destination memory.
/// * `symbols` - Receives `.binfile*`, `ENTRYPOINT` and `HIGHESTADDR` markers.
/// * `spec` - Parsed specifier.
/// * `config` - Loader limits (read chunk size).
///
/// # Returns
///
/// The image with `entry_point = spec.entry` and the bus byte order.
///
/// # Errors
///
/// `LoadError::Io` if the file cannot be opened or read, or a memory error from the bus.
pub fn load_raw(
    bus: &mut Bus,
    symbols: &mut dyn SymbolStore,
    spec: &RawSpec,
    config: &LoaderConfig,
) -> Result<LoadedImage, LoadError> {
    let path = spec.path.as_path();
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;
    let _ = file
        .seek(SeekFrom::Start(spec.skip))
        .map_err(|e| io_error(path, e))?;

    let mut buf = vec![0u8; config.raw_chunk_size.max(1)];
    let mut size = 0u64;
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_error(path, e)),
        };
        bus.load_binary_at(&buf[..n], spec.addr + size)?;
        size += n as u64;
    }

    info!(
        path = %path.display(),
        addr = format_args!("{:#x}", spec.addr),
        size = format_args!("{size:#x}"),
        entry = format_args!("{:#x}", spec.entry),
        "loaded raw binary"
    );
    if spec.skip != 0 {
        debug!(skip = format_args!("{:#x}", spec.skip), "header bytes skipped");
    }

    let end = spec.addr + size;
    symbols.add_symbol(spec.addr, size, ".binfile", SymbolKind::Marker);
    symbols.add_symbol(spec.addr, 1, ".binfile.start", SymbolKind::Marker);
    symbols.add_symbol(end, 1, ".binfile.end", SymbolKind::Marker);
    symbols.add_symbol(end, 1, ".binfile.bss.start", SymbolKind::Marker);
    symbols.add_symbol(end, 0, ".binfile.bss", SymbolKind::Marker);
    symbols.add_symbol(spec.entry, 1, "ENTRYPOINT", SymbolKind::Entry);
    symbols.add_symbol(HIGHEST_ADDR, 1, "HIGHESTADDR", SymbolKind::Marker);

    Ok(LoadedImage::new(spec.entry, bus.byte_order()))
}
