//! Executable Sniffer and Loader Front-End.
//!
//! This module decides how to load each file named on the command line. It performs:
//! 1. **Directive skipping:** Names starting with `@` are configuration directives, not files.
//! 2. **Raw fallback:** Names that cannot be opened are parsed as raw-binary specifiers.
//! 3. **Sniffing:** The first 12 bytes (and bytes 510..512) select ELF, reject gzip and
//!    binaries of unknown format, or fall through to the symbol-file reader.
//! 4. **Fatal reporting:** `file_load_or_exit` for front-ends that stop on the first error.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::process;

use tracing::{debug, warn};

use crate::common::codec::ByteOrder;
use crate::common::constants::{BOOT_SIGNATURE, ELF_MAGIC, GZIP_MAGIC};
use crate::common::LoadError;
use crate::config::LoaderConfig;
use crate::sim::elf::load_elf;
use crate::sim::personality::{NidResolver, Personality};
use crate::sim::raw::{RawSpec, load_raw};
use crate::sim::symbols::SymbolStore;
use crate::soc::interconnect::Bus;

const PROBE_LEN: usize = 12;
const BOOT_SIGNATURE_OFFSET: u64 = 510;

/// Result of loading an executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedImage {
    /// Address execution starts at.
    pub entry_point: u64,
    /// Byte order of the image.
    pub byte_order: ByteOrder,
    /// Global pointer, if the image defines one.
    pub gp: Option<u64>,
    /// Initial general-purpose register values as `(index, value)`.
    pub initial_regs: Vec<(u8, u64)>,
}

impl LoadedImage {
    /// Creates an image description with no global pointer and no register presets.
    pub const fn new(entry_point: u64, byte_order: ByteOrder) -> Self {
        Self {
            entry_point,
            byte_order,
            gp: None,
            initial_regs: Vec::new(),
        }
    }

    /// Presets register `reg` to `value`, replacing an earlier preset.
    pub fn set_reg(&mut self, reg: u8, value: u64) {
        match self.initial_regs.iter_mut().find(|(r, _)| *r == reg) {
            Some(slot) => slot.1 = value,
            None => self.initial_regs.push((reg, value)),
        }
    }

    /// Returns the preset value of register `reg`.
    pub fn reg(&self, reg: u8) -> Option<u64> {
        self.initial_regs
            .iter()
            .find(|(r, _)| *r == reg)
            .map(|&(_, v)| v)
    }
}

/// What `file_load` did with a name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Loaded {
    /// A raw or ELF executable was loaded.
    Executable(LoadedImage),
    /// The file was read as a symbol listing.
    Symbols(usize),
    /// The name was a configuration directive.
    Skipped,
}

/// Loader front-end holding the collaborators shared by every file.
pub struct Loader<'a> {
    config: LoaderConfig,
    symbols: &'a mut dyn SymbolStore,
    personality: &'a dyn Personality,
    nids: &'a dyn NidResolver,
    executables_loaded: usize,
}

impl<'a> Loader<'a> {
    /// Creates a loader.
    ///
    /// # Arguments
    ///
    /// * `config` - Size limits and raw read chunk size.
    /// * `symbols` - Receives symbols from every loaded file.
    /// * `personality` - Post-load hook applied to ELF images.
    /// * `nids` - Resolver for PSP import stubs.
    pub fn new(
        config: &LoaderConfig,
        symbols: &'a mut dyn SymbolStore,
        personality: &'a dyn Personality,
        nids: &'a dyn NidResolver,
    ) -> Self {
        Self {
            config: config.clone(),
            symbols,
            personality,
            nids,
            executables_loaded: 0,
        }
    }

    /// Returns how many raw or ELF executables have been loaded.
    pub const fn executables_loaded(&self) -> usize {
        self.executables_loaded
    }

    /// Loads one file, choosing the format from its contents.
    ///
    /// # Arguments
    ///
    /// * `bus` - Destination memory.
    /// * `name` - A path, a raw specifier (`ADDR[:SKIP[:PC]]:PATH`) or an `@` directive.
    ///
    /// # Returns
    ///
    /// What was loaded.
    ///
    /// # Errors
    ///
    /// I/O failures, sniffer rejections (`TooSmall`, `Gzipped`, `TooLarge`, `UnknownFormat`),
    /// a malformed raw specifier, or any error from the ELF or raw loader.
    pub fn file_load(&mut self, bus: &mut Bus, name: &str) -> Result<Loaded, LoadError> {
        if name.starts_with('@') {
            debug!(name, "skipping configuration directive");
            return Ok(Loaded::Skipped);
        }
        debug!(name, "loading");

        let path = Path::new(name);
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(source) if !name.contains(':') => {
                return Err(LoadError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
            Err(_) => {
                let spec = RawSpec::parse(name)?;
                let image = load_raw(bus, &mut *self.symbols, &spec, &self.config)?;
                self.executables_loaded += 1;
                return Ok(Loaded::Executable(image));
            }
        };

        let io_err = |source| LoadError::Io {
            path: path.to_owned(),
            source,
        };
        let size = file.metadata().map_err(io_err)?.len();
        let (probe, boot_sector) = sniff(&mut file).map_err(io_err)?;
        drop(file);

        if probe.len() < PROBE_LEN {
            return Err(LoadError::TooSmall {
                path: path.to_owned(),
            });
        }

        if probe.starts_with(&ELF_MAGIC) {
            let image = load_elf(bus, &mut *self.symbols, self.personality, self.nids, path)?;
            self.executables_loaded += 1;
            return Ok(Loaded::Executable(image));
        }

        if probe.starts_with(&GZIP_MAGIC) {
            return Err(LoadError::Gzipped {
                path: path.to_owned(),
            });
        }

        if size > self.config.max_image_size {
            return Err(LoadError::TooLarge {
                path: path.to_owned(),
                size,
            });
        }

        if size == self.config.floppy_image_size {
            warn!(
                path = %path.display(),
                size,
                "file is the size of a 1.44 MB floppy image; is it meant to be a disk?"
            );
        }

        if probe
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c))
        {
            let dump = probe
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ");
            return Err(LoadError::UnknownFormat {
                path: path.to_owned(),
                probe: dump,
                boot_sector,
            });
        }

        let n = self.symbols.read_file(path)?;
        Ok(Loaded::Symbols(n))
    }

    /// Loads one file and terminates the process on failure.
    ///
    /// Prints `[!] FATAL: <cause>` to stderr and exits with status 1, the convention of
    /// simulator front-ends that cannot continue without their images.
    pub fn file_load_or_exit(&mut self, bus: &mut Bus, name: &str) -> Loaded {
        self.file_load(bus, name).unwrap_or_else(|e| {
            eprintln!("\n[!] FATAL: {e}");
            process::exit(1);
        })
    }
}

impl std::fmt::Debug for Loader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.config)
            .field("personality", &self.personality.name())
            .field("executables_loaded", &self.executables_loaded)
            .finish_non_exhaustive()
    }
}

/// Reads the format probe and checks for a boot-sector signature.
fn sniff(file: &mut File) -> io::Result<(Vec<u8>, bool)> {
    let mut probe = Vec::with_capacity(PROBE_LEN);
    let _ = file.by_ref().take(PROBE_LEN as u64).read_to_end(&mut probe)?;

    let _ = file.seek(SeekFrom::Start(BOOT_SIGNATURE_OFFSET))?;
    let mut sig = Vec::with_capacity(BOOT_SIGNATURE.len());
    let _ = file
        .by_ref()
        .take(BOOT_SIGNATURE.len() as u64)
        .read_to_end(&mut sig)?;

    Ok((probe, sig == BOOT_SIGNATURE))
}

/// Loads one file with default loader limits.
///
/// Convenience wrapper over `Loader::file_load` for callers that load a single image.
///
/// # Errors
///
/// See [`Loader::file_load`].
pub fn file_load(
    bus: &mut Bus,
    symbols: &mut dyn SymbolStore,
    personality: &dyn Personality,
    nids: &dyn NidResolver,
    name: &str,
) -> Result<Loaded, LoadError> {
    Loader::new(&LoaderConfig::default(), symbols, personality, nids).file_load(bus, name)
}
