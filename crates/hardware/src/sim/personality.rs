//! Platform personalities and NID resolution.
//!
//! A `Personality` gets the last word on a loaded image: once the loader has computed the
//! natural entry point it may redirect execution and seed argument registers. PSP homebrew run
//! through the kernel's exec path expects `a0`/`a1`/`a2` to describe the image, which
//! `PspExecWrapper` provides.
//!
//! `NidResolver` maps the 32-bit NIDs that PSP modules import by to the emulator's syscall
//! numbers. The HLE layer owns the real table; `NidTable` is a plain map for hosts and tests.

use std::collections::HashMap;

use tracing::debug;

use crate::common::constants::{REG_A0, REG_A1, REG_A2};
use crate::sim::loader::LoadedImage;

/// Post-load hook applied to every executable image.
pub trait Personality {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Adjusts the entry point and initial registers of a freshly loaded image.
    fn finish(&self, image: &mut LoadedImage);
}

/// Leaves the image untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct Native;

impl Personality for Native {
    fn name(&self) -> &str {
        "native"
    }

    fn finish(&self, _image: &mut LoadedImage) {}
}

/// Starts an image the way the PSP kernel starts a plain executable buffer.
///
/// Sets `a0 = 1`, `a1 = natural entry`, `a2 = 0`. If `entry_override` is set, execution
/// starts there instead, typically a kernel loader routine that consumes those arguments.
#[derive(Clone, Copy, Debug, Default)]
pub struct PspExecWrapper {
    /// Address to start at instead of the image's own entry point.
    pub entry_override: Option<u64>,
}

impl Personality for PspExecWrapper {
    fn name(&self) -> &str {
        "psp-exec"
    }

    fn finish(&self, image: &mut LoadedImage) {
        let natural = image.entry_point;
        image.set_reg(REG_A0, 1);
        image.set_reg(REG_A1, natural);
        image.set_reg(REG_A2, 0);
        if let Some(entry) = self.entry_override {
            debug!(
                natural = format_args!("{natural:#x}"),
                entry = format_args!("{entry:#x}"),
                "redirecting entry point"
            );
            image.entry_point = entry;
        }
    }
}

/// Maps imported NIDs to syscall numbers.
pub trait NidResolver {
    /// Returns the syscall number that implements `nid`.
    fn syscall_for_nid(&self, nid: u32) -> Option<u32>;

    /// Returns a human-readable name for `nid`, if known.
    fn nid_name(&self, _nid: u32) -> Option<&str> {
        None
    }
}

/// In-memory NID table.
#[derive(Clone, Debug, Default)]
pub struct NidTable {
    syscalls: HashMap<u32, u32>,
    names: HashMap<u32, String>,
}

impl NidTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `nid` to `syscall`, replacing any previous mapping.
    pub fn insert(&mut self, nid: u32, syscall: u32) {
        let _ = self.syscalls.insert(nid, syscall);
    }

    /// Maps `nid` to `syscall` and records its function name.
    pub fn insert_named(&mut self, nid: u32, syscall: u32, name: impl Into<String>) {
        self.insert(nid, syscall);
        let _ = self.names.insert(nid, name.into());
    }

    /// Returns the number of mapped NIDs.
    pub fn len(&self) -> usize {
        self.syscalls.len()
    }

    /// Returns `true` if no NIDs are mapped.
    pub fn is_empty(&self) -> bool {
        self.syscalls.is_empty()
    }
}

impl NidResolver for NidTable {
    fn syscall_for_nid(&self, nid: u32) -> Option<u32> {
        self.syscalls.get(&nid).copied()
    }

    fn nid_name(&self, nid: u32) -> Option<&str> {
        self.names.get(&nid).map(String::as_str)
    }
}

impl FromIterator<(u32, u32)> for NidTable {
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        Self {
            syscalls: iter.into_iter().collect(),
            names: HashMap::new(),
        }
    }
}
