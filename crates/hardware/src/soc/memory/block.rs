//! Memory Block Implementation.
//!
//! This module provides a wrapper around one fixed-size, zero-initialised host allocation.
//! Blocks back both the sparse physical memory and device buffers shared with the
//! dynamic-translation fast path. On Unix they are anonymous `mmap` regions so the host
//! only commits pages that are touched; when `mmap` fails, or on other platforms, a zeroed
//! heap allocation is used instead.

use std::ops::Range;
use std::ptr::NonNull;
use std::fmt;

/// A zero-initialised, fixed-size host allocation whose address never changes.
///
/// Reads and writes take `&self` so a block can be shared (through `Arc`) between a device
/// and the registry entry that hands its host address to translation caches. The contents are
/// only reachable by copying, so no reference into the bytes outlives a call.
pub struct MemBlock {
    ptr: NonNull<u8>,
    size: usize,
    is_mmap: bool,
}

// SAFETY: the allocation is owned exclusively by this value and freed only in `Drop`.
// Concurrent writers must be serialized by the owner of the bus.
unsafe impl Send for MemBlock {}
// SAFETY: see above.
unsafe impl Sync for MemBlock {}

impl MemBlock {
    /// Allocates a zero-filled block of `size` bytes.
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the block in bytes.
    ///
    /// # Returns
    ///
    /// A new `MemBlock`. Host allocation failure aborts the process.
    pub fn new(size: usize) -> Self {
        #[cfg(unix)]
        {
            if let Some(ptr) = Self::map_anonymous(size) {
                return Self {
                    ptr,
                    size,
                    is_mmap: true,
                };
            }
        }
        Self::heap(size)
    }

    #[cfg(unix)]
    fn map_anonymous(size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        // SAFETY: anonymous private mapping with no address hint; the result is checked
        // against MAP_FAILED before use.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            tracing::debug!(size, "mmap failed, falling back to heap allocation");
            return None;
        }
        NonNull::new(ptr.cast::<u8>())
    }

    fn heap(size: usize) -> Self {
        let boxed = vec![0u8; size].into_boxed_slice();
        let raw = Box::into_raw(boxed).cast::<u8>();
        Self {
            // SAFETY: `Box::into_raw` never returns null, even for empty slices.
            ptr: unsafe { NonNull::new_unchecked(raw) },
            size,
            is_mmap: false,
        }
    }

    /// Returns the size of the block in bytes.
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the block holds no bytes.
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns a raw pointer to the first byte.
    pub const fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Returns the host address range covered by the block.
    ///
    /// Translation caches key their host-page entries by these addresses.
    pub fn host_range(&self) -> Range<usize> {
        let start = self.ptr.as_ptr() as usize;
        start..start + self.size
    }

    /// Reads a single byte.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside the block.
    pub fn read_u8(&self, offset: usize) -> u8 {
        assert!(offset < self.size, "memory block read out of bounds");
        // SAFETY: bounds checked above.
        unsafe { *self.ptr.as_ptr().add(offset) }
    }

    /// Writes a single byte.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside the block.
    pub fn write_u8(&self, offset: usize, val: u8) {
        assert!(offset < self.size, "memory block write out of bounds");
        // SAFETY: bounds checked above.
        unsafe {
            *self.ptr.as_ptr().add(offset) = val;
        }
    }

    /// Copies `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the end of the block.
    pub fn read_into(&self, offset: usize, buf: &mut [u8]) {
        assert!(
            offset
                .checked_add(buf.len())
                .is_some_and(|end| end <= self.size),
            "memory block read out of bounds"
        );
        // SAFETY: bounds checked above; `buf` cannot alias the block through a `&mut`.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset), buf.as_mut_ptr(), buf.len());
        }
    }

    /// Copies `data` into the block starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the end of the block.
    pub fn write_slice(&self, offset: usize, data: &[u8]) {
        assert!(
            offset
                .checked_add(data.len())
                .is_some_and(|end| end <= self.size),
            "memory block write out of bounds"
        );
        // SAFETY: bounds checked above. `copy` tolerates `data` pointing into this block.
        unsafe {
            std::ptr::copy(data.as_ptr(), self.ptr.as_ptr().add(offset), data.len());
        }
    }
}

impl fmt::Debug for MemBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemBlock")
            .field("host", &format_args!("{:#x}", self.ptr.as_ptr() as usize))
            .field("size", &self.size)
            .field("is_mmap", &self.is_mmap)
            .finish()
    }
}

impl Drop for MemBlock {
    /// Releases the allocation.
    ///
    /// Mapped blocks are unmapped; heap blocks are rebuilt into a boxed slice and dropped.
    fn drop(&mut self) {
        if self.is_mmap {
            #[cfg(unix)]
            // SAFETY: `ptr`/`size` came from a successful `mmap` of exactly this length.
            unsafe {
                let _ = libc::munmap(self.ptr.as_ptr().cast(), self.size);
            }
        } else {
            let raw = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.size);
            // SAFETY: `raw` is the pointer produced by `Box::into_raw` in `heap`.
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}
