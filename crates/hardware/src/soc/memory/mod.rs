//! Physical System Memory.
//!
//! This module implements the sparse physical address space. It provides:
//! 1. **Block:** `MemBlock`, the zero-initialised host allocation behind each table slot.
//! 2. **Paged Memory:** A two-level table that splits an address into a page-table index and
//!    a block offset, allocating blocks on first write.
//!
//! Reads of addresses whose block was never written return zeroes without allocating.
//! Blocks are never freed individually and never move once installed.

/// Zero-initialised host allocation (mmap or heap).
pub mod block;

use tracing::trace;

use self::block::MemBlock;
use crate::common::{AccessType, MemoryError};
use crate::config::MemoryConfig;

/// Sparse physical memory backed by lazily allocated blocks.
pub struct PagedMemory {
    table: Vec<Option<Box<MemBlock>>>,
    physical_max: u64,
    max_bits: u32,
    pagetable_bits: u32,
    memblock_bits: u32,
    allocated: usize,
}

impl PagedMemory {
    /// Creates an empty physical memory.
    ///
    /// # Arguments
    ///
    /// * `config` - Geometry; `bits_per_pagetable + bits_per_memblock` must equal `max_bits`.
    ///
    /// # Returns
    ///
    /// The memory with every table slot empty.
    ///
    /// # Errors
    ///
    /// `MemoryError::Geometry` if the bit split does not add up or cannot be represented on
    /// the host.
    pub fn new(config: &MemoryConfig) -> Result<Self, MemoryError> {
        let pagetable_bits = config.bits_per_pagetable;
        let memblock_bits = config.bits_per_memblock;
        let max_bits = config.max_bits;

        let host_limit = usize::BITS / 2;
        if pagetable_bits.checked_add(memblock_bits) != Some(max_bits)
            || max_bits > u64::BITS
            || pagetable_bits > host_limit
            || memblock_bits > host_limit
        {
            return Err(MemoryError::Geometry {
                pagetable_bits,
                memblock_bits,
                max_bits,
            });
        }

        let mut table = Vec::new();
        table.resize_with(1usize << pagetable_bits, || None);

        Ok(Self {
            table,
            physical_max: config.physical_max,
            max_bits,
            pagetable_bits,
            memblock_bits,
            allocated: 0,
        })
    }

    /// Returns the exclusive end of physical memory.
    pub const fn physical_max(&self) -> u64 {
        self.physical_max
    }

    /// Returns the address width covered by the table.
    pub const fn max_bits(&self) -> u32 {
        self.max_bits
    }

    /// Returns the size of one block in bytes.
    pub const fn block_size(&self) -> usize {
        1usize << self.memblock_bits
    }

    /// Returns the number of blocks allocated so far.
    pub const fn allocated_blocks(&self) -> usize {
        self.allocated
    }

    #[inline(always)]
    const fn entry(&self, addr: u64) -> usize {
        ((addr >> self.memblock_bits) & ((1u64 << self.pagetable_bits) - 1)) as usize
    }

    /// Returns the offset of `addr` inside its block.
    #[inline(always)]
    pub const fn block_offset(&self, addr: u64) -> usize {
        (addr & ((1u64 << self.memblock_bits) - 1)) as usize
    }

    /// Returns the block holding `addr`, if it has been allocated.
    pub fn block(&self, addr: u64) -> Option<&MemBlock> {
        self.table[self.entry(addr)].as_deref()
    }

    /// Returns the block holding `addr`, allocating a zero-filled one if needed.
    pub fn block_mut(&mut self, addr: u64) -> &mut MemBlock {
        let entry = self.entry(addr);
        let size = self.block_size();
        let allocated = &mut self.allocated;
        self.table[entry].get_or_insert_with(|| {
            *allocated += 1;
            trace!(addr = format_args!("{addr:#x}"), entry, size, "allocating memory block");
            Box::new(MemBlock::new(size))
        })
    }

    /// Locates the block for `addr` with the given intent.
    ///
    /// # Arguments
    ///
    /// * `addr` - Physical address.
    /// * `intent` - `Read` never allocates; `Write` allocates an empty slot.
    ///
    /// # Returns
    ///
    /// The block, or `None` for a read of a slot that was never written (reads as zeroes).
    pub fn translate(&mut self, addr: u64, intent: AccessType) -> Option<&mut MemBlock> {
        match intent {
            AccessType::Read => {
                let entry = self.entry(addr);
                self.table[entry].as_deref_mut()
            }
            AccessType::Write => Some(self.block_mut(addr)),
        }
    }

    /// Copies memory starting at `addr` into `buf`, zero-filling unallocated blocks.
    pub fn read(&self, addr: u64, buf: &mut [u8]) {
        let mut done = 0usize;
        while done < buf.len() {
            let cur = addr.wrapping_add(done as u64);
            let offset = self.block_offset(cur);
            let n = (self.block_size() - offset).min(buf.len() - done);
            let dst = &mut buf[done..done + n];
            match self.block(cur) {
                Some(block) => block.read_into(offset, dst),
                None => dst.fill(0),
            }
            done += n;
        }
    }

    /// Copies `data` into memory starting at `addr`, allocating blocks as needed.
    pub fn write(&mut self, addr: u64, data: &[u8]) {
        let mut done = 0usize;
        while done < data.len() {
            let cur = addr.wrapping_add(done as u64);
            let offset = self.block_offset(cur);
            let n = (self.block_size() - offset).min(data.len() - done);
            self.block_mut(cur).write_slice(offset, &data[done..done + n]);
            done += n;
        }
    }
}

impl std::fmt::Debug for PagedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedMemory")
            .field("physical_max", &format_args!("{:#x}", self.physical_max))
            .field("max_bits", &self.max_bits)
            .field("pagetable_bits", &self.pagetable_bits)
            .field("memblock_bits", &self.memblock_bits)
            .field("allocated", &self.allocated)
            .finish_non_exhaustive()
    }
}
