//! Memory blocks and allocators.

use std::fmt;
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use crate::error::{PoolError, Result};

bitflags! {
    /// Properties requested from an allocator or carried by a memory block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemoryFlags: u32 {
        /// The memory may not be written.
        const READONLY = 1 << 1;
        /// Zero the prefix area on allocation.
        const ZERO_PREFIXED = 1 << 5;
        /// Zero the padding area on allocation.
        const ZERO_PADDED = 1 << 6;
        /// The block must be physically contiguous.
        const PHYSICALLY_CONTIGUOUS = 1 << 7;
    }
}

/// Layout requested for each allocated block.
///
/// `align` is an alignment *mask*: a value of 15 requests 16-byte aligned
/// data. `prefix` bytes are reserved in front of the visible region and
/// `padding` bytes after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AllocationParams {
    /// Memory flags
    pub flags: MemoryFlags,
    /// Alignment mask (alignment - 1)
    pub align: usize,
    /// Bytes reserved before the data
    pub prefix: usize,
    /// Bytes reserved after the data
    pub padding: usize,
}

impl AllocationParams {
    /// Parameters with the given alignment mask and nothing else.
    pub fn aligned(align: usize) -> Self {
        Self {
            align,
            ..Self::default()
        }
    }

    /// Total bytes a block of `size` visible bytes occupies.
    pub fn block_size(&self, size: usize) -> Option<usize> {
        self.prefix.checked_add(size)?.checked_add(self.padding)
    }
}

/// A contiguous block of bytes with a visible sub-range.
///
/// The block is reference counted. [`Memory::share`] gives a second view on
/// the same bytes; while more than one view exists none of them is
/// writable.
pub struct Memory {
    data: Arc<[u8]>,
    /// Start of the usable region inside `data`, chosen for alignment
    base: usize,
    maxsize: usize,
    offset: usize,
    size: usize,
    flags: MemoryFlags,
}

impl Memory {
    /// Wrap `data` as a memory block whose visible region is all of it.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            data: Arc::from(data),
            base: 0,
            maxsize: size,
            offset: 0,
            size,
            flags: MemoryFlags::empty(),
        }
    }

    /// Bytes available in the block.
    pub fn maxsize(&self) -> usize {
        self.maxsize
    }

    /// Start of the visible region.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the visible region.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Flags the block was allocated with.
    pub fn flags(&self) -> MemoryFlags {
        self.flags
    }

    /// Change the visible region. Returns `false` if it would not fit.
    pub fn resize(&mut self, offset: usize, size: usize) -> bool {
        match offset.checked_add(size) {
            Some(end) if end <= self.maxsize => {
                self.offset = offset;
                self.size = size;
                true
            }
            _ => false,
        }
    }

    /// Whether no other view shares the bytes and the block is not read-only.
    pub fn is_writable(&self) -> bool {
        !self.flags.contains(MemoryFlags::READONLY) && Arc::strong_count(&self.data) == 1
    }

    /// Another view on the same bytes.
    pub fn share(&self) -> Memory {
        Memory {
            data: Arc::clone(&self.data),
            base: self.base,
            maxsize: self.maxsize,
            offset: self.offset,
            size: self.size,
            flags: self.flags,
        }
    }

    /// The visible bytes.
    pub fn as_slice(&self) -> &[u8] {
        let start = self.base + self.offset;
        &self.data[start..start + self.size]
    }

    /// The visible bytes for writing, if the block is writable.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        if self.flags.contains(MemoryFlags::READONLY) {
            return None;
        }
        let start = self.base + self.offset;
        let size = self.size;
        Arc::get_mut(&mut self.data).map(|data| &mut data[start..start + size])
    }

    /// Address of the first usable byte, for alignment checks.
    pub fn data_addr(&self) -> usize {
        self.data.as_ptr() as usize + self.base
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("maxsize", &self.maxsize)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Source of memory blocks.
pub trait Allocator: Send + Sync + fmt::Debug {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Allocate a block with `size` visible bytes laid out per `params`.
    fn alloc(&self, size: usize, params: &AllocationParams) -> Result<Memory>;
}

/// Heap allocator used when a configuration names none.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl SystemAllocator {
    /// Process-wide shared instance. Every call returns the same `Arc`, so
    /// configurations naming it compare equal.
    pub fn shared() -> Arc<dyn Allocator> {
        static SHARED: OnceLock<Arc<dyn Allocator>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(SystemAllocator)))
    }
}

impl Allocator for SystemAllocator {
    fn name(&self) -> &str {
        "SystemMemory"
    }

    fn alloc(&self, size: usize, params: &AllocationParams) -> Result<Memory> {
        let maxsize = params
            .block_size(size)
            .ok_or_else(|| PoolError::allocation(format!("block of {size} bytes overflows")))?;
        let total = maxsize
            .checked_add(params.align)
            .ok_or_else(|| PoolError::allocation(format!("block of {size} bytes overflows")))?;

        // Zeroed, so ZERO_PREFIXED and ZERO_PADDED hold trivially.
        let data: Arc<[u8]> = Arc::from(vec![0u8; total]);
        let addr = data.as_ptr() as usize;
        let base = (params.align + 1 - (addr & params.align)) & params.align;

        Ok(Memory {
            data,
            base,
            maxsize,
            offset: params.prefix,
            size,
            flags: params.flags,
        })
    }
}
