//! Media buffers.
//!
//! A [`Buffer`] is a list of [`Memory`] blocks plus timing information,
//! flags and a list of [`Meta`] items. It is the object type recycled by
//! [`BufferPool`](crate::buffer_pool::BufferPool).
//!
//! Replacing or adding memory through the buffer API sets
//! [`BufferFlags::TAG_MEMORY`], which tells a pool that the buffer's memory
//! is no longer the one it allocated.
//!
//! ```rust
//! use media_pool::buffer::{Buffer, BufferFlags, Memory};
//!
//! let mut buffer = Buffer::with_memory(Memory::from_vec(vec![0; 64]));
//! assert_eq!(buffer.size(), 64);
//!
//! buffer.resize(16, 32);
//! assert_eq!(buffer.get_sizes(), (32, 16, 64));
//!
//! buffer.append_memory(Memory::from_vec(vec![0; 8]));
//! assert!(buffer.has_flags(BufferFlags::TAG_MEMORY));
//! ```

mod memory;
mod meta;

pub use memory::{AllocationParams, Allocator, Memory, MemoryFlags, SystemAllocator};
pub use meta::{Meta, MetaFlags};

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

bitflags! {
    /// Buffer flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// Produced by a live source
        const LIVE = 1 << 4;
        /// Decode but do not render
        const DECODE_ONLY = 1 << 5;
        /// First buffer after a discontinuity
        const DISCONT = 1 << 6;
        /// Timestamps should be resynchronized
        const RESYNC = 1 << 7;
        /// Data may be corrupted
        const CORRUPTED = 1 << 8;
        /// Media-specific marker
        const MARKER = 1 << 9;
        /// Stream header
        const HEADER = 1 << 10;
        /// Gap in the stream, data is silence or empty
        const GAP = 1 << 11;
        /// May be dropped
        const DROPPABLE = 1 << 12;
        /// Not a key unit
        const DELTA_UNIT = 1 << 13;
        /// Memory was replaced, added or removed since allocation
        const TAG_MEMORY = 1 << 14;
        /// Sync after this buffer
        const SYNC_AFTER = 1 << 15;
        /// Must not be dropped
        const NON_DROPPABLE = 1 << 16;
    }
}

/// A media buffer.
///
/// Timing fields are in nanoseconds; `offset` and `offset_end` are
/// media-specific positions such as byte or frame numbers.
#[derive(Debug)]
pub struct Buffer {
    id: u64,
    flags: BufferFlags,
    /// Presentation timestamp
    pub pts: Option<u64>,
    /// Decode timestamp
    pub dts: Option<u64>,
    /// Duration
    pub duration: Option<u64>,
    /// Media offset of the first unit
    pub offset: Option<u64>,
    /// Media offset past the last unit
    pub offset_end: Option<u64>,
    memory: Vec<Memory>,
    metas: Vec<Meta>,
}

impl Buffer {
    /// Create a buffer without memory.
    pub fn new() -> Self {
        Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            flags: BufferFlags::empty(),
            pts: None,
            dts: None,
            duration: None,
            offset: None,
            offset_end: None,
            memory: Vec::new(),
            metas: Vec::new(),
        }
    }

    /// Create a buffer holding `memory`. The memory tag is not set.
    pub fn with_memory(memory: Memory) -> Self {
        let mut buffer = Self::new();
        buffer.memory.push(memory);
        buffer
    }

    /// Process-unique identity, stable across recycling.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current flags.
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Whether all of `flags` are set.
    pub fn has_flags(&self, flags: BufferFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Add `flags`.
    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.flags.insert(flags);
    }

    /// Remove `flags`.
    pub fn unset_flags(&mut self, flags: BufferFlags) {
        self.flags.remove(flags);
    }

    /// Number of memory blocks.
    pub fn n_memory(&self) -> usize {
        self.memory.len()
    }

    /// Memory block at `index`.
    pub fn memory(&self, index: usize) -> Option<&Memory> {
        self.memory.get(index)
    }

    /// Change the visible region of the block at `index`.
    ///
    /// This is a resize and leaves the memory tag alone. Returns `false` if
    /// there is no such block or the region does not fit.
    pub fn resize_memory(&mut self, index: usize, offset: usize, size: usize) -> bool {
        self.memory
            .get_mut(index)
            .is_some_and(|memory| memory.resize(offset, size))
    }

    /// Visible bytes of the block at `index` for writing, if it is writable.
    pub fn map_writable(&mut self, index: usize) -> Option<&mut [u8]> {
        self.memory.get_mut(index)?.as_mut_slice()
    }

    /// Replace the block at `index` with `memory` and set the memory tag.
    ///
    /// Returns the previous block, or gives `memory` back as the error if
    /// there is no such block.
    pub fn replace_memory(&mut self, index: usize, memory: Memory) -> std::result::Result<Memory, Memory> {
        match self.memory.get_mut(index) {
            Some(slot) => {
                self.flags.insert(BufferFlags::TAG_MEMORY);
                Ok(std::mem::replace(slot, memory))
            }
            None => Err(memory),
        }
    }

    /// Iterate over the memory blocks.
    pub fn iter_memory(&self) -> impl Iterator<Item = &Memory> {
        self.memory.iter()
    }

    /// Append a memory block and set the memory tag.
    pub fn append_memory(&mut self, memory: Memory) {
        self.memory.push(memory);
        self.flags.insert(BufferFlags::TAG_MEMORY);
    }

    /// Replace every memory block with `memory` and set the memory tag.
    pub fn replace_all_memory(&mut self, memory: Memory) {
        self.memory.clear();
        self.memory.push(memory);
        self.flags.insert(BufferFlags::TAG_MEMORY);
    }

    /// Remove every memory block and set the memory tag.
    pub fn remove_all_memory(&mut self) -> Vec<Memory> {
        self.flags.insert(BufferFlags::TAG_MEMORY);
        std::mem::take(&mut self.memory)
    }

    /// Total visible bytes.
    pub fn size(&self) -> usize {
        self.memory.iter().map(Memory::size).sum()
    }

    /// `(size, offset, maxsize)`: total visible bytes, offset of the visible
    /// region in the first block and total bytes in all blocks.
    pub fn get_sizes(&self) -> (usize, usize, usize) {
        let offset = self.memory.first().map_or(0, Memory::offset);
        let maxsize = self.memory.iter().map(Memory::maxsize).sum();
        (self.size(), offset, maxsize)
    }

    /// Make `size` bytes starting at `offset` visible.
    ///
    /// `offset` counts from the start of the first block. The range is
    /// spread over the blocks in order. Returns `false`, leaving the buffer
    /// untouched, if the range does not fit.
    pub fn resize(&mut self, offset: usize, size: usize) -> bool {
        let (_, _, maxsize) = self.get_sizes();
        match offset.checked_add(size) {
            Some(end) if end <= maxsize => {}
            _ => return false,
        }

        let mut skip = offset;
        let mut left = size;
        for memory in &mut self.memory {
            let block_skip = skip.min(memory.maxsize());
            skip -= block_skip;
            let len = left.min(memory.maxsize() - block_skip);
            left -= len;
            memory.resize(block_skip, len);
        }
        true
    }

    /// Whether every memory block is writable.
    pub fn is_all_memory_writable(&self) -> bool {
        self.memory.iter().all(Memory::is_writable)
    }

    /// Attach `meta` and return it for further setup.
    pub fn add_meta(&mut self, meta: Meta) -> &mut Meta {
        self.metas.push(meta);
        let last = self.metas.len() - 1;
        &mut self.metas[last]
    }

    /// First metadata item of `api`.
    pub fn get_meta(&self, api: &str) -> Option<&Meta> {
        self.metas.iter().find(|meta| meta.api() == api)
    }

    /// Iterate over the metadata.
    pub fn iter_meta(&self) -> impl Iterator<Item = &Meta> {
        self.metas.iter()
    }

    /// Iterate mutably over the metadata.
    pub fn iter_meta_mut(&mut self) -> impl Iterator<Item = &mut Meta> {
        self.metas.iter_mut()
    }

    /// Number of metadata items.
    pub fn n_meta(&self) -> usize {
        self.metas.len()
    }

    /// Remove the first metadata item of `api`.
    ///
    /// Locked metadata is kept; returns whether something was removed.
    pub fn remove_meta(&mut self, api: &str) -> bool {
        match self.metas.iter().position(|meta| meta.api() == api) {
            Some(index) if !self.metas[index].is_locked() => {
                self.metas.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Keep only the metadata for which `keep` returns true, locked or not.
    pub(crate) fn retain_meta(&mut self, keep: impl FnMut(&Meta) -> bool) {
        self.metas.retain(keep);
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}
