//! Pool of media buffers.
//!
//! [`BufferPool`] is a [`MiniObjectPool`] whose objects are [`Buffer`]s of a
//! configured payload size. On top of the generic pool it
//!
//! - allocates memory through the configured [`Allocator`], honoring the
//!   allocation parameters,
//! - marks metadata present right after allocation as pooled and locked, so
//!   it survives recycling and consumers cannot remove it,
//! - resets returned buffers: flags, timestamps and offsets are cleared,
//!   the visible region is restored and unpooled metadata is stripped,
//! - discards returned buffers whose memory was replaced, resized beyond
//!   repair or is shared with someone else.
//!
//! # Examples
//!
//! ```rust
//! use media_pool::buffer_pool::{BufferPool, BufferPoolConfig};
//!
//! let pool = BufferPool::default();
//! pool.set_config(BufferPoolConfig::new(None, 1024, 2, 4)).unwrap();
//! pool.set_active(true).unwrap();
//!
//! let mut buffer = pool.acquire().unwrap();
//! assert_eq!(buffer.size(), 1024);
//! buffer.pts = Some(40_000_000);
//! buffer.resize(0, 100);
//! drop(buffer);
//!
//! let buffer = pool.acquire().unwrap();
//! assert_eq!(buffer.size(), 1024);
//! assert_eq!(buffer.pts, None);
//! ```

mod config;

pub use config::{BufferPoolConfig, BufferPoolConfigBuilder};

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::{AllocationParams, Allocator, Buffer, BufferFlags, MetaFlags, SystemAllocator};
use crate::error::Result;
use crate::logging::BUFFER_POOL;
use crate::pool::{AcquireFlags, AcquireParams, MiniObjectPool, PoolCore, PoolImpl, Pooled};
use crate::{log_debug, log_perf, log_trace, log_warn};

/// Acquire flag: the caller wants a buffer starting a key unit.
///
/// Interpreted by buffer pool kinds that care; the base passes it through.
pub const ACQUIRE_KEY_UNIT: AcquireFlags = AcquireFlags::LAST;

/// Acquire flag: the caller wants a buffer following a discontinuity.
///
/// Interpreted by buffer pool kinds that care; the base passes it through.
pub const ACQUIRE_DISCONT: AcquireFlags = AcquireFlags::from_bits_retain(AcquireFlags::LAST.bits() << 2);

/// A pool of [`Buffer`]s.
pub type BufferPool = MiniObjectPool<BufferPoolImpl>;

/// A buffer borrowed from a [`BufferPool`].
pub type PooledBuffer = Pooled<BufferPoolImpl>;

/// Hook run on every freshly allocated buffer, before its metadata is
/// locked.
pub type Decorator = Box<dyn Fn(&mut Buffer) + Send + Sync>;

/// Settings derived from the accepted configuration.
#[derive(Clone)]
struct Settings {
    size: usize,
    allocator: Arc<dyn Allocator>,
    params: AllocationParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            size: 0,
            allocator: SystemAllocator::shared(),
            params: AllocationParams::default(),
        }
    }
}

/// Buffer pool behavior.
///
/// Build one with [`BufferPoolImpl::new`], optionally add a decorator and
/// option tags, and wrap it with [`MiniObjectPool::new`]. Pools that only
/// need the defaults use [`BufferPool::default`].
#[derive(Default)]
pub struct BufferPoolImpl {
    settings: RwLock<Settings>,
    decorator: Option<Decorator>,
    options: Vec<&'static str>,
}

impl BufferPoolImpl {
    /// Buffer pool behavior without decorator or options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `decorator` on every new buffer.
    ///
    /// Metadata it attaches is marked pooled and locked, so it stays on the
    /// buffer for its whole life in the pool.
    pub fn with_decorator<F>(mut self, decorator: F) -> Self
    where
        F: Fn(&mut Buffer) + Send + Sync + 'static,
    {
        self.decorator = Some(Box::new(decorator));
        self
    }

    /// Advertise `options` from [`MiniObjectPool::get_options`].
    pub fn with_supported_options(mut self, options: &[&'static str]) -> Self {
        self.options = options.to_vec();
        self
    }

    /// Payload size of the accepted configuration.
    pub fn size(&self) -> usize {
        self.settings.read().size
    }
}

impl fmt::Debug for BufferPoolImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.settings.read();
        f.debug_struct("BufferPoolImpl")
            .field("size", &settings.size)
            .field("allocator", &settings.allocator.name())
            .field("params", &settings.params)
            .field("has_decorator", &self.decorator.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl PoolImpl for BufferPoolImpl {
    type Object = Buffer;
    type Config = BufferPoolConfig;

    fn get_options(&self) -> &[&'static str] {
        &self.options
    }

    fn set_config(&self, pool: &PoolCore<Self>, config: &mut BufferPoolConfig) -> Result<()> {
        config.validate()?;
        pool.parent_set_config(config)?;

        let allocator = config
            .allocator
            .clone()
            .unwrap_or_else(SystemAllocator::shared);
        log_debug!(
            BUFFER_POOL,
            pool = pool.id(),
            size = config.size,
            allocator = allocator.name(),
            prefix = config.params.prefix,
            padding = config.params.padding,
            align = config.params.align,
            "config"
        );

        *self.settings.write() = Settings {
            size: config.size as usize,
            allocator,
            params: config.params,
        };
        Ok(())
    }

    fn alloc_object(&self, pool: &PoolCore<Self>, _params: Option<&AcquireParams>) -> Result<Buffer> {
        let (size, allocator, params) = {
            let settings = self.settings.read();
            (settings.size, Arc::clone(&settings.allocator), settings.params)
        };

        let memory = allocator.alloc(size, &params)?;
        let mut buffer = Buffer::with_memory(memory);

        if let Some(decorate) = &self.decorator {
            decorate(&mut buffer);
        }
        for meta in buffer.iter_meta_mut() {
            log_trace!(BUFFER_POOL, pool = pool.id(), api = meta.api(), "marking meta as pooled");
            meta.set_flags(MetaFlags::POOLED | MetaFlags::LOCKED);
        }
        // Metadata setup may have swapped memory; what we hand out is the
        // pool's memory by definition.
        buffer.unset_flags(BufferFlags::TAG_MEMORY);

        Ok(buffer)
    }

    fn reset_object(&self, pool: &PoolCore<Self>, buffer: &mut Buffer) {
        let (size, prefix) = {
            let settings = self.settings.read();
            (settings.size, settings.params.prefix)
        };

        buffer.unset_flags(!BufferFlags::TAG_MEMORY);
        buffer.pts = None;
        buffer.dts = None;
        buffer.duration = None;
        buffer.offset = None;
        buffer.offset_end = None;

        // Intact memory is restored to its full extent. If it can no longer
        // hold the configured size the release check discards it.
        if !buffer.has_flags(BufferFlags::TAG_MEMORY) {
            let (_, _, maxsize) = buffer.get_sizes();
            if maxsize >= prefix + size {
                buffer.resize(prefix, size);
            } else {
                log_warn!(
                    BUFFER_POOL,
                    pool = pool.id(),
                    buffer = buffer.id(),
                    maxsize,
                    size,
                    "can't resize buffer back to pool size"
                );
            }
        }

        buffer.retain_meta(|meta| meta.is_pooled());
    }

    fn release_object(&self, pool: &PoolCore<Self>, buffer: Buffer) {
        let size = self.settings.read().size;

        if buffer.has_flags(BufferFlags::TAG_MEMORY) {
            log_perf!(BUFFER_POOL, pool = pool.id(), buffer = buffer.id(), "discarding buffer: memory tag set");
            pool.discard_object(buffer);
            return;
        }

        let current = buffer.size();
        if current != size {
            log_perf!(
                BUFFER_POOL,
                pool = pool.id(),
                buffer = buffer.id(),
                current,
                size,
                "discarding buffer: size changed"
            );
            pool.discard_object(buffer);
            return;
        }

        if !buffer.is_all_memory_writable() {
            log_perf!(BUFFER_POOL, pool = pool.id(), buffer = buffer.id(), "discarding buffer: memory not writable");
            pool.discard_object(buffer);
            return;
        }

        pool.parent_release_object(buffer);
    }
}

impl MiniObjectPool<BufferPoolImpl> {
    /// Buffer pool running `decorator` on every new buffer.
    pub fn with_decorator<F>(decorator: F) -> Self
    where
        F: Fn(&mut Buffer) + Send + Sync + 'static,
    {
        Self::new(BufferPoolImpl::new().with_decorator(decorator))
    }

    /// Buffer pool advertising `options`.
    pub fn with_supported_options(options: &[&'static str]) -> Self {
        Self::new(BufferPoolImpl::new().with_supported_options(options))
    }
}
